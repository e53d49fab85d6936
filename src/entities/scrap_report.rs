use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only record of rejected pieces
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scrap_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub schedule_entry_id: Uuid,
    pub scrap_type_id: Uuid,
    pub quantity: i32,
    pub reported_at: DateTime<Utc>,
    pub operator: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schedule_entry::Entity",
        from = "Column::ScheduleEntryId",
        to = "super::schedule_entry::Column::Id"
    )]
    ScheduleEntry,
    #[sea_orm(
        belongs_to = "super::scrap_type::Entity",
        from = "Column::ScrapTypeId",
        to = "super::scrap_type::Column::Id",
        on_delete = "Restrict"
    )]
    ScrapType,
}

impl Related<super::schedule_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleEntry.def()
    }
}

impl Related<super::scrap_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScrapType.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            if let ActiveValue::NotSet = self.id {
                self.id = ActiveValue::Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = self.reported_at {
                self.reported_at = ActiveValue::Set(Utc::now());
            }
        }
        Ok(self)
    }
}
