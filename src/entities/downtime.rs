use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stop of the machine while an entry runs; `ended_at` is null while ongoing
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "downtimes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub schedule_entry_id: Uuid,
    pub downtime_type_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub operator: Option<String>,
    pub created_at: DateTime<Utc>,
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
        belongs_to = "super::downtime_type::Entity",
        from = "Column::DowntimeTypeId",
        to = "super::downtime_type::Column::Id"
    )]
    DowntimeType,
}

impl Related<super::schedule_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleEntry.def()
    }
}

impl Related<super::downtime_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DowntimeType.def()
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
            if let ActiveValue::NotSet = self.created_at {
                self.created_at = ActiveValue::Set(Utc::now());
            }
        }
        Ok(self)
    }
}

impl Model {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Length of a closed downtime; open downtimes count as zero
    pub fn closed_duration(&self) -> Duration {
        match self.ended_at {
            Some(end) if end > self.started_at => end - self.started_at,
            _ => Duration::zero(),
        }
    }
}
