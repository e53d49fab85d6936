use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a production order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Available")]
    Available,
    #[sea_orm(string_value = "Planned")]
    Planned,
    #[sea_orm(string_value = "InProduction")]
    InProduction,
    #[sea_orm(string_value = "Completed")]
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Only orders that have not reached the floor may be placed or moved
    pub fn is_schedulable(&self) -> bool {
        matches!(self, OrderStatus::Available | OrderStatus::Planned)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub part_number_id: Uuid,
    pub quantity: i32,
    pub delivery_date: NaiveDate,
    pub quantity_produced: i32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::part_number::Entity",
        from = "Column::PartNumberId",
        to = "super::part_number::Column::Id"
    )]
    PartNumber,
    #[sea_orm(has_one = "super::schedule_entry::Entity")]
    ScheduleEntry,
}

impl Related<super::part_number::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PartNumber.def()
    }
}

impl Related<super::schedule_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleEntry.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = self.id {
                self.id = ActiveValue::Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = self.created_at {
                self.created_at = ActiveValue::Set(now);
            }
            if let ActiveValue::NotSet = self.status {
                self.status = ActiveValue::Set(OrderStatus::Available);
            }
            if let ActiveValue::NotSet = self.quantity_produced {
                self.quantity_produced = ActiveValue::Set(0);
            }
        }

        self.updated_at = ActiveValue::Set(now);

        Ok(self)
    }
}

impl Model {
    /// Pieces still to mould; never negative once over-produced
    pub fn remaining_quantity(&self) -> i32 {
        (self.quantity - self.quantity_produced).max(0)
    }
}
