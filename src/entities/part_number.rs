use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback run length for parts without a usable cycle time
pub const DEFAULT_DURATION_HOURS: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "part_numbers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub client: Option<String>,
    pub description: String,
    pub piece_type: Option<String>,
    pub property: Option<String>,
    pub capacity_liters: Option<Decimal>,
    pub min_weight_kg: Option<Decimal>,
    pub max_weight_kg: Option<Decimal>,
    pub sold_weight_kg: Option<Decimal>,
    pub cycle_time_seconds: i32,
    pub cavities: Option<i32>,
    pub dim_c: Option<Decimal>,
    pub dim_a: Option<Decimal>,
    pub dim_l: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::production_order::Entity")]
    ProductionOrders,
}

impl Related<super::production_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductionOrders.def()
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
    /// Hours needed to mould `quantity` pieces of this part
    pub fn duration_hours(&self, quantity: i32) -> f64 {
        duration_hours(quantity, self.cycle_time_seconds)
    }
}

/// `quantity × cycle_time_seconds / 3600`, or one hour when the cycle time is unusable
pub fn duration_hours(quantity: i32, cycle_time_seconds: i32) -> f64 {
    if cycle_time_seconds <= 0 {
        return DEFAULT_DURATION_HOURS;
    }
    f64::from(quantity) * f64::from(cycle_time_seconds) / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hundred_pieces_at_thirty_six_seconds_is_one_hour() {
        assert_eq!(duration_hours(100, 36), 1.0);
    }

    #[test]
    fn unusable_cycle_time_falls_back_to_one_hour() {
        assert_eq!(duration_hours(5_000, 0), DEFAULT_DURATION_HOURS);
        assert_eq!(duration_hours(5_000, -4), DEFAULT_DURATION_HOURS);
    }

    proptest! {
        #[test]
        fn duration_matches_formula(quantity in 1i32..100_000, cycle in 1i32..3_600) {
            let expected = quantity as f64 * cycle as f64 / 3600.0;
            prop_assert!((duration_hours(quantity, cycle) - expected).abs() < 1e-9);
        }

        #[test]
        fn duration_grows_with_quantity(quantity in 1i32..50_000, extra in 1i32..50_000, cycle in 1i32..600) {
            prop_assert!(duration_hours(quantity + extra, cycle) > duration_hours(quantity, cycle));
        }
    }
}
