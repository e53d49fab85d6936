use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::{downtime_type, machine, part_number, scrap_type},
    errors::ServiceError,
};

/// Downtime reasons installed by `shopfloor-cli seed`
pub const DEFAULT_DOWNTIME_TYPES: &[(&str, &str)] = &[
    ("SETUP", "Mold change / setup"),
    ("MAINT", "Corrective maintenance"),
    ("MATERIAL", "Waiting for material"),
    ("QUALITY", "Quality hold"),
    ("NOPLAN", "No operator or no plan"),
];

/// Scrap reasons installed by `shopfloor-cli seed`
pub const DEFAULT_SCRAP_TYPES: &[(&str, &str)] = &[
    ("SHORT", "Short shot"),
    ("FLASH", "Flash / burr"),
    ("BURN", "Burn mark"),
    ("CONTAM", "Contamination"),
    ("WEIGHT", "Out of weight range"),
];

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewPartNumber {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    pub client: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    pub piece_type: Option<String>,
    pub property: Option<String>,
    pub capacity_liters: Option<Decimal>,
    pub min_weight_kg: Option<Decimal>,
    pub max_weight_kg: Option<Decimal>,
    pub sold_weight_kg: Option<Decimal>,
    /// Seconds per shot, at most one day
    #[validate(range(min = 0, max = 86_400))]
    pub cycle_time_seconds: i32,
    pub cavities: Option<i32>,
    pub dim_c: Option<Decimal>,
    pub dim_a: Option<Decimal>,
    pub dim_l: Option<Decimal>,
}

impl NewPartNumber {
    pub fn new(code: impl Into<String>, description: impl Into<String>, cycle_time_seconds: i32) -> Self {
        Self {
            code: code.into(),
            client: None,
            description: description.into(),
            piece_type: None,
            property: None,
            capacity_liters: None,
            min_weight_kg: None,
            max_weight_kg: None,
            sold_weight_kg: None,
            cycle_time_seconds,
            cavities: None,
            dim_c: None,
            dim_a: None,
            dim_l: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewMachine {
    #[validate(length(min = 1, max = 50))]
    pub number: String,
    pub capacity_liters: Option<Decimal>,
    pub mold_dim_c: Option<Decimal>,
    pub mold_dim_a: Option<Decimal>,
    pub mold_dim_l: Option<Decimal>,
}

impl NewMachine {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            capacity_liters: None,
            mold_dim_c: None,
            mold_dim_a: None,
            mold_dim_l: None,
        }
    }
}

/// Row of the part-number picker
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartNumberSummary {
    pub id: uuid::Uuid,
    pub code: String,
    pub capacity_liters: Option<Decimal>,
}

impl From<part_number::Model> for PartNumberSummary {
    fn from(model: part_number::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            capacity_liters: model.capacity_liters,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MachineSummary {
    pub id: uuid::Uuid,
    pub number: String,
    pub capacity_liters: Option<Decimal>,
    pub mold_dim_c: Option<Decimal>,
    pub mold_dim_a: Option<Decimal>,
    pub mold_dim_l: Option<Decimal>,
}

impl From<machine::Model> for MachineSummary {
    fn from(model: machine::Model) -> Self {
        Self {
            id: model.id,
            number: model.number,
            capacity_liters: model.capacity_liters,
            mold_dim_c: model.mold_dim_c,
            mold_dim_a: model.mold_dim_a,
            mold_dim_l: model.mold_dim_l,
        }
    }
}

/// Lookup row shared by downtime and scrap reasons
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LookupType {
    pub id: uuid::Uuid,
    pub code: String,
    pub description: String,
}

impl From<downtime_type::Model> for LookupType {
    fn from(model: downtime_type::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            description: model.description,
        }
    }
}

impl From<scrap_type::Model> for LookupType {
    fn from(model: scrap_type::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            description: model.description,
        }
    }
}

/// Reference data: part numbers, machines and the downtime/scrap reason tables
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_part_numbers(&self) -> Result<Vec<PartNumberSummary>, ServiceError> {
        let parts = part_number::Entity::find()
            .order_by_asc(part_number::Column::Code)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(parts.into_iter().map(PartNumberSummary::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn list_machines(&self) -> Result<Vec<MachineSummary>, ServiceError> {
        let machines = machine::Entity::find()
            .order_by_asc(machine::Column::Number)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(machines.into_iter().map(MachineSummary::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn list_downtime_types(&self) -> Result<Vec<LookupType>, ServiceError> {
        let types = downtime_type::Entity::find()
            .order_by_asc(downtime_type::Column::Code)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(types.into_iter().map(LookupType::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn list_scrap_types(&self) -> Result<Vec<LookupType>, ServiceError> {
        let types = scrap_type::Entity::find()
            .order_by_asc(scrap_type::Column::Code)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(types.into_iter().map(LookupType::from).collect())
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_part_number(
        &self,
        input: NewPartNumber,
    ) -> Result<part_number::Model, ServiceError> {
        input.validate()?;

        let existing = part_number::Entity::find()
            .filter(part_number::Column::Code.eq(input.code.as_str()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::InvalidOperation(format!(
                "Part number {} already exists",
                input.code
            )));
        }

        let part = part_number::ActiveModel {
            code: Set(input.code),
            client: Set(input.client),
            description: Set(input.description),
            piece_type: Set(input.piece_type),
            property: Set(input.property),
            capacity_liters: Set(input.capacity_liters),
            min_weight_kg: Set(input.min_weight_kg),
            max_weight_kg: Set(input.max_weight_kg),
            sold_weight_kg: Set(input.sold_weight_kg),
            cycle_time_seconds: Set(input.cycle_time_seconds),
            cavities: Set(input.cavities),
            dim_c: Set(input.dim_c),
            dim_a: Set(input.dim_a),
            dim_l: Set(input.dim_l),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(part_number_id = %part.id, "part number registered");
        Ok(part)
    }

    #[instrument(skip(self, input), fields(number = %input.number))]
    pub async fn create_machine(&self, input: NewMachine) -> Result<machine::Model, ServiceError> {
        input.validate()?;

        let existing = machine::Entity::find()
            .filter(machine::Column::Number.eq(input.number.as_str()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::InvalidOperation(format!(
                "Machine {} already exists",
                input.number
            )));
        }

        let machine = machine::ActiveModel {
            number: Set(input.number),
            capacity_liters: Set(input.capacity_liters),
            mold_dim_c: Set(input.mold_dim_c),
            mold_dim_a: Set(input.mold_dim_a),
            mold_dim_l: Set(input.mold_dim_l),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(machine_id = %machine.id, "machine registered");
        Ok(machine)
    }

    /// Returns the downtime type with `code`, creating it when missing
    pub async fn ensure_downtime_type(
        &self,
        code: &str,
        description: &str,
    ) -> Result<downtime_type::Model, ServiceError> {
        if let Some(found) = downtime_type::Entity::find()
            .filter(downtime_type::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        {
            return Ok(found);
        }

        downtime_type::ActiveModel {
            code: Set(code.to_string()),
            description: Set(description.to_string()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)
    }

    /// Returns the scrap type with `code`, creating it when missing
    pub async fn ensure_scrap_type(
        &self,
        code: &str,
        description: &str,
    ) -> Result<scrap_type::Model, ServiceError> {
        if let Some(found) = scrap_type::Entity::find()
            .filter(scrap_type::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        {
            return Ok(found);
        }

        scrap_type::ActiveModel {
            code: Set(code.to_string()),
            description: Set(description.to_string()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)
    }

    /// Installs the default downtime and scrap reasons; safe to run repeatedly
    #[instrument(skip(self))]
    pub async fn seed_lookups(&self) -> Result<(usize, usize), ServiceError> {
        for (code, description) in DEFAULT_DOWNTIME_TYPES {
            self.ensure_downtime_type(code, description).await?;
        }
        for (code, description) in DEFAULT_SCRAP_TYPES {
            self.ensure_scrap_type(code, description).await?;
        }
        info!(
            downtime_types = DEFAULT_DOWNTIME_TYPES.len(),
            scrap_types = DEFAULT_SCRAP_TYPES.len(),
            "lookup tables seeded"
        );
        Ok((DEFAULT_DOWNTIME_TYPES.len(), DEFAULT_SCRAP_TYPES.len()))
    }
}
