use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_production_orders_table::Migration),
            Box::new(m20240101_000003_create_schedule_entries_table::Migration),
            Box::new(m20240101_000004_create_lookup_tables::Migration),
            Box::new(m20240101_000005_create_floor_event_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PartNumbers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PartNumbers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PartNumbers::Code)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PartNumbers::Client).string().null())
                        .col(ColumnDef::new(PartNumbers::Description).string().not_null())
                        .col(ColumnDef::new(PartNumbers::PieceType).string().null())
                        .col(ColumnDef::new(PartNumbers::Property).string().null())
                        .col(
                            ColumnDef::new(PartNumbers::CapacityLiters)
                                .decimal_len(10, 3)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PartNumbers::MinWeightKg)
                                .decimal_len(10, 3)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PartNumbers::MaxWeightKg)
                                .decimal_len(10, 3)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PartNumbers::SoldWeightKg)
                                .decimal_len(10, 3)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PartNumbers::CycleTimeSeconds)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PartNumbers::Cavities).integer().null())
                        .col(ColumnDef::new(PartNumbers::DimC).decimal_len(10, 2).null())
                        .col(ColumnDef::new(PartNumbers::DimA).decimal_len(10, 2).null())
                        .col(ColumnDef::new(PartNumbers::DimL).decimal_len(10, 2).null())
                        .col(
                            ColumnDef::new(PartNumbers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Machines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Machines::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Machines::Number)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Machines::CapacityLiters)
                                .decimal_len(10, 3)
                                .null(),
                        )
                        .col(ColumnDef::new(Machines::MoldDimC).decimal_len(10, 2).null())
                        .col(ColumnDef::new(Machines::MoldDimA).decimal_len(10, 2).null())
                        .col(ColumnDef::new(Machines::MoldDimL).decimal_len(10, 2).null())
                        .col(
                            ColumnDef::new(Machines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Machines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PartNumbers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PartNumbers {
        Table,
        Id,
        Code,
        Client,
        Description,
        PieceType,
        Property,
        CapacityLiters,
        MinWeightKg,
        MaxWeightKg,
        SoldWeightKg,
        CycleTimeSeconds,
        Cavities,
        DimC,
        DimA,
        DimL,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Machines {
        Table,
        Id,
        Number,
        CapacityLiters,
        MoldDimC,
        MoldDimA,
        MoldDimL,
        CreatedAt,
    }
}

mod m20240101_000002_create_production_orders_table {

    use super::m20240101_000001_create_catalog_tables::PartNumbers;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_production_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::PartNumberId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrders::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(ProductionOrders::DeliveryDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::QuantityProduced)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::Status)
                                .string_len(20)
                                .not_null()
                                .default("Available"),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_orders_part_number")
                                .from(ProductionOrders::Table, ProductionOrders::PartNumberId)
                                .to(PartNumbers::Table, PartNumbers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_orders_status")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_orders_delivery_date")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::DeliveryDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ProductionOrders {
        Table,
        Id,
        PartNumberId,
        Quantity,
        DeliveryDate,
        QuantityProduced,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_schedule_entries_table {

    use super::m20240101_000001_create_catalog_tables::Machines;
    use super::m20240101_000002_create_production_orders_table::ProductionOrders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_schedule_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ScheduleEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ScheduleEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ScheduleEntries::OrderId).uuid().not_null())
                        .col(ColumnDef::new(ScheduleEntries::MachineId).uuid().not_null())
                        .col(
                            ColumnDef::new(ScheduleEntries::StartAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ScheduleEntries::EndAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ScheduleEntries::Side).string_len(1).null())
                        .col(
                            ColumnDef::new(ScheduleEntries::RealStart)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ScheduleEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ScheduleEntries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_schedule_entries_order")
                                .from(ScheduleEntries::Table, ScheduleEntries::OrderId)
                                .to(ProductionOrders::Table, ProductionOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_schedule_entries_machine")
                                .from(ScheduleEntries::Table, ScheduleEntries::MachineId)
                                .to(Machines::Table, Machines::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            // One entry per order; scheduling again updates this row
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_schedule_entries_order_id")
                        .table(ScheduleEntries::Table)
                        .col(ScheduleEntries::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_schedule_entries_machine_start")
                        .table(ScheduleEntries::Table)
                        .col(ScheduleEntries::MachineId)
                        .col(ScheduleEntries::StartAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ScheduleEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ScheduleEntries {
        Table,
        Id,
        OrderId,
        MachineId,
        StartAt,
        EndAt,
        Side,
        RealStart,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_lookup_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_lookup_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DowntimeTypes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DowntimeTypes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DowntimeTypes::Code)
                                .string_len(30)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(DowntimeTypes::Description).string().not_null())
                        .col(
                            ColumnDef::new(DowntimeTypes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ScrapTypes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ScrapTypes::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(ScrapTypes::Code)
                                .string_len(30)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ScrapTypes::Description).string().not_null())
                        .col(
                            ColumnDef::new(ScrapTypes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ScrapTypes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DowntimeTypes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum DowntimeTypes {
        Table,
        Id,
        Code,
        Description,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum ScrapTypes {
        Table,
        Id,
        Code,
        Description,
        CreatedAt,
    }
}

mod m20240101_000005_create_floor_event_tables {

    use super::m20240101_000003_create_schedule_entries_table::ScheduleEntries;
    use super::m20240101_000004_create_lookup_tables::{DowntimeTypes, ScrapTypes};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_floor_event_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionReports::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionReports::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionReports::ScheduleEntryId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionReports::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(ProductionReports::ReportedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionReports::Operator).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_reports_schedule_entry")
                                .from(ProductionReports::Table, ProductionReports::ScheduleEntryId)
                                .to(ScheduleEntries::Table, ScheduleEntries::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Downtimes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Downtimes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Downtimes::ScheduleEntryId).uuid().not_null())
                        .col(ColumnDef::new(Downtimes::DowntimeTypeId).uuid().null())
                        .col(
                            ColumnDef::new(Downtimes::StartedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Downtimes::EndedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Downtimes::Operator).string().null())
                        .col(
                            ColumnDef::new(Downtimes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_downtimes_schedule_entry")
                                .from(Downtimes::Table, Downtimes::ScheduleEntryId)
                                .to(ScheduleEntries::Table, ScheduleEntries::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_downtimes_downtime_type")
                                .from(Downtimes::Table, Downtimes::DowntimeTypeId)
                                .to(DowntimeTypes::Table, DowntimeTypes::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ScrapReports::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ScrapReports::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ScrapReports::ScheduleEntryId).uuid().not_null())
                        .col(ColumnDef::new(ScrapReports::ScrapTypeId).uuid().not_null())
                        .col(ColumnDef::new(ScrapReports::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(ScrapReports::ReportedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ScrapReports::Operator).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_scrap_reports_schedule_entry")
                                .from(ScrapReports::Table, ScrapReports::ScheduleEntryId)
                                .to(ScheduleEntries::Table, ScheduleEntries::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_scrap_reports_scrap_type")
                                .from(ScrapReports::Table, ScrapReports::ScrapTypeId)
                                .to(ScrapTypes::Table, ScrapTypes::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_reports_schedule_entry_id")
                        .table(ProductionReports::Table)
                        .col(ProductionReports::ScheduleEntryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_downtimes_schedule_entry_id")
                        .table(Downtimes::Table)
                        .col(Downtimes::ScheduleEntryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_scrap_reports_schedule_entry_id")
                        .table(ScrapReports::Table)
                        .col(ScrapReports::ScheduleEntryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ScrapReports::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Downtimes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionReports::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductionReports {
        Table,
        Id,
        ScheduleEntryId,
        Quantity,
        ReportedAt,
        Operator,
    }

    #[derive(DeriveIden)]
    enum Downtimes {
        Table,
        Id,
        ScheduleEntryId,
        DowntimeTypeId,
        StartedAt,
        EndedAt,
        Operator,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ScrapReports {
        Table,
        Id,
        ScheduleEntryId,
        ScrapTypeId,
        Quantity,
        ReportedAt,
        Operator,
    }
}

/// Connects to `db_url` and applies every pending migration
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
