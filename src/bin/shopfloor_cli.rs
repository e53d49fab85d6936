use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use shopfloor_api::{
    config::{self, AppConfig},
    db::{self, DbPool},
    migrator,
    services::catalog::{CatalogService, NewMachine, NewPartNumber},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    if let Commands::Migrate = cli.command {
        migrator::run_migration(config.database_url())
            .await
            .context("failed to apply migrations")?;
        println!("Migrations applied");
        return Ok(());
    }

    let context = CliContext::initialize(config).await?;
    match cli.command {
        Commands::Migrate => {}
        Commands::Seed => handle_seed(&context).await?,
        Commands::AddPartNumber(args) => handle_add_part_number(&context, args, cli.json).await?,
        Commands::AddMachine(args) => handle_add_machine(&context, args, cli.json).await?,
        Commands::List(what) => handle_list(&context, what, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "shopfloor",
    about = "Shop floor CLI for schema setup and catalog maintenance",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Install the default downtime and scrap reasons
    Seed,
    /// Register a part number
    AddPartNumber(AddPartNumberArgs),
    /// Register a moulding machine
    AddMachine(AddMachineArgs),
    #[command(subcommand)]
    List(ListCommands),
}

#[derive(Args)]
struct AddPartNumberArgs {
    #[arg(long)]
    code: String,
    #[arg(long)]
    description: String,
    #[arg(long, help = "Seconds per moulding cycle")]
    cycle_time: i32,
    #[arg(long)]
    client: Option<String>,
    #[arg(long)]
    cavities: Option<i32>,
    #[arg(long)]
    capacity_liters: Option<Decimal>,
}

#[derive(Args)]
struct AddMachineArgs {
    #[arg(long)]
    number: String,
    #[arg(long)]
    capacity_liters: Option<Decimal>,
}

#[derive(Subcommand)]
enum ListCommands {
    PartNumbers,
    Machines,
    DowntimeTypes,
    ScrapTypes,
}

struct CliContext {
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize(config: AppConfig) -> Result<Self> {
        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        Ok(Self {
            db: Arc::new(db_pool),
        })
    }

    fn catalog_service(&self) -> CatalogService {
        CatalogService::new(self.db.clone())
    }
}

async fn handle_seed(context: &CliContext) -> Result<()> {
    let (downtime, scrap) = context
        .catalog_service()
        .seed_lookups()
        .await
        .context("failed to seed lookup tables")?;
    println!(
        "Seeded {} downtime types and {} scrap types",
        downtime, scrap
    );
    Ok(())
}

async fn handle_add_part_number(
    context: &CliContext,
    args: AddPartNumberArgs,
    json: bool,
) -> Result<()> {
    let mut input = NewPartNumber::new(args.code, args.description, args.cycle_time);
    input.client = args.client;
    input.cavities = args.cavities;
    input.capacity_liters = args.capacity_liters;

    let part = context
        .catalog_service()
        .create_part_number(input)
        .await
        .context("failed to create part number")?;

    if json {
        print_json(&part)?;
    } else {
        println!(
            "Part number {} registered (id {}, cycle {}s)",
            part.code, part.id, part.cycle_time_seconds
        );
    }
    Ok(())
}

async fn handle_add_machine(context: &CliContext, args: AddMachineArgs, json: bool) -> Result<()> {
    let mut input = NewMachine::new(args.number);
    input.capacity_liters = args.capacity_liters;

    let machine = context
        .catalog_service()
        .create_machine(input)
        .await
        .context("failed to create machine")?;

    if json {
        print_json(&machine)?;
    } else {
        println!("Machine {} registered (id {})", machine.number, machine.id);
    }
    Ok(())
}

async fn handle_list(context: &CliContext, what: ListCommands, json: bool) -> Result<()> {
    let catalog = context.catalog_service();
    match what {
        ListCommands::PartNumbers => {
            let parts = catalog.list_part_numbers().await?;
            if json {
                return print_json(&parts);
            }
            for part in parts {
                println!("- {} • {}", part.code, part.id);
            }
        }
        ListCommands::Machines => {
            let machines = catalog.list_machines().await?;
            if json {
                return print_json(&machines);
            }
            for machine in machines {
                println!("- {} • {}", machine.number, machine.id);
            }
        }
        ListCommands::DowntimeTypes => {
            let types = catalog.list_downtime_types().await?;
            if json {
                return print_json(&types);
            }
            for t in types {
                println!("- {} • {}", t.code, t.description);
            }
        }
        ListCommands::ScrapTypes => {
            let types = catalog.list_scrap_types().await?;
            if json {
                return print_json(&types);
            }
            for t in types {
                println!("- {} • {}", t.code, t.description);
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
