//! CMS CLI - ingest content lifecycle events and inspect published entities.

mod app;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cms_core::telemetry;
use commands::{entity, ingest, schema};
use output::OutputFormat;

/// CMS - versioned content record keeper
#[derive(Parser)]
#[command(
    name = "cms",
    version,
    about = "Versioned content record keeper",
    long_about = "Applies publish, unpublish and delete events to content entities and serves role-filtered reads.",
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON); CMS__* environment variables override it
    #[arg(short, long, global = true, env = "CMS_CONFIG")]
    config: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Authenticated user the command runs as
    #[arg(short, long, global = true, env = "CMS_USER", default_value = "anonymous")]
    user: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a batch of lifecycle events
    Ingest(ingest::IngestArgs),

    /// Show one entity
    Get {
        /// Entity ID
        id: String,
    },

    /// List entities visible to the caller
    List,

    /// Disable an entity (admin only)
    Disable {
        /// Entity ID
        id: String,
    },

    /// Create the PostgreSQL tables
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let app = app::App::bootstrap(cli.config.as_deref(), &cli.user)?;
    telemetry::init_logging(&app.config.logging)?;
    tracing::debug!(user = %app.caller.username, role = app.caller.role.id(), "Starting");

    let format = cli.output;
    match cli.command {
        Commands::Ingest(args) => ingest::execute(args, &app, format).await,
        Commands::Get { id } => entity::get(&id, &app, format).await,
        Commands::List => entity::list(&app, format).await,
        Commands::Disable { id } => entity::disable(&id, &app, format).await,
        Commands::Schema => schema::execute(&app).await,
    }
}
