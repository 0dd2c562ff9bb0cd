use std::path::PathBuf;

use agrisense_server::server;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve {
        #[clap(short, long, default_value = "8000")]
        port: u16,
        #[clap(short, long, default_value = "agrisense.db")]
        database: String,
        #[clap(long)]
        cors_origin: Option<String>,
        /// Regenerate weather alerts for all users on this interval
        #[clap(long)]
        alert_interval_hours: Option<u64>,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    Alerts {
        #[clap(subcommand)]
        command: AlertCommands,
    },
    Kb {
        #[clap(subcommand)]
        command: KbCommands,
    },
    Model {
        #[clap(subcommand)]
        command: ModelCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Migrate {
        #[clap(subcommand)]
        direction: server::MigrateDirection,
        #[clap(short, long, default_value = "agrisense.db")]
        database: String,
    },
}

#[derive(Subcommand, Debug)]
enum AlertCommands {
    Generate {
        #[clap(short, long, default_value = "agrisense.db")]
        database: String,
        /// Fetch fresh weather even when a recent snapshot exists
        #[clap(long)]
        force_refresh: bool,
    },
}

#[derive(Subcommand, Debug)]
enum KbCommands {
    /// Precompute symptom embeddings
    Embed {
        #[clap(short, long, default_value = "symptom_embeddings.json")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ModelCommands {
    /// Record the metrics of an exported crop model
    Register {
        #[clap(short, long)]
        artifact: PathBuf,
        #[clap(short, long, default_value = "agrisense.db")]
        database: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Serve {
            port,
            database,
            cors_origin,
            alert_interval_hours,
        } => {
            info!("Starting server on port {}", port);
            server::start_server(server::ServeOptions {
                port,
                database,
                cors_origin,
                alert_interval_hours,
            })
            .await?;
        }
        Commands::Db { command } => match command {
            DbCommands::Migrate {
                direction,
                database,
            } => {
                info!("Running database migration: {:?}", direction);
                server::migrate_database(&database, direction).await?;
            }
        },
        Commands::Alerts { command } => match command {
            AlertCommands::Generate {
                database,
                force_refresh,
            } => {
                server::generate_alerts(&database, force_refresh).await?;
            }
        },
        Commands::Kb { command } => match command {
            KbCommands::Embed { out } => {
                info!("Embedding symptom knowledge base into {}", out.display());
                server::embed_knowledge_base(&out).await?;
            }
        },
        Commands::Model { command } => match command {
            ModelCommands::Register { artifact, database } => {
                server::register_model_artifact(&database, &artifact).await?;
            }
        },
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
