use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use boom_server::config::Config;
use boom_server::logging::init_logging;
use boom_server::metrics::init_metrics;
use boom_server::server::start_server;
use boom_server::state::AppState;
use boom_server::storage::{open_storage, SqliteStorage};

#[derive(Parser)]
#[command(name = "boom")]
#[command(about = "Video sharing backend with wallets, purchases and gifts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create or update the SQLite schema and exit
    Migrate,
    /// Credit an account's wallet directly
    TopUp {
        /// Account id
        #[arg(long)]
        account: Uuid,
        /// Amount in minor units
        #[arg(long)]
        amount: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging();
    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { port } => {
            init_metrics(config.metrics_port);
            let port = port.unwrap_or(config.port);
            let storage = open_storage(&config)?;
            let state = AppState::new(config, storage);
            start_server(state, port).await?;
        }
        Commands::Migrate => {
            if config.uses_in_memory_storage() {
                anyhow::bail!("DATABASE_URL is ':memory:'; there is nothing to migrate");
            }
            SqliteStorage::open(&config.database_url)
                .with_context(|| format!("failed to migrate {}", config.database_url))?;
            info!("Schema applied to {}", config.database_url);
        }
        Commands::TopUp { account, amount } => {
            let storage = open_storage(&config)?;
            let state = AppState::new(config, storage);
            let new_balance = state.wallet.add_funds(account, amount).await?;
            println!("Credited {amount} to {account}; new balance {new_balance}");
        }
    }

    Ok(())
}
