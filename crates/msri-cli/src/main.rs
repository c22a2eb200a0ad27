mod query;
mod run;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use msri_core::{AppConfig, IndexConfig};
use msri_store::{KvStore, PgKvStore, PgPool, PoolConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "msri")]
#[command(about = "Market stress/resilience index")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch all sources, score one date, and merge it into the series
    Run {
        /// Date to score (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Use an in-process store; nothing is persisted
        #[arg(long)]
        memory: bool,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
        /// Serve deterministic synthetic data instead of fetching upstream
        #[cfg(feature = "demo")]
        #[arg(long)]
        demo_seed: Option<u64>,
    },
    /// Show source health from the last recorded attempts
    Health {
        #[arg(long)]
        json: bool,
    },
    /// Print stored series points, or its summary
    Series {
        /// First date to include
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date to include
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Print the summary record instead of points
        #[arg(long)]
        summary: bool,
        #[arg(long)]
        json: bool,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Configuration checks
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check database connectivity
    Ping,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Load and validate the index configuration
    Check {
        /// Index config path (defaults to `MSRI_INDEX_CONFIG_PATH`)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = msri_core::load_app_config()?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&app.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::debug!(config = ?app, "application config loaded");

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("msri: no command given; try `msri --help`");
        return Ok(());
    };

    match command {
        #[cfg(feature = "demo")]
        Commands::Run {
            date,
            memory,
            json,
            demo_seed,
        } => {
            let index = msri_core::load_index_config(&app.index_config_path)?;
            let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            run::run_cycle(&app, index, date, memory, json, demo_seed).await
        }
        #[cfg(not(feature = "demo"))]
        Commands::Run { date, memory, json } => {
            let index = msri_core::load_index_config(&app.index_config_path)?;
            let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            run::run_cycle(&app, index, date, memory, json, None).await
        }
        Commands::Health { json } => {
            let index = msri_core::load_index_config(&app.index_config_path)?;
            let store = open_store(&app, &index).await?;
            query::run_health(store, &index, json).await
        }
        Commands::Series {
            from,
            to,
            summary,
            json,
        } => {
            let index = msri_core::load_index_config(&app.index_config_path)?;
            let store = open_store(&app, &index).await?;
            query::run_series(store, &index, from, to, summary, json).await
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let pool = connect(&app).await?;
            let applied = msri_store::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            let pool = connect(&app).await?;
            msri_store::ping(&pool).await?;
            println!("database reachable");
            Ok(())
        }
        Commands::Config {
            command: ConfigCommands::Check { path },
        } => {
            let path = path.unwrap_or_else(|| app.index_config_path.clone());
            query::run_config_check(&path)
        }
    }
}

async fn connect(app: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = app.require_database_url()?;
    let pool = msri_store::connect_pool(database_url, PoolConfig::from_app_config(app)).await?;
    Ok(pool)
}

/// Postgres-backed store with the series record ceiling applied.
pub(crate) async fn open_store(
    app: &AppConfig,
    index: &IndexConfig,
) -> anyhow::Result<Arc<dyn KvStore>> {
    let pool = connect(app).await?;
    Ok(Arc::new(PgKvStore::with_max_record_bytes(
        pool,
        index.series.max_record_bytes,
    )))
}

#[cfg(test)]
mod tests;
