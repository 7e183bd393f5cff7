use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod db;
mod error;
mod http;
mod models;
mod report;
mod service;
mod similar;
mod store;

use config::Config;
use service::{LogNotifier, SuggestionService};
use store::{MemoryStore, SuggestionStore};

#[derive(Parser)]
#[command(name = "suggestion-report")]
#[command(about = "Customer suggestion intake and monthly reporting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample suggestions
    Seed,
    /// Import suggestions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Generate a monthly suggestion report
    Report {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=12))]
        months: u32,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Write the report as JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// List suggestions that share keywords with the given text
    Similar {
        #[arg(long)]
        content: String,
    },
    /// Serve the REST API
    Serve {
        /// Use an in-memory store seeded with sample data instead of Postgres
        #[arg(long)]
        memory: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let inserted = db::seed(&pool).await?;
            println!("Inserted {inserted} sample suggestions.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} suggestions from {}.", csv.display());
        }
        Commands::Report { months, out, json } => {
            let pool = connect(&config).await?;
            let store = db::PgStore::new(pool);
            let suggestions = store.all().await?;

            let now = Utc::now();
            let monthly = report::generate_monthly_report_at(&suggestions, months, now);
            let contents = if json {
                serde_json::to_string_pretty(&monthly)?
            } else {
                report::build_markdown(&monthly, months, report::window_start(now, months), now)
            };
            std::fs::write(&out, contents)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Report covering {} suggestions written to {}.",
                monthly.total_suggestions,
                out.display()
            );
        }
        Commands::Similar { content } => {
            let pool = connect(&config).await?;
            let store = db::PgStore::new(pool);
            let suggestions = store.all().await?;
            let matches = similar::find_similar(&content, &suggestions);

            if matches.is_empty() {
                println!("No similar suggestions found.");
                return Ok(());
            }

            println!("Similar suggestions:");
            for suggestion in matches {
                println!(
                    "- [{}] {} ({}): {}",
                    suggestion.status,
                    suggestion.customer_name,
                    suggestion.created_at.format("%Y-%m-%d"),
                    suggestion.content
                );
            }
        }
        Commands::Serve { memory } => {
            let store: Arc<dyn SuggestionStore> = if memory {
                info!("Using in-memory store with sample data");
                Arc::new(MemoryStore::with_suggestions(db::sample_suggestions(
                    Utc::now(),
                )?))
            } else {
                Arc::new(db::PgStore::new(connect(&config).await?))
            };

            let service =
                SuggestionService::new(store, Arc::new(LogNotifier), &config.admin_email);
            http::start_server(Arc::new(service), config.port).await?;
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}
