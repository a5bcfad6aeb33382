//! # Curbfare CLI (`curb`)
//!
//! The `curb` binary drives the whole system: database initialization, CSV
//! ingestion, embedding backfill, ad-hoc questions, statistics, and the HTTP
//! query server.
//!
//! ## Usage
//!
//! ```bash
//! curb --config ./curbfare.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `curb init` | Create the SQLite database and schema |
//! | `curb import` | Run the four ingestion passes over both feeds |
//! | `curb embed pending` | Backfill embeddings for foods missing one |
//! | `curb embed rebuild` | Clear and regenerate all embeddings |
//! | `curb ask "<query>"` | Answer one question from the CLI |
//! | `curb stats` | Row counts and embedding coverage |
//! | `curb serve` | Start the HTTP query endpoint |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use curbfare::{ask, backfill, config, ingest, migrate, server, stats};

/// Curbfare: food-truck discovery over municipal open data.
#[derive(Parser)]
#[command(
    name = "curb",
    about = "Curbfare: food-truck discovery over municipal open data",
    version,
    long_about = "Curbfare ingests the San Francisco mobile-food permit and schedule CSV feeds \
    into a normalized SQLite schema, embeds menu items, and answers natural-language questions \
    by combining vector similarity search with relational joins across trucks, locations, and \
    schedules."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./curbfare.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all six tables. Idempotent:
    /// running it multiple times is safe.
    Init,

    /// Ingest both CSV feeds.
    ///
    /// Runs the four ordered passes (locations, trucks, foods, schedules).
    /// Every write is an idempotent upsert, so re-running after a failure is
    /// always safe.
    Import {
        /// Override the trucks feed source (URL or local file path).
        #[arg(long)]
        trucks: Option<String>,

        /// Override the schedules feed source (URL or local file path).
        #[arg(long)]
        schedules: Option<String>,
    },

    /// Manage menu-item embedding vectors.
    ///
    /// Requires an embedding provider to be configured.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Answer one free-text question from the CLI.
    ///
    /// Runs the same retrieval + synthesis path as the HTTP endpoint.
    Ask {
        /// The question to answer.
        query: String,
    },

    /// Show row counts and embedding coverage.
    Stats,

    /// Start the HTTP query endpoint.
    ///
    /// Binds to `[server].bind` and serves `POST /` and `GET /health`.
    Serve,
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed foods that do not have a vector yet.
    Pending,

    /// Delete and regenerate all embeddings.
    ///
    /// Useful when switching embedding models or dimensions.
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { trucks, schedules } => {
            ingest::run_import(&cfg, trucks, schedules).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending => {
                backfill::run_embed_pending(&cfg).await?;
            }
            EmbedAction::Rebuild => {
                backfill::run_embed_rebuild(&cfg).await?;
            }
        },
        Commands::Ask { query } => {
            ask::run_ask(&cfg, &query).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
