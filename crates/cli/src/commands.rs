use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use copyr_client::{BatchItem, CopyrightAnalyzer, SourceClients};
use copyr_core::copyright::supported_countries;
use copyr_core::{AppConfig, CacheDb, WorkTypeHint};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze one work.
    Analyze {
        title: String,
        author: String,

        /// literary, musical or auto
        #[arg(long, default_value = "auto")]
        work_type: WorkTypeHint,

        /// Country code; defaults to the configured country.
        #[arg(long)]
        country: Option<String>,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze every work in a JSON array of {title, author, work_type?, country?}.
    Batch {
        file: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported countries.
    Countries,

    /// Work cache maintenance.
    #[command(subcommand)]
    Maintenance(Maintenance),
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    /// Cache statistics.
    Stats,
    /// Delete long-expired works and searches, flag newly expired works.
    Cleanup,
    /// Recompute content hashes and merge duplicate works.
    Dedup,
}

fn analyzer(config: &AppConfig) -> Result<CopyrightAnalyzer> {
    let clients = SourceClients::from_config(config).context("failed to build source clients")?;
    Ok(CopyrightAnalyzer::new(clients, &config.default_country))
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Results saved to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn parse_batch(text: &str) -> Result<Vec<BatchItem>> {
    let items: Vec<BatchItem> = serde_json::from_str(text).context("batch file must be a JSON array of works")?;
    anyhow::ensure!(!items.is_empty(), "batch file contains no works");
    Ok(items)
}

pub fn countries_listing() -> Value {
    let countries: Vec<Value> = supported_countries().iter().map(|c| json!({"code": c.code, "name": c.name})).collect();
    json!({"total_count": countries.len(), "supported_countries": countries})
}

pub async fn maintain(db: &CacheDb, task: Maintenance, cleanup_after_days: i64) -> Result<Value> {
    let report = match task {
        Maintenance::Stats => serde_json::to_value(db.statistics().await?)?,
        Maintenance::Cleanup => json!({
            "works_deleted": db.delete_expired_works(cleanup_after_days).await?,
            "searches_purged": db.purge_expired_searches().await?,
            "works_marked_expired": db.mark_expired_works().await?,
        }),
        Maintenance::Dedup => serde_json::to_value(db.reconcile_content_hashes().await?)?,
    };
    tracing::info!(?task, "maintenance complete");
    Ok(report)
}

pub async fn run(command: Command) -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    match command {
        Command::Analyze { title, author, work_type, country, output } => {
            let record = analyzer(&config)?.analyze_work(&title, &author, work_type, country.as_deref()).await?;
            emit(&record, output.as_deref())
        }
        Command::Batch { file, output } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let items = parse_batch(&text)?;
            eprintln!("Analyzing {} works...", items.len());
            let records = analyzer(&config)?.analyze_batch(&items).await;
            emit(&records, output.as_deref())
        }
        Command::Countries => emit(&countries_listing(), None),
        Command::Maintenance(task) => {
            let db = CacheDb::open(&config.db_path).await.context("failed to open cache database")?;
            emit(&maintain(&db, task, config.cleanup_after_days).await?, None)
        }
    }
}
