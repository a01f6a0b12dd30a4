use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pinball_scores::database_ops::db::Db;
use pinball_scores::database_ops::leaderboards::LeaderboardReader;
use pinball_scores::database_ops::reconcile::Reconciler;
use pinball_scores::leaderboard::parser;
use pinball_scores::recovery::{load_artifact, FileSink};
use pinball_scores::render::ChromeRenderer;
use pinball_scores::tracing::{init_tracing, DEFAULT_FILTER};
use pinball_scores::util::env;
use pinball_scores::{ScrapeConfig, ScrapePipeline};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pinball", version, about = "Kiosk leaderboard scraper CLI")]
struct Cli {
    /// Optional override for the database URL
    #[arg(long, global = true)]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Render, parse and store one kiosk page (BASE_URL + PATH)
    Scrape { path: String },
    /// Reconcile a failed-scores-*.json recovery artifact
    Replay { file: PathBuf },
    /// Parse a saved HTML page and print the snapshot (no database access)
    Parse { file: PathBuf },
    /// Print the aggregated leaderboard view
    Leaderboard,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_db(db_url: Option<String>) -> Result<Db> {
    let url = db_url.unwrap_or_else(env::db_url);
    let db = Db::connect(&url, env::env_parse("DB_MAX_CONNS", 5u32))
        .await
        .context("failed to connect to database")?;
    if env::env_flag("AUTO_MIGRATE", true) {
        db.migrate().await.context("failed to apply migrations")?;
    }
    Ok(db)
}

fn build_pipeline(db: Db) -> ScrapePipeline {
    let config = ScrapeConfig::from_env();
    ScrapePipeline::new(
        config.base_url,
        Arc::new(ChromeRenderer::from_env()),
        Reconciler::new(db),
        Arc::new(FileSink::new(config.recovery_dir)),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    env::init_env();
    init_tracing(DEFAULT_FILTER)?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape { path } => {
            let pipeline = build_pipeline(open_db(cli.db_url).await?);
            let summary = pipeline
                .run(&path)
                .await
                .with_context(|| format!("scrape of {} failed", pipeline.page_url(&path)))?;
            print_json(&summary)?;
        }
        Commands::Replay { file } => {
            let snapshot = load_artifact(&file)
                .await
                .with_context(|| format!("failed to load {}", file.display()))?;
            info!(file = %file.display(), games = snapshot.len(), "replaying recovery artifact");
            let pipeline = build_pipeline(open_db(cli.db_url).await?);
            let summary = pipeline.replay(&snapshot).await.context("replay failed")?;
            print_json(&summary)?;
        }
        Commands::Parse { file } => {
            let html = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            print_json(&parser::parse(&html))?;
        }
        Commands::Leaderboard => {
            let reader = LeaderboardReader::new(open_db(cli.db_url).await?);
            print_json(&reader.read_all().await?)?;
        }
    }

    Ok(())
}
