// HTTP API server binary for the pinball leaderboard scraper

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pinball_scores::api::ApiServer;
use pinball_scores::database_ops::db::Db;
use pinball_scores::database_ops::reconcile::Reconciler;
use pinball_scores::recovery::FileSink;
use pinball_scores::render::ChromeRenderer;
use pinball_scores::tracing::{init_tracing, DEFAULT_FILTER};
use pinball_scores::util::env as env_util;
use pinball_scores::{ScrapeConfig, ScrapePipeline};

#[actix_web::main]
async fn main() -> Result<()> {
    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();
    init_tracing(DEFAULT_FILTER)?;

    tracing::info!("Initializing pinball scores API server");
    env_util::preflight_check(
        "api_server",
        &[],
        &[
            "DATABASE_URL",
            "BASE_URL",
            "CHROME_BIN",
            "RECOVERY_DIR",
            "API_PORT",
            "ALLOWED_ORIGINS",
        ],
    )?;

    let server = ApiServer::from_env()?;
    let config = ScrapeConfig::from_env();

    let database_url = env_util::db_url();
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_connections)
        .await
        .context("failed to connect to database")?;
    if env_util::env_flag("AUTO_MIGRATE", true) {
        db.migrate().await.context("failed to apply migrations")?;
    }
    tracing::info!("Database connected successfully");

    let sink = FileSink::new(Path::new(&config.recovery_dir));
    tracing::info!(recovery_dir = %sink.dir().display(), base_url = %config.base_url, "scrape pipeline ready");
    let pipeline = ScrapePipeline::new(
        config.base_url,
        Arc::new(ChromeRenderer::from_env()),
        Reconciler::new(db.clone()),
        Arc::new(sink),
    );

    server.run(db, Arc::new(pipeline)).await?;

    Ok(())
}
