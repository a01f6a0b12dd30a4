// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::database_ops::db::Db;
use crate::database_ops::leaderboards::LeaderboardReader;
use crate::pipeline::ScrapePipeline;
use actix_web::{web, HttpResponse, Result};
use tracing::{error, info};

const SCRAPE_FAILED: &str = "Failed to process and save scores";
const READ_FAILED: &str = "Failed to retrieve scores from the database";

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> Result<HttpResponse> {
    let database = if db.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: database.to_string(),
    });
    Ok(HttpResponse::Ok().json(response))
}

/// Scrape one kiosk page and reconcile it into the store.
///
/// The cycle runs on its own task so a client hanging up mid-render does not
/// abort it.
pub async fn scrape_scores(
    path: web::Path<String>,
    pipeline: web::Data<ScrapePipeline>,
) -> Result<HttpResponse> {
    let path = path.into_inner();
    let pipeline = pipeline.into_inner();
    info!(path = %path, "scrape requested");

    let task = tokio::spawn(async move { pipeline.run(&path).await });
    match task.await {
        Ok(Ok(summary)) => Ok(HttpResponse::Ok().json(ApiResponse::success(ScrapeResponse {
            message: "Scores have been processed and saved to the database".to_string(),
            summary,
        }))),
        Ok(Err(e)) => {
            error!(error = %e, "scrape failed");
            Ok(HttpResponse::InternalServerError().body(SCRAPE_FAILED))
        }
        Err(e) => {
            error!(error = %e, "scrape task panicked");
            Ok(HttpResponse::InternalServerError().body(SCRAPE_FAILED))
        }
    }
}

/// Aggregated leaderboard view across every scraped game.
pub async fn get_scores(reader: web::Data<LeaderboardReader>) -> Result<HttpResponse> {
    match reader.read_all().await {
        Ok(games) => Ok(HttpResponse::Ok().json(games)),
        Err(e) => {
            error!(error = %e, "failed to read leaderboards");
            Ok(HttpResponse::InternalServerError().body(READ_FAILED))
        }
    }
}
