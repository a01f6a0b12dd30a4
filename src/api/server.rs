// API server implementation using actix-web

use std::sync::Arc;

use crate::api::{middleware, routes};
use crate::database_ops::db::Db;
use crate::database_ops::leaderboards::LeaderboardReader;
use crate::pipeline::ScrapePipeline;
use crate::util::env as env_util;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        env_util::init_env();

        let host = env_util::env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_util::env_opt("API_PORT")
            .or_else(|| env_util::env_opt("PORT"))
            .unwrap_or_else(|| "3000".to_string())
            .trim()
            .parse()
            .context("Invalid API_PORT")?;
        let allowed_origins = env_util::env_opt("ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db, pipeline: Arc<ScrapePipeline>) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "Starting pinball scores API server"
        );

        let reader_data = web::Data::new(LeaderboardReader::new(db.clone()));
        let db_data = web::Data::new(db);
        let pipeline_data = web::Data::from(pipeline);
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .app_data(db_data.clone())
                .app_data(reader_data.clone())
                .app_data(pipeline_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
