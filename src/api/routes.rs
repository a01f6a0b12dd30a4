// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .route("/scores", web::get().to(handlers::get_scores))
        .route("/scores/{path}", web::get().to(handlers::scrape_scores));
}
