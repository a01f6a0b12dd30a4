// HTTP surface for the leaderboard scraper: trigger a scrape, read the aggregated view.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ApiServer;
