//! Scrapes rendered kiosk pinball leaderboards into a relational store and
//! serves the aggregated view.
//!
//! Flow of one cycle: [`render`] → [`leaderboard::parser`] →
//! [`database_ops::reconcile`], with [`recovery`] catching snapshots that fail
//! to persist. [`database_ops::leaderboards`] is the independent read side.

pub mod api;
pub mod database_ops;
pub mod error;
pub mod leaderboard;
pub mod pipeline;
pub mod recovery;
pub mod render;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use error::{ParseError, PipelineError, RenderError, SinkError, StoreError};
pub use pipeline::{ScrapeConfig, ScrapePipeline};
