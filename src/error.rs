//! Error taxonomy for the scrape → store pipeline.
//!
//! Render and store failures end a scrape cycle and surface to the caller.
//! Sink failures are logged by the pipeline and never propagated.

use std::time::Duration;

use thiserror::Error;

/// Headless rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(#[source] std::io::Error),

    #[error("navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("browser exited with {status} while rendering {url}: {stderr}")]
    Exited {
        url: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("rendered document is not valid UTF-8: {0}")]
    InvalidOutput(#[from] std::string::FromUtf8Error),
}

/// Raised when parsed text cannot be coerced into its stored form.
///
/// The HTML parser itself degrades instead of failing; this only fires when a
/// score string reaches persistence without any leading digits.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("score {0:?} is not a decimal integer")]
    InvalidScore(String),
}

/// Store failures (queries and schema migration).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Recovery artifact write failures. Logged only.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Anything that terminates a scrape or replay cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Store(StoreError::Query(err))
    }
}
