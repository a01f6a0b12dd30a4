use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Filter applied when `RUST_LOG` is unset: our spans at info, sqlx statement noise muted.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install the global fmt subscriber shared by the `api_server` and `pinball` binaries.
///
/// `RUST_LOG` wins over `default_filter`. Fails if a subscriber is already set.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
