//! One scrape cycle: render → parse → reconcile, dumping the snapshot to the
//! failure sink when reconciliation does not finish.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::database_ops::reconcile::{ReconcileSummary, Reconciler};
use crate::error::PipelineError;
use crate::leaderboard::{parser, Snapshot};
use crate::recovery::FailureSink;
use crate::render::Renderer;
use crate::util::env as env_util;

pub const DEFAULT_BASE_URL: &str = "https://insider.sternpinball.com/kiosk/";

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Kiosk prefix; page URLs are `base_url + path`.
    pub base_url: String,
    /// Where the file sink drops recovery artifacts.
    pub recovery_dir: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            recovery_dir: ".".to_string(),
        }
    }
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_util::env_opt("BASE_URL").unwrap_or(defaults.base_url),
            recovery_dir: env_util::env_opt("RECOVERY_DIR").unwrap_or(defaults.recovery_dir),
        }
    }
}

pub struct ScrapePipeline {
    base_url: String,
    renderer: Arc<dyn Renderer>,
    reconciler: Reconciler,
    sink: Arc<dyn FailureSink>,
}

impl ScrapePipeline {
    pub fn new(
        base_url: impl Into<String>,
        renderer: Arc<dyn Renderer>,
        reconciler: Reconciler,
        sink: Arc<dyn FailureSink>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            renderer,
            reconciler,
            sink,
        }
    }

    pub fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Scrape `base_url + path` and store what it shows.
    ///
    /// Render failures return straight away (nothing was parsed yet). Parse or
    /// store failures during reconciliation dump the whole snapshot first.
    #[instrument(skip(self))]
    pub async fn run(&self, path: &str) -> Result<ReconcileSummary, PipelineError> {
        let url = self.page_url(path);
        let html = self.renderer.render(&url).await?;

        let snapshot = parser::parse(&html);
        let rows: usize = snapshot.values().map(|g| g.scores.len()).sum();
        info!(%url, games = snapshot.len(), rows, "leaderboards parsed");
        if snapshot.is_empty() {
            warn!(%url, "no leaderboard cards found on page");
        }

        self.reconcile_or_dump(&snapshot).await
    }

    /// Re-run reconciliation for a snapshot recovered from an artifact.
    #[instrument(skip_all, fields(games = snapshot.len()))]
    pub async fn replay(&self, snapshot: &Snapshot) -> Result<ReconcileSummary, PipelineError> {
        self.reconcile_or_dump(snapshot).await
    }

    async fn reconcile_or_dump(&self, snapshot: &Snapshot) -> Result<ReconcileSummary, PipelineError> {
        match self.reconciler.reconcile(snapshot).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!(error = %e, "reconciliation failed; saving snapshot for replay");
                if let Err(sink_err) = self.sink.persist(snapshot).await {
                    error!(error = %sink_err, "failed to save snapshot to recovery sink");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database_ops::db::test_db;
    use crate::database_ops::reconcile::tests::count;
    use crate::error::{RenderError, SinkError, StoreError};
    use crate::recovery::MemorySink;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves canned HTML and remembers the URLs it was asked for.
    pub(crate) struct StaticRenderer {
        html: Option<String>,
        pub(crate) requested: Mutex<Vec<String>>,
    }

    impl StaticRenderer {
        pub(crate) fn ok(html: impl Into<String>) -> Self {
            Self {
                html: Some(html.into()),
                requested: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                html: None,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Renderer for StaticRenderer {
        async fn render(&self, url: &str) -> Result<String, RenderError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.html.clone().ok_or_else(|| RenderError::Timeout {
                url: url.to_string(),
                timeout: std::time::Duration::from_secs(1),
            })
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl FailureSink for BrokenSink {
        async fn persist(&self, _snapshot: &Snapshot) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::other("disk full")))
        }
    }

    pub(crate) const KIOSK_PAGE: &str = r#"<html><body>
        <div class="list-item card list">
          <div class="leaderboard-header"><img src="img1.png"><p class="hd-xs">Game A High Scores</p></div>
          <ul>
            <li>
              <div class="bg-profile"><img src="a.png"></div>
              <p class="font-semibold">alice</p>
              <div class="flex justify-end items-center" style="--profile-color: #FF0000">
                <div class="text-vintage">1,234</div>
              </div>
            </li>
          </ul>
        </div>
    </body></html>"#;

    fn pipeline(
        db: crate::database_ops::db::Db,
        renderer: Arc<dyn Renderer>,
        sink: Arc<dyn FailureSink>,
    ) -> ScrapePipeline {
        ScrapePipeline::new("https://kiosk.test/", renderer, Reconciler::new(db), sink)
    }

    #[tokio::test]
    async fn run_renders_parses_and_stores() {
        let db = test_db().await;
        let renderer = Arc::new(StaticRenderer::ok(KIOSK_PAGE));
        let sink = Arc::new(MemorySink::new());
        let p = pipeline(db.clone(), renderer.clone(), sink.clone());

        let summary = p.run("location-42").await.unwrap();
        assert_eq!(summary.scores_inserted, 1);
        assert_eq!(
            *renderer.requested.lock().unwrap(),
            vec!["https://kiosk.test/location-42".to_string()]
        );
        assert!(sink.snapshots().is_empty());

        let again = p.run("location-42").await.unwrap();
        assert_eq!(again.scores_skipped, 1);
        assert_eq!(count(&db, "scores").await, 1);
    }

    #[tokio::test]
    async fn render_failure_skips_sink() {
        let db = test_db().await;
        let sink = Arc::new(MemorySink::new());
        let p = pipeline(db, Arc::new(StaticRenderer::failing()), sink.clone());

        let err = p.run("x").await.unwrap_err();
        assert!(matches!(err, PipelineError::Render(RenderError::Timeout { .. })));
        assert!(sink.snapshots().is_empty());
    }

    #[tokio::test]
    async fn store_failure_dumps_full_snapshot() {
        let db = test_db().await;
        sqlx::query("DROP TABLE scores").execute(&db.pool).await.unwrap();
        let sink = Arc::new(MemorySink::new());
        let p = pipeline(db, Arc::new(StaticRenderer::ok(KIOSK_PAGE)), sink.clone());

        let err = p.run("x").await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::Query(_))));

        let dumped = sink.snapshots();
        assert_eq!(dumped, vec![parser::parse(KIOSK_PAGE)]);
        assert_eq!(dumped[0]["Game A"].scores[0].score, "1234");
    }

    #[tokio::test]
    async fn sink_failure_keeps_reconcile_error() {
        let db = test_db().await;
        sqlx::query("DROP TABLE users").execute(&db.pool).await.unwrap();
        let p = pipeline(db, Arc::new(StaticRenderer::ok(KIOSK_PAGE)), Arc::new(BrokenSink));

        let err = p.run("x").await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));
    }

    #[tokio::test]
    async fn replay_reconciles_recovered_snapshot() {
        let db = test_db().await;
        let sink = Arc::new(MemorySink::new());
        let p = pipeline(db.clone(), Arc::new(StaticRenderer::failing()), sink.clone());

        let snapshot = parser::parse(KIOSK_PAGE);
        let summary = p.replay(&snapshot).await.unwrap();
        assert_eq!(summary.games_inserted, 1);
        assert_eq!(count(&db, "users").await, 1);
        assert!(sink.snapshots().is_empty());
    }

    #[test]
    fn config_defaults_to_stern_kiosk() {
        let cfg = ScrapeConfig::default();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.recovery_dir, ".");
    }
}
