//! Snapshot → store reconciliation.
//!
//! Games and users are keyed by name/username and only rewritten when a
//! tracked field actually changed. Scores are append-only and deduplicated on
//! the exact (user, game, value) triple. Every statement is an atomic
//! conflict-aware upsert backed by a unique index, so concurrent scrapes of the
//! same page cannot produce duplicate natural-key rows.
//!
//! No transaction wraps a whole snapshot: the first failure aborts the run and
//! whatever was written before it stays written.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::Row;
use tracing::{debug, info, instrument};

use super::db::Db;
use crate::error::{PipelineError, StoreError};
use crate::leaderboard::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub outcome: UpsertOutcome,
}

/// Per-run counters, logged on completion and returned to callers.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub games: usize,
    pub users: usize,
    pub games_inserted: usize,
    pub games_updated: usize,
    pub users_inserted: usize,
    pub users_updated: usize,
    pub scores_inserted: usize,
    pub scores_skipped: usize,
}

impl ReconcileSummary {
    fn record_game(&mut self, outcome: UpsertOutcome) {
        self.games += 1;
        match outcome {
            UpsertOutcome::Inserted => self.games_inserted += 1,
            UpsertOutcome::Updated => self.games_updated += 1,
            UpsertOutcome::Unchanged => {}
        }
    }

    fn record_user(&mut self, outcome: UpsertOutcome) {
        self.users += 1;
        match outcome {
            UpsertOutcome::Inserted => self.users_inserted += 1,
            UpsertOutcome::Updated => self.users_updated += 1,
            UpsertOutcome::Unchanged => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    db: Db,
}

impl Reconciler {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Upsert every game, user and score in snapshot order.
    #[instrument(skip_all, fields(games = snapshot.len()))]
    pub async fn reconcile(&self, snapshot: &Snapshot) -> Result<ReconcileSummary, PipelineError> {
        let mut summary = ReconcileSummary::default();

        for (name, block) in snapshot {
            let game = upsert_game(&self.db, name, &block.header_url).await?;
            summary.record_game(game.outcome);

            for row in &block.scores {
                let user = upsert_user(
                    &self.db,
                    &row.username,
                    row.icon_url.as_deref(),
                    row.color_rgb.as_deref(),
                )
                .await?;
                summary.record_user(user.outcome);

                let value = row.score_value()?;
                if insert_score(&self.db, user.id, game.id, value).await? {
                    summary.scores_inserted += 1;
                } else {
                    summary.scores_skipped += 1;
                }
            }
        }

        info!(
            games = summary.games,
            users = summary.users,
            games_inserted = summary.games_inserted,
            users_inserted = summary.users_inserted,
            scores_inserted = summary.scores_inserted,
            scores_skipped = summary.scores_skipped,
            "reconciliation complete"
        );
        Ok(summary)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// A returned row was either freshly inserted (it carries our creation
/// timestamp) or updated in place.
fn classify(created: &str, now: &str) -> UpsertOutcome {
    if created == now {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Updated
    }
}

/// Insert a game by name, or refresh its header reference when it changed.
pub async fn upsert_game(db: &Db, name: &str, header_url: &str) -> Result<Upserted, StoreError> {
    let now = timestamp(Utc::now());
    let returned = sqlx::query(
        "INSERT INTO games (name, headerUrl, datecreated) VALUES (?, ?, ?) \
         ON CONFLICT (name) DO UPDATE SET headerUrl = excluded.headerUrl \
         WHERE games.headerUrl IS NOT excluded.headerUrl \
         RETURNING id, datecreated",
    )
    .bind(name)
    .bind(header_url)
    .bind(&now)
    .fetch_optional(&db.pool)
    .await?;

    let upserted = match returned {
        Some(r) => Upserted {
            id: r.try_get("id")?,
            outcome: classify(&r.try_get::<String, _>("datecreated")?, &now),
        },
        None => Upserted {
            id: sqlx::query_scalar("SELECT id FROM games WHERE name = ?")
                .bind(name)
                .fetch_one(&db.pool)
                .await?,
            outcome: UpsertOutcome::Unchanged,
        },
    };
    debug!(game = %name, game_id = upserted.id, outcome = ?upserted.outcome, "game upserted");
    Ok(upserted)
}

/// Insert a user by username, or refresh icon and color together when either changed.
pub async fn upsert_user(
    db: &Db,
    username: &str,
    icon_url: Option<&str>,
    color_rgb: Option<&str>,
) -> Result<Upserted, StoreError> {
    let now = timestamp(Utc::now());
    let returned = sqlx::query(
        "INSERT INTO users (username, iconUrl, colorRgb, datecreated) VALUES (?, ?, ?, ?) \
         ON CONFLICT (username) DO UPDATE SET iconUrl = excluded.iconUrl, colorRgb = excluded.colorRgb \
         WHERE users.iconUrl IS NOT excluded.iconUrl OR users.colorRgb IS NOT excluded.colorRgb \
         RETURNING id, datecreated",
    )
    .bind(username)
    .bind(icon_url)
    .bind(color_rgb)
    .bind(&now)
    .fetch_optional(&db.pool)
    .await?;

    let upserted = match returned {
        Some(r) => Upserted {
            id: r.try_get("id")?,
            outcome: classify(&r.try_get::<String, _>("datecreated")?, &now),
        },
        None => Upserted {
            id: sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
                .bind(username)
                .fetch_one(&db.pool)
                .await?,
            outcome: UpsertOutcome::Unchanged,
        },
    };
    debug!(user = %username, user_id = upserted.id, outcome = ?upserted.outcome, "user upserted");
    Ok(upserted)
}

/// Record a score unless the exact (user, game, value) triple already exists.
/// Returns whether a row was written.
pub async fn insert_score(db: &Db, user_id: i64, game_id: i64, score: i64) -> Result<bool, StoreError> {
    let res = sqlx::query(
        "INSERT INTO scores (userId, gameId, score, dateAdded) VALUES (?, ?, ?, ?) \
         ON CONFLICT (userId, gameId, score) DO NOTHING",
    )
    .bind(user_id)
    .bind(game_id)
    .bind(score)
    .bind(timestamp(Utc::now()))
    .execute(&db.pool)
    .await?;

    let inserted = res.rows_affected() == 1;
    debug!(user_id, game_id, score, inserted, "score recorded");
    Ok(inserted)
}
