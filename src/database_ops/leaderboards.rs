//! Read side: the nested game → scores view rebuilt from flat join rows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use tracing::{debug, instrument};

use super::db::Db;
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAggregate {
    pub game_name: String,
    pub header_url: String,
    pub scores: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub user_id: i64,
    pub user_name: String,
    pub icon_url: Option<String>,
    pub color_rgb: Option<String>,
    pub score: i64,
    pub score_date: DateTime<Utc>,
}

/// One row of the scores ⋈ users ⋈ games join.
#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRow {
    #[sqlx(rename = "gameName")]
    pub game_name: String,
    #[sqlx(rename = "headerUrl")]
    pub header_url: String,
    #[sqlx(rename = "userId")]
    pub user_id: i64,
    #[sqlx(rename = "userName")]
    pub user_name: String,
    #[sqlx(rename = "iconUrl")]
    pub icon_url: Option<String>,
    #[sqlx(rename = "colorRgb")]
    pub color_rgb: Option<String>,
    pub score: i64,
    #[sqlx(rename = "scoreDate")]
    pub score_date: DateTime<Utc>,
}

const LEADERBOARD_SQL: &str = "\
SELECT g.name AS gameName, g.headerUrl AS headerUrl, u.id AS userId, u.username AS userName, \
       u.iconUrl AS iconUrl, u.colorRgb AS colorRgb, s.score AS score, s.dateAdded AS scoreDate \
FROM scores s \
JOIN users u ON s.userId = u.id \
JOIN games g ON s.gameId = g.id \
ORDER BY g.name ASC, s.score DESC, s.id ASC";

#[derive(Debug, Clone)]
pub struct LeaderboardReader {
    db: Db,
}

impl LeaderboardReader {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Every game with its scores, games by name and scores highest first.
    #[instrument(skip(self))]
    pub async fn read_all(&self) -> Result<Vec<GameAggregate>, StoreError> {
        let rows: Vec<LeaderboardRow> = sqlx::query_as(LEADERBOARD_SQL)
            .fetch_all(&self.db.pool)
            .await?;
        debug!(rows = rows.len(), "leaderboard rows fetched");
        Ok(fold_rows(rows))
    }
}

/// Group pre-sorted rows into per-game aggregates in a single pass.
///
/// Rows must arrive grouped by game name; a new aggregate starts whenever the
/// name differs from the previous row's.
pub fn fold_rows(rows: impl IntoIterator<Item = LeaderboardRow>) -> Vec<GameAggregate> {
    let mut games: Vec<GameAggregate> = Vec::new();
    for row in rows {
        let entry = ScoreEntry {
            user_id: row.user_id,
            user_name: row.user_name,
            icon_url: row.icon_url,
            color_rgb: row.color_rgb,
            score: row.score,
            score_date: row.score_date,
        };
        match games.last_mut() {
            Some(game) if game.game_name == row.game_name => game.scores.push(entry),
            _ => games.push(GameAggregate {
                game_name: row.game_name,
                header_url: row.header_url,
                scores: vec![entry],
            }),
        }
    }
    games
}
