use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};

use types::{DecodedValue, PublishedReading};

/// Last-known reading values, kept so readings are not blank after a restart.
#[derive(Debug, Clone)]
pub struct StateStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredReading {
    pub reading_id: String,
    pub value: DecodedValue,
    pub icon: Option<String>,
    pub updated_at_ms: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("value encode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StateStore {
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&sqlite_url(path))?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL;")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL;")
            .execute(&pool)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reading_state (\
                reading_id TEXT PRIMARY KEY,\
                value TEXT NOT NULL,\
                icon TEXT,\
                updated_at INTEGER NOT NULL\
            )",
        )
        .execute(&pool)
        .await?;

        info!(path = %path, "state store initialized");

        Ok(Self { pool })
    }

    /// Upserts the reading. Unknown readings carry nothing worth restoring and are skipped.
    pub async fn save(&self, reading: &PublishedReading) -> Result<bool, StoreError> {
        let Some(value) = reading.value.as_ref() else {
            return Ok(false);
        };
        let encoded = serde_json::to_string(value)?;

        sqlx::query(
            "INSERT INTO reading_state (reading_id, value, icon, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(reading_id) DO UPDATE SET \
             value = excluded.value, icon = excluded.icon, updated_at = excluded.updated_at",
        )
        .bind(&reading.id)
        .bind(encoded)
        .bind(&reading.icon)
        .bind(i64::try_from(reading.updated_at_ms).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    pub async fn load_all(&self) -> Result<Vec<StoredReading>, StoreError> {
        let rows = sqlx::query(
            "SELECT reading_id, value, icon, updated_at FROM reading_state ORDER BY reading_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut readings = Vec::with_capacity(rows.len());
        for row in rows {
            let reading_id = row.get::<String, _>("reading_id");
            let raw = row.get::<String, _>("value");
            match serde_json::from_str::<DecodedValue>(&raw) {
                Ok(value) => readings.push(StoredReading {
                    reading_id,
                    value,
                    icon: row.get::<Option<String>, _>("icon"),
                    updated_at_ms: row.get::<i64, _>("updated_at"),
                }),
                Err(err) => {
                    warn!(reading = %reading_id, error = %err, "skipping unreadable stored value");
                }
            }
        }

        Ok(readings)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM reading_state")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }
}

fn sqlite_url(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite://{path}")
    }
}
