//! SQLite row sink
//!
//! Every submission is inserted inside one transaction, so a batch is either
//! fully written or not written at all.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use slt_common::sink::{Ack, PersistenceError, Row, RowSink};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row as _, SqlitePool};
use std::path::Path;

/// Append-only `responses` table
pub struct SqliteSink {
    pool: SqlitePool,
}

/// A row as read back from the table
#[derive(Debug, Clone, Serialize)]
pub struct StoredResponse {
    pub id: i64,
    pub submitted_at: String,
    pub contact: String,
    pub section_id: String,
    pub item_number: i64,
    pub media: Vec<String>,
    pub answers: Vec<(String, String)>,
}

impl SqliteSink {
    /// Open (or create) the database file and ensure the table exists
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // mode=rwc: read, write, create
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        tracing::debug!("Connecting to database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Ok(Self::from_pool(pool).await?)
    }

    /// Private in-memory database (single connection so every query sees it)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::from_pool(pool).await?)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn count_rows(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM responses")
            .fetch_one(&self.pool)
            .await
    }

    /// All stored rows in insertion order
    pub async fn stored_rows(&self) -> Result<Vec<StoredResponse>> {
        let records = sqlx::query(
            "SELECT id, submitted_at, contact, section_id, item_number, media, answers \
             FROM responses ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        records
            .into_iter()
            .map(|r| -> Result<StoredResponse> {
                Ok(StoredResponse {
                    id: r.try_get("id")?,
                    submitted_at: r.try_get("submitted_at")?,
                    contact: r.try_get("contact")?,
                    section_id: r.try_get("section_id")?,
                    item_number: r.try_get("item_number")?,
                    media: serde_json::from_str(r.try_get("media")?)?,
                    answers: serde_json::from_str(r.try_get("answers")?)?,
                })
            })
            .collect()
    }
}

/// Create the responses table if it doesn't exist
async fn init_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS responses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submitted_at TEXT NOT NULL,
            contact TEXT NOT NULL,
            section_id TEXT NOT NULL,
            item_number INTEGER NOT NULL,
            media TEXT NOT NULL,
            answers TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (responses)");
    Ok(())
}

fn db_error(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Database(e.to_string())
}

#[async_trait]
impl RowSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn append_rows(&self, rows: &[Row]) -> Result<Ack, PersistenceError> {
        // Prepare all data BEFORE acquiring a connection
        let submitted_at = Utc::now().to_rfc3339();
        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            let media = serde_json::to_string(&row.media).map_err(db_error)?;
            let answers = serde_json::to_string(&row.answers).map_err(db_error)?;
            prepared.push((row, media, answers));
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for (row, media, answers) in prepared {
            sqlx::query(
                r#"
                INSERT INTO responses (submitted_at, contact, section_id, item_number, media, answers)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&submitted_at)
            .bind(&row.contact)
            .bind(&row.section_id)
            .bind(row.item_number as i64)
            .bind(media)
            .bind(answers)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;

        Ok(Ack {
            rows_written: rows.len(),
        })
    }
}
