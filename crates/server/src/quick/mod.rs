//! Quick Message Module
//!
//! User-owned reusable text snippets keyed by a short string.

pub mod handlers;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// A keyed text snippet owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickMessage {
    pub id: String,
    pub user_id: String,
    pub key: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

pub struct QuickMessageManager {
    db_path: PathBuf,
}

impl QuickMessageManager {
    pub async fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let manager = Self {
            db_path: db_path.into(),
        };
        manager.init_db().await?;

        info!("[Quick] Initialized");
        Ok(manager)
    }

    async fn get_pool(&self) -> Result<sqlx::SqlitePool> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            self.db_path.to_string_lossy().replace('\\', "/")
        ))?
        .create_if_missing(true);
        Ok(SqlitePoolOptions::new().connect_with(options).await?)
    }

    async fn init_db(&self) -> Result<()> {
        let pool = self.get_pool().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quick_messages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                key TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                UNIQUE(user_id, key)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        pool.close().await;
        Ok(())
    }

    /// Create a snippet. The key must be unused for this user.
    pub async fn create(&self, user_id: &str, key: String, text: String) -> Result<QuickMessage> {
        if key.trim().is_empty() {
            return Err(anyhow::anyhow!("Key cannot be empty"));
        }

        let pool = self.get_pool().await?;

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM quick_messages WHERE user_id = ? AND key = ?",
        )
        .bind(user_id)
        .bind(&key)
        .fetch_optional(&pool)
        .await?;

        if existing.is_some() {
            return Err(anyhow::anyhow!("Quick message '{}' already exists", key));
        }

        let quick = QuickMessage {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            key,
            text,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO quick_messages (id, user_id, key, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&quick.id)
        .bind(&quick.user_id)
        .bind(&quick.key)
        .bind(&quick.text)
        .bind(quick.created_at.to_rfc3339())
        .execute(&pool)
        .await?;

        pool.close().await;

        info!("[Quick] '{}' created for {}", quick.key, user_id);

        Ok(quick)
    }

    /// The user's snippets, sorted by key
    pub async fn list(&self, user_id: &str) -> Result<Vec<QuickMessage>> {
        let pool = self.get_pool().await?;

        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, key, text, created_at FROM quick_messages WHERE user_id = ? ORDER BY key",
        )
        .bind(user_id)
        .fetch_all(&pool)
        .await?;

        pool.close().await;

        Ok(rows
            .into_iter()
            .map(|(id, key, text, created_at)| QuickMessage {
                id,
                user_id: user_id.to_string(),
                key,
                text,
                created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    /// Replace the text behind a key
    pub async fn update(&self, user_id: &str, key: &str, text: String) -> Result<()> {
        let pool = self.get_pool().await?;

        let updated = sqlx::query(
            "UPDATE quick_messages SET text = ? WHERE user_id = ? AND key = ?",
        )
        .bind(&text)
        .bind(user_id)
        .bind(key)
        .execute(&pool)
        .await?;

        pool.close().await;

        if updated.rows_affected() == 0 {
            return Err(anyhow::anyhow!("No quick message '{}'", key));
        }

        Ok(())
    }

    /// Delete a snippet by key
    pub async fn delete(&self, user_id: &str, key: &str) -> Result<()> {
        let pool = self.get_pool().await?;

        let deleted = sqlx::query("DELETE FROM quick_messages WHERE user_id = ? AND key = ?")
            .bind(user_id)
            .bind(key)
            .execute(&pool)
            .await?;

        pool.close().await;

        if deleted.rows_affected() == 0 {
            return Err(anyhow::anyhow!("No quick message '{}'", key));
        }

        info!("[Quick] '{}' deleted for {}", key, user_id);

        Ok(())
    }
}
