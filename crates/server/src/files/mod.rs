//! File Upload Module
//!
//! Upload metadata lives in SQLite; the bytes are stored on disk under the
//! upload directory, content-addressed by their sha256 hash.

pub mod handlers;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Metadata record for an uploaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

pub struct FileManager {
    db_path: PathBuf,
    upload_dir: PathBuf,
}

impl FileManager {
    pub async fn new(db_path: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Result<Self> {
        let manager = Self {
            db_path: db_path.into(),
            upload_dir: upload_dir.into(),
        };
        tokio::fs::create_dir_all(&manager.upload_dir).await?;
        manager.init_db().await?;

        info!("[Files] Initialized at {:?}", manager.upload_dir);
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
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        pool.close().await;
        Ok(())
    }

    /// Store uploaded bytes and record their metadata. Identical content
    /// shares one on-disk blob via the hash.
    pub async fn store_file(
        &self,
        owner_id: &str,
        filename: String,
        content_type: String,
        data: Bytes,
    ) -> Result<FileRecord> {
        if data.is_empty() {
            return Err(anyhow::anyhow!("Empty upload"));
        }

        let mut hasher = Sha256::new();
        hasher.update(&data);
        let hash = format!("{:x}", hasher.finalize());

        let blob_path = self.upload_dir.join(&hash);
        if !blob_path.exists() {
            tokio::fs::write(&blob_path, &data)
                .await
                .context("Failed to write upload to disk")?;
        }

        let record = FileRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            filename,
            content_type,
            size: data.len() as u64,
            hash,
            created_at: Utc::now(),
        };

        let pool = self.get_pool().await?;

        sqlx::query(
            "INSERT INTO files (id, owner_id, filename, content_type, size, hash, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.filename)
        .bind(&record.content_type)
        .bind(record.size as i64)
        .bind(&record.hash)
        .bind(record.created_at.to_rfc3339())
        .execute(&pool)
        .await?;

        pool.close().await;

        info!(
            "[Files] Stored {} ({} bytes) for {}",
            record.filename, record.size, owner_id
        );

        Ok(record)
    }

    /// Load a file's metadata and bytes by id
    pub async fn get_file(&self, file_id: &str) -> Result<(FileRecord, Bytes)> {
        let record = self.get_record(file_id).await?;

        let blob_path = self.upload_dir.join(&record.hash);
        let data = tokio::fs::read(&blob_path)
            .await
            .context("Upload bytes missing from disk")?;

        Ok((record, Bytes::from(data)))
    }

    /// Metadata only
    pub async fn get_record(&self, file_id: &str) -> Result<FileRecord> {
        let pool = self.get_pool().await?;

        let row: Option<(String, String, String, String, i64, String, String)> = sqlx::query_as(
            "SELECT id, owner_id, filename, content_type, size, hash, created_at FROM files WHERE id = ?",
        )
        .bind(file_id)
        .fetch_optional(&pool)
        .await?;

        pool.close().await;

        let (id, owner_id, filename, content_type, size, hash, created_at) =
            row.ok_or_else(|| anyhow::anyhow!("File not found: {}", file_id))?;

        Ok(FileRecord {
            id,
            owner_id,
            filename,
            content_type,
            size: size as u64,
            hash,
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        })
    }

    /// Files uploaded by a user, newest first
    pub async fn list_user_files(&self, owner_id: &str) -> Result<Vec<FileRecord>> {
        let pool = self.get_pool().await?;

        let rows: Vec<(String, String, String, i64, String, String)> = sqlx::query_as(
            "SELECT id, filename, content_type, size, hash, created_at FROM files
             WHERE owner_id = ? ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&pool)
        .await?;

        pool.close().await;

        Ok(rows
            .into_iter()
            .map(|(id, filename, content_type, size, hash, created_at)| FileRecord {
                id,
                owner_id: owner_id.to_string(),
                filename,
                content_type,
                size: size as u64,
                hash,
                created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }
}
