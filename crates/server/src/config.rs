//! Server configuration and shared state

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::AuthManager;
use crate::files::FileManager;
use crate::groups::GroupManager;
use crate::messages::MessageManager;
use crate::quick::QuickMessageManager;

/// Configuration for the Chatter server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Base directory for all server data
    pub base_dir: PathBuf,
    /// Directory holding uploaded file bytes (content-addressed)
    pub upload_dir: PathBuf,
    /// Invite code lifetime in hours
    pub invite_ttl_hours: i64,
    /// Max upload size in MB
    pub max_upload_size: usize,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_base_dir("chatter_data")
    }
}

impl ServerConfig {
    /// Create config with custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();
        Self {
            upload_dir: base.join("uploads"),
            base_dir: base,
            invite_ttl_hours: std::env::var("INVITE_TTL_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(24),
            max_upload_size: 50,
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3001),
        }
    }

    /// Path of the SQLite database holding all tables
    pub fn db_path(&self) -> PathBuf {
        self.base_dir.join("chatter.sqlite")
    }

    /// Ensure all directories exist
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        Ok(())
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub auth: Arc<AuthManager>,
    pub groups: Arc<GroupManager>,
    pub messages: Arc<MessageManager>,
    pub quick: Arc<QuickMessageManager>,
    pub files: Arc<FileManager>,
}
