//! Authentication Module
//!
//! Registration, login and session management over the shared SQLite
//! database. Validated sessions are cached as user snapshots so the auth
//! middleware answers repeat requests without touching the database.

pub mod handlers;
pub mod middleware;

use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Session lifetime in days
const SESSION_TTL_DAYS: i64 = 30;

/// User profile. Credentials never leave the manager; the bcrypt hash
/// lives only in the users table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Public user info returned to other users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

/// An issued session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Snapshot of a successfully validated session
#[derive(Debug, Clone)]
struct CachedSession {
    user: UserInfo,
    expires_at: DateTime<Utc>,
}

/// Auth manager handles all authentication
pub struct AuthManager {
    db_path: PathBuf,
    /// Token -> validated user snapshot
    cache: RwLock<HashMap<String, CachedSession>>,
}

impl AuthManager {
    /// Create new auth manager
    pub async fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let manager = Self {
            db_path: db_path.into(),
            cache: RwLock::new(HashMap::new()),
        };

        manager.init_db().await?;

        info!("[Auth] Initialized at {:?}", manager.db_path);

        Ok(manager)
    }

    /// Get database connection
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

    /// Initialize users and sessions tables
    async fn init_db(&self) -> Result<()> {
        let pool = self.get_pool().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_login TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                issued_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
            .execute(&pool)
            .await?;

        pool.close().await;
        Ok(())
    }

    /// Register a new user and log them straight in. Email uniqueness is
    /// enforced by the UNIQUE index rather than a lookup-then-insert.
    pub async fn register(
        &self,
        email: String,
        username: String,
        password: String,
    ) -> Result<(User, Session)> {
        if !email.contains('@') {
            return Err(anyhow::anyhow!("Invalid email address"));
        }

        let password_hash = hash(&password, DEFAULT_COST).context("Failed to hash password")?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            username,
            created_at: Utc::now(),
            last_login: None,
        };

        let pool = self.get_pool().await?;

        let inserted = sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&pool)
        .await;

        if let Err(e) = &inserted {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                pool.close().await;
                return Err(anyhow::anyhow!("Email already registered"));
            }
        }
        inserted?;

        let session = self.issue_session(&pool, &user).await?;

        pool.close().await;

        info!("[Auth] User registered: {} ({})", user.username, user.email);

        Ok((user, session))
    }

    /// Login user and create session
    pub async fn login(&self, email: String, password: String) -> Result<(User, Session)> {
        let pool = self.get_pool().await?;

        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, username, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(&email)
        .fetch_optional(&pool)
        .await?;

        let Some((id, username, password_hash, created_at)) = row else {
            pool.close().await;
            return Err(anyhow::anyhow!("Invalid email or password"));
        };

        if !verify(&password, &password_hash).context("Failed to verify password")? {
            pool.close().await;
            warn!("[Auth] Failed login attempt for {}", email);
            return Err(anyhow::anyhow!("Invalid email or password"));
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(&id)
            .execute(&pool)
            .await?;

        let user = User {
            id,
            email,
            username,
            created_at: parse_ts(&created_at),
            last_login: Some(now),
        };

        let session = self.issue_session(&pool, &user).await?;

        pool.close().await;

        info!("[Auth] User logged in: {}", user.username);

        Ok((user, session))
    }

    /// Persist a fresh session and prime the snapshot cache with it
    async fn issue_session(&self, pool: &sqlx::SqlitePool, user: &User) -> Result<Session> {
        let issued_at = Utc::now();
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            issued_at,
            expires_at: issued_at + Duration::days(SESSION_TTL_DAYS),
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, issued_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(session.issued_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(pool)
        .await?;

        self.cache.write().await.insert(
            session.token.clone(),
            CachedSession {
                user: UserInfo::from(user.clone()),
                expires_at: session.expires_at,
            },
        );

        Ok(session)
    }

    /// Validate a session token. Cache hits are answered from the snapshot;
    /// misses fall back to the database and repopulate the cache.
    pub async fn validate_session(&self, token: &str) -> Result<UserInfo> {
        let now = Utc::now();

        if let Some(cached) = self.cache.read().await.get(token) {
            if cached.expires_at > now {
                return Ok(cached.user.clone());
            }
        }

        let pool = self.get_pool().await?;

        let row: Option<(String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT s.expires_at, u.id, u.email, u.username, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&pool)
        .await?;

        pool.close().await;

        let Some((expires_at, id, email, username, created_at)) = row else {
            // Stale cache entries die with their database row
            self.cache.write().await.remove(token);
            return Err(anyhow::anyhow!("Invalid or expired session"));
        };

        let expires: DateTime<Utc> = expires_at
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid date"))?;
        if expires <= now {
            self.cache.write().await.remove(token);
            return Err(anyhow::anyhow!("Invalid or expired session"));
        }

        let user = UserInfo {
            id,
            email,
            username,
            created_at: parse_ts(&created_at),
        };

        self.cache.write().await.insert(
            token.to_string(),
            CachedSession {
                user: user.clone(),
                expires_at: expires,
            },
        );

        Ok(user)
    }

    /// Logout user (invalidate session)
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.cache.write().await.remove(token);

        let pool = self.get_pool().await?;
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&pool)
            .await?;
        pool.close().await;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Unknown session"));
        }

        info!("[Auth] Session invalidated");

        Ok(())
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: &str) -> Result<UserInfo> {
        let pool = self.get_pool().await?;

        let row: Option<(String, String, String, String)> =
            sqlx::query_as("SELECT id, email, username, created_at FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&pool)
                .await?;

        pool.close().await;

        let (id, email, username, created_at) =
            row.ok_or_else(|| anyhow::anyhow!("User not found"))?;

        Ok(UserInfo {
            id,
            email,
            username,
            created_at: parse_ts(&created_at),
        })
    }

    /// List all users (for contact discovery)
    pub async fn list_users(&self) -> Result<Vec<UserInfo>> {
        let pool = self.get_pool().await?;

        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, email, username, created_at FROM users ORDER BY username",
        )
        .fetch_all(&pool)
        .await?;

        pool.close().await;

        Ok(rows
            .into_iter()
            .map(|(id, email, username, created_at)| UserInfo {
                id,
                email,
                username,
                created_at: parse_ts(&created_at),
            })
            .collect())
    }
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|_| Utc::now())
}
