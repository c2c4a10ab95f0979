//! Group & Membership Module
//!
//! Handles group creation, time-boxed invite codes, joins and membership.
//! Stored in the same SQLite database as auth (chatter.sqlite).

pub mod handlers;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

/// A chat group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub invite_code: Option<String>,
    pub invite_code_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Membership record, unique per (group, user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
}

/// Member row joined with the user's name, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMemberInfo {
    pub user_id: String,
    pub username: String,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
}

/// A freshly generated invite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInvite {
    pub group_id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Group manager handles groups and memberships
pub struct GroupManager {
    db_path: PathBuf,
    /// Invite code lifetime
    invite_ttl_hours: i64,
}

impl GroupManager {
    /// Create new group manager
    pub async fn new(db_path: impl Into<PathBuf>, invite_ttl_hours: i64) -> Result<Self> {
        let manager = Self {
            db_path: db_path.into(),
            invite_ttl_hours,
        };
        manager.init_db().await?;

        info!("[Groups] Initialized (invite TTL {}h)", invite_ttl_hours);
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

    /// Initialize database tables
    async fn init_db(&self) -> Result<()> {
        let pool = self.get_pool().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_by TEXT NOT NULL,
                invite_code TEXT,
                invite_code_expires_at TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (created_by) REFERENCES users(id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_members (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                joined_at TEXT NOT NULL,
                FOREIGN KEY (group_id) REFERENCES groups(id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                UNIQUE(group_id, user_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        pool.close().await;
        Ok(())
    }

    /// Create a group; the creator becomes its first admin member
    pub async fn create_group(&self, name: String, creator_id: String) -> Result<Group> {
        if name.trim().is_empty() {
            return Err(anyhow::anyhow!("Group name cannot be empty"));
        }

        let pool = self.get_pool().await?;

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name,
            created_by: creator_id.clone(),
            invite_code: None,
            invite_code_expires_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO groups (id, name, created_by, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.created_by)
        .bind(group.created_at.to_rfc3339())
        .execute(&pool)
        .await?;

        sqlx::query(
            "INSERT INTO group_members (id, group_id, user_id, is_admin, joined_at) VALUES (?, ?, ?, 1, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&group.id)
        .bind(&creator_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await?;

        pool.close().await;

        info!("[Groups] Created '{}' by {}", group.name, creator_id);

        Ok(group)
    }

    /// Generate a fresh invite code for a group. Admin only; replaces any
    /// previous code.
    pub async fn generate_invite(&self, group_id: &str, requester_id: &str) -> Result<GroupInvite> {
        let pool = self.get_pool().await?;

        let membership: Option<(bool,)> = sqlx::query_as(
            "SELECT is_admin FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(requester_id)
        .fetch_optional(&pool)
        .await?;

        match membership {
            None => {
                return Err(anyhow::anyhow!("Not a member of this group"));
            }
            Some((is_admin,)) if !is_admin => {
                warn!(
                    "[Groups] Invite refused: {} is not an admin of {}",
                    requester_id, group_id
                );
                return Err(anyhow::anyhow!("Only group admins can generate invite links"));
            }
            Some(_) => {}
        }

        let invite = GroupInvite {
            group_id: group_id.to_string(),
            code: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + Duration::hours(self.invite_ttl_hours),
        };

        let updated = sqlx::query(
            "UPDATE groups SET invite_code = ?, invite_code_expires_at = ? WHERE id = ?",
        )
        .bind(&invite.code)
        .bind(invite.expires_at.to_rfc3339())
        .bind(group_id)
        .execute(&pool)
        .await?;

        pool.close().await;

        if updated.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Group not found: {}", group_id));
        }

        info!("[Groups] Invite generated for {} by {}", group_id, requester_id);

        Ok(invite)
    }

    /// Revoke the current invite code. Admin only.
    pub async fn revoke_invite(&self, group_id: &str, requester_id: &str) -> Result<()> {
        let pool = self.get_pool().await?;

        let admin: Option<(bool,)> = sqlx::query_as(
            "SELECT is_admin FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(requester_id)
        .fetch_optional(&pool)
        .await?;

        if !matches!(admin, Some((true,))) {
            return Err(anyhow::anyhow!("Only group admins can revoke invite links"));
        }

        sqlx::query(
            "UPDATE groups SET invite_code = NULL, invite_code_expires_at = NULL WHERE id = ?",
        )
        .bind(group_id)
        .execute(&pool)
        .await?;

        pool.close().await;

        info!("[Groups] Invite revoked for {}", group_id);

        Ok(())
    }

    /// Join a group via invite code. Rejects unknown and expired codes and
    /// duplicate memberships.
    pub async fn join_with_code(&self, code: &str, user_id: &str) -> Result<GroupMember> {
        let pool = self.get_pool().await?;

        let row: Option<(String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, name, invite_code_expires_at FROM groups WHERE invite_code = ?",
        )
        .bind(code)
        .fetch_optional(&pool)
        .await?;

        let (group_id, group_name, expires_at) =
            row.ok_or_else(|| anyhow::anyhow!("Invalid invite code"))?;

        let expires: DateTime<Utc> = expires_at
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("Invalid invite code"))?;

        if expires <= Utc::now() {
            warn!("[Groups] Expired invite used for {}", group_id);
            return Err(anyhow::anyhow!("Invite code has expired"));
        }

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(&group_id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;

        if existing.is_some() {
            return Err(anyhow::anyhow!("Already a member of this group"));
        }

        let member = GroupMember {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.clone(),
            user_id: user_id.to_string(),
            is_admin: false,
            joined_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO group_members (id, group_id, user_id, is_admin, joined_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&member.id)
        .bind(&member.group_id)
        .bind(&member.user_id)
        .bind(member.joined_at.to_rfc3339())
        .execute(&pool)
        .await?;

        pool.close().await;

        info!("[Groups] {} joined '{}'", user_id, group_name);

        Ok(member)
    }

    /// Leave a group. The only admin cannot leave while other members remain.
    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        let pool = self.get_pool().await?;

        let membership: Option<(bool,)> = sqlx::query_as(
            "SELECT is_admin FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;

        let (is_admin,) = membership.ok_or_else(|| anyhow::anyhow!("Not a member of this group"))?;

        if is_admin {
            let (admins, members): (i64, i64) = sqlx::query_as(
                "SELECT COALESCE(SUM(is_admin), 0), COUNT(*) FROM group_members WHERE group_id = ?",
            )
            .bind(group_id)
            .fetch_one(&pool)
            .await?;

            if admins == 1 && members > 1 {
                return Err(anyhow::anyhow!(
                    "Promote another admin before leaving the group"
                ));
            }
        }

        sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .execute(&pool)
            .await?;

        pool.close().await;

        info!("[Groups] {} left {}", user_id, group_id);

        Ok(())
    }

    /// Promote a member to admin. Admin only.
    pub async fn promote_member(
        &self,
        group_id: &str,
        requester_id: &str,
        member_id: &str,
    ) -> Result<()> {
        let pool = self.get_pool().await?;

        let admin: Option<(bool,)> = sqlx::query_as(
            "SELECT is_admin FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(requester_id)
        .fetch_optional(&pool)
        .await?;

        if !matches!(admin, Some((true,))) {
            return Err(anyhow::anyhow!("Only group admins can promote members"));
        }

        let updated = sqlx::query(
            "UPDATE group_members SET is_admin = 1 WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(member_id)
        .execute(&pool)
        .await?;

        pool.close().await;

        if updated.rows_affected() == 0 {
            return Err(anyhow::anyhow!("No such member in this group"));
        }

        info!("[Groups] {} promoted in {}", member_id, group_id);

        Ok(())
    }

    /// Groups the user belongs to
    pub async fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>> {
        let pool = self.get_pool().await?;

        let rows: Vec<(String, String, String, Option<String>, Option<String>, String)> =
            sqlx::query_as(
                r#"
                SELECT g.id, g.name, g.created_by, g.invite_code, g.invite_code_expires_at, g.created_at
                FROM groups g
                JOIN group_members m ON g.id = m.group_id
                WHERE m.user_id = ?
                ORDER BY g.created_at
                "#,
            )
            .bind(user_id)
            .fetch_all(&pool)
            .await?;

        pool.close().await;

        Ok(rows
            .into_iter()
            .map(
                |(id, name, created_by, invite_code, expires_at, created_at)| Group {
                    id,
                    name,
                    created_by,
                    invite_code,
                    invite_code_expires_at: expires_at.and_then(|s| s.parse().ok()),
                    created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
                },
            )
            .collect())
    }

    /// Members of a group, with usernames. Requester must be a member.
    pub async fn list_members(&self, group_id: &str, requester_id: &str) -> Result<Vec<GroupMemberInfo>> {
        let pool = self.get_pool().await?;

        if !self.is_member(&pool, group_id, requester_id).await? {
            return Err(anyhow::anyhow!("Not a member of this group"));
        }

        let rows: Vec<(String, String, bool, String)> = sqlx::query_as(
            r#"
            SELECT m.user_id, u.username, m.is_admin, m.joined_at
            FROM group_members m
            JOIN users u ON m.user_id = u.id
            WHERE m.group_id = ?
            ORDER BY m.joined_at
            "#,
        )
        .bind(group_id)
        .fetch_all(&pool)
        .await?;

        pool.close().await;

        Ok(rows
            .into_iter()
            .map(|(user_id, username, is_admin, joined_at)| GroupMemberInfo {
                user_id,
                username,
                is_admin,
                joined_at: joined_at.parse().unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    async fn is_member(
        &self,
        pool: &sqlx::SqlitePool,
        group_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }
}
