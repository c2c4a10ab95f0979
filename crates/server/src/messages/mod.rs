//! Messaging Module
//!
//! Conversation and group messages with read-state tracking. Writes go
//! through the strategy dispatcher in [`dispatch`]. Stored in the same
//! SQLite database as auth (chatter.sqlite).

pub mod dispatch;
pub mod handlers;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use dispatch::{MessageDispatcher, OutgoingMessage};

/// A message in a conversation or group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub conversation_id: Option<String>,
    pub group_id: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A two-party conversation; the pair is stored in sorted order so
/// (a, b) and (b, a) resolve to the same row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_one_id: String,
    pub user_two_id: String,
    pub created_at: DateTime<Utc>,
}

/// Conversation listing entry with the peer and unread count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub peer_id: String,
    pub peer_username: String,
    pub unread: i64,
    pub created_at: DateTime<Utc>,
}

/// Message manager handles conversation and group messaging
pub struct MessageManager {
    db_path: PathBuf,
    dispatcher: MessageDispatcher,
}

impl MessageManager {
    /// Create new message manager
    pub async fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let manager = Self {
            db_path: db_path.into(),
            dispatcher: MessageDispatcher::new(),
        };
        manager.init_db().await?;

        info!("[Messages] Initialized");
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
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_one_id TEXT NOT NULL,
                user_two_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_one_id) REFERENCES users(id),
                FOREIGN KEY (user_two_id) REFERENCES users(id),
                UNIQUE(user_one_id, user_two_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                conversation_id TEXT,
                group_id TEXT,
                content TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (sender_id) REFERENCES users(id),
                FOREIGN KEY (conversation_id) REFERENCES conversations(id),
                FOREIGN KEY (group_id) REFERENCES groups(id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        pool.close().await;
        Ok(())
    }

    /// Send a message. The dispatcher enforces that exactly one of
    /// receiver/conversation/group is targeted and routes the write.
    pub async fn send_message(
        &self,
        sender_id: String,
        content: String,
        receiver_id: Option<String>,
        conversation_id: Option<String>,
        group_id: Option<String>,
    ) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(anyhow::anyhow!("Message content cannot be empty"));
        }

        let msg = OutgoingMessage {
            sender_id,
            content,
            receiver_id,
            conversation_id,
            group_id,
        };

        self.dispatcher.dispatch(self, &msg).await
    }

    /// Mark all unread messages in a conversation or group (not sent by the
    /// requester) as read. Rejects when nothing is unread.
    pub async fn mark_read(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        group_id: Option<&str>,
    ) -> Result<u64> {
        let pool = self.get_pool().await?;

        let updated = match (conversation_id, group_id) {
            (Some(conversation_id), None) => {
                if !self.is_participant(conversation_id, user_id).await? {
                    return Err(anyhow::anyhow!(
                        "Not a participant in conversation {}",
                        conversation_id
                    ));
                }
                sqlx::query(
                    "UPDATE messages SET is_read = 1 WHERE conversation_id = ? AND sender_id != ? AND is_read = 0",
                )
                .bind(conversation_id)
                .bind(user_id)
                .execute(&pool)
                .await?
            }
            (None, Some(group_id)) => {
                if !self.is_group_member(group_id, user_id).await? {
                    return Err(anyhow::anyhow!("Not a member of group {}", group_id));
                }
                sqlx::query(
                    "UPDATE messages SET is_read = 1 WHERE group_id = ? AND sender_id != ? AND is_read = 0",
                )
                .bind(group_id)
                .bind(user_id)
                .execute(&pool)
                .await?
            }
            _ => {
                return Err(anyhow::anyhow!(
                    "Mark-read targets exactly one of conversation or group"
                ));
            }
        };

        pool.close().await;

        let count = updated.rows_affected();
        if count == 0 {
            return Err(anyhow::anyhow!("No unread messages"));
        }

        info!("[Messages] {} marked {} message(s) read", user_id, count);

        Ok(count)
    }

    /// Messages of a conversation, oldest first. Requester must participate.
    pub async fn conversation_messages(
        &self,
        conversation_id: &str,
        requester_id: &str,
    ) -> Result<Vec<Message>> {
        if !self.is_participant(conversation_id, requester_id).await? {
            return Err(anyhow::anyhow!(
                "Not a participant in conversation {}",
                conversation_id
            ));
        }

        let pool = self.get_pool().await?;

        let rows: Vec<(String, String, Option<String>, Option<String>, String, bool, String)> =
            sqlx::query_as(
                "SELECT id, sender_id, conversation_id, group_id, content, is_read, created_at
                 FROM messages WHERE conversation_id = ? ORDER BY created_at",
            )
            .bind(conversation_id)
            .fetch_all(&pool)
            .await?;

        pool.close().await;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    /// Messages of a group, oldest first. Requester must be a member.
    pub async fn group_messages(&self, group_id: &str, requester_id: &str) -> Result<Vec<Message>> {
        if !self.is_group_member(group_id, requester_id).await? {
            return Err(anyhow::anyhow!("Not a member of group {}", group_id));
        }

        let pool = self.get_pool().await?;

        let rows: Vec<(String, String, Option<String>, Option<String>, String, bool, String)> =
            sqlx::query_as(
                "SELECT id, sender_id, conversation_id, group_id, content, is_read, created_at
                 FROM messages WHERE group_id = ? ORDER BY created_at",
            )
            .bind(group_id)
            .fetch_all(&pool)
            .await?;

        pool.close().await;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    /// The user's conversations with peer names and unread counts
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let pool = self.get_pool().await?;

        let rows: Vec<(String, String, String, i64, String)> = sqlx::query_as(
            r#"
            SELECT
                c.id,
                CASE WHEN c.user_one_id = ?1 THEN c.user_two_id ELSE c.user_one_id END AS peer_id,
                u.username,
                (SELECT COUNT(*) FROM messages m
                 WHERE m.conversation_id = c.id AND m.sender_id != ?1 AND m.is_read = 0),
                c.created_at
            FROM conversations c
            JOIN users u ON u.id = CASE WHEN c.user_one_id = ?1 THEN c.user_two_id ELSE c.user_one_id END
            WHERE c.user_one_id = ?1 OR c.user_two_id = ?1
            ORDER BY c.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&pool)
        .await?;

        pool.close().await;

        Ok(rows
            .into_iter()
            .map(|(id, peer_id, peer_username, unread, created_at)| ConversationSummary {
                id,
                peer_id,
                peer_username,
                unread,
                created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    /// Find the conversation for a user pair, creating it on first contact
    pub async fn find_or_create_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Conversation> {
        let (one, two) = normalized_pair(user_a, user_b);

        let pool = self.get_pool().await?;

        let existing: Option<(String, String)> = sqlx::query_as(
            "SELECT id, created_at FROM conversations WHERE user_one_id = ? AND user_two_id = ?",
        )
        .bind(&one)
        .bind(&two)
        .fetch_optional(&pool)
        .await?;

        if let Some((id, created_at)) = existing {
            pool.close().await;
            return Ok(Conversation {
                id,
                user_one_id: one,
                user_two_id: two,
                created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            });
        }

        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_one_id: one,
            user_two_id: two,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO conversations (id, user_one_id, user_two_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&conversation.user_one_id)
        .bind(&conversation.user_two_id)
        .bind(conversation.created_at.to_rfc3339())
        .execute(&pool)
        .await?;

        pool.close().await;

        info!(
            "[Messages] Conversation opened: {} <-> {}",
            conversation.user_one_id, conversation.user_two_id
        );

        Ok(conversation)
    }

    /// Write a message row. Called by the strategies after validation.
    pub(crate) async fn insert_message(
        &self,
        sender_id: &str,
        content: &str,
        conversation_id: Option<&str>,
        group_id: Option<&str>,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            conversation_id: conversation_id.map(Into::into),
            group_id: group_id.map(Into::into),
            content: content.to_string(),
            is_read: false,
            created_at: Utc::now(),
        };

        let pool = self.get_pool().await?;

        sqlx::query(
            "INSERT INTO messages (id, sender_id, conversation_id, group_id, content, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.conversation_id)
        .bind(&message.group_id)
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&pool)
        .await?;

        pool.close().await;

        Ok(message)
    }

    /// Membership check against the groups tables
    pub(crate) async fn is_group_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let pool = self.get_pool().await?;
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
        pool.close().await;
        Ok(row.is_some())
    }

    /// Participant check for a conversation
    pub(crate) async fn is_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        let pool = self.get_pool().await?;
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM conversations WHERE id = ? AND (user_one_id = ? OR user_two_id = ?)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
        pool.close().await;
        Ok(row.is_some())
    }

    /// Existence check against the users table
    pub(crate) async fn user_exists(&self, user_id: &str) -> Result<bool> {
        let pool = self.get_pool().await?;
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&pool)
            .await?;
        pool.close().await;
        Ok(row.is_some())
    }
}

fn row_to_message(
    (id, sender_id, conversation_id, group_id, content, is_read, created_at): (
        String,
        String,
        Option<String>,
        Option<String>,
        String,
        bool,
        String,
    ),
) -> Message {
    Message {
        id,
        sender_id,
        conversation_id,
        group_id,
        content,
        is_read,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
    }
}

fn normalized_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::normalized_pair;

    #[test]
    fn pair_order_is_canonical() {
        assert_eq!(normalized_pair("alice", "bob"), normalized_pair("bob", "alice"));
        let (one, two) = normalized_pair("zoe", "amy");
        assert!(one <= two);
    }
}
