//! Send-message strategy dispatch
//!
//! A message targets exactly one of {receiver, conversation, group}. The
//! dispatcher resolves the target from whichever identifier is populated
//! and routes the write through the matching strategy.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::{Message, MessageManager};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("message has no target")]
    MissingTarget,
    #[error("message must target exactly one of receiver, conversation or group")]
    AmbiguousTarget,
    #[error("sender is not a member of group {0}")]
    NotAMember(String),
    #[error("sender is not a participant in conversation {0}")]
    NotAParticipant(String),
    #[error("receiver not found: {0}")]
    ReceiverNotFound(String),
}

/// Where a message is headed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    Group(String),
    Conversation(String),
    /// Direct message to a user; the conversation is resolved or created
    Direct(String),
}

/// A message about to be written, before target validation
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub sender_id: String,
    pub content: String,
    pub receiver_id: Option<String>,
    pub conversation_id: Option<String>,
    pub group_id: Option<String>,
}

impl OutgoingMessage {
    /// Resolve the target. Exactly one identifier must be populated.
    pub fn target(&self) -> Result<MessageTarget, DispatchError> {
        let candidates = [
            self.group_id.as_deref().map(|id| MessageTarget::Group(id.to_string())),
            self.conversation_id
                .as_deref()
                .map(|id| MessageTarget::Conversation(id.to_string())),
            self.receiver_id
                .as_deref()
                .map(|id| MessageTarget::Direct(id.to_string())),
        ];

        let mut populated = candidates.into_iter().flatten();
        let target = populated.next().ok_or(DispatchError::MissingTarget)?;
        if populated.next().is_some() {
            return Err(DispatchError::AmbiguousTarget);
        }
        Ok(target)
    }
}

#[async_trait]
pub trait SendMessageStrategy: Send + Sync {
    /// Strategy name (for logging)
    fn name(&self) -> &'static str;

    async fn send(
        &self,
        store: &MessageManager,
        msg: &OutgoingMessage,
        target: &MessageTarget,
    ) -> anyhow::Result<Message>;
}

/// Writes a message into a group the sender belongs to
#[derive(Debug, Default)]
pub struct GroupMessageStrategy;

#[async_trait]
impl SendMessageStrategy for GroupMessageStrategy {
    fn name(&self) -> &'static str {
        "group"
    }

    async fn send(
        &self,
        store: &MessageManager,
        msg: &OutgoingMessage,
        target: &MessageTarget,
    ) -> anyhow::Result<Message> {
        let MessageTarget::Group(group_id) = target else {
            anyhow::bail!("group strategy received non-group target");
        };

        if !store.is_group_member(group_id, &msg.sender_id).await? {
            return Err(DispatchError::NotAMember(group_id.clone()).into());
        }

        store
            .insert_message(&msg.sender_id, &msg.content, None, Some(group_id.as_str()))
            .await
    }
}

/// Writes a message into a two-party conversation, resolving the
/// conversation from a receiver id when needed
#[derive(Debug, Default)]
pub struct ConversationMessageStrategy;

#[async_trait]
impl SendMessageStrategy for ConversationMessageStrategy {
    fn name(&self) -> &'static str {
        "conversation"
    }

    async fn send(
        &self,
        store: &MessageManager,
        msg: &OutgoingMessage,
        target: &MessageTarget,
    ) -> anyhow::Result<Message> {
        let conversation_id = match target {
            MessageTarget::Conversation(id) => {
                if !store.is_participant(id, &msg.sender_id).await? {
                    return Err(DispatchError::NotAParticipant(id.clone()).into());
                }
                id.clone()
            }
            MessageTarget::Direct(receiver_id) => {
                if receiver_id == &msg.sender_id {
                    anyhow::bail!("Cannot send a direct message to yourself");
                }
                if !store.user_exists(receiver_id).await? {
                    return Err(DispatchError::ReceiverNotFound(receiver_id.clone()).into());
                }
                store
                    .find_or_create_conversation(&msg.sender_id, receiver_id)
                    .await?
                    .id
            }
            MessageTarget::Group(_) => {
                anyhow::bail!("conversation strategy received group target");
            }
        };

        store
            .insert_message(
                &msg.sender_id,
                &msg.content,
                Some(conversation_id.as_str()),
                None,
            )
            .await
    }
}

/// Picks the write path for an outgoing message
pub struct MessageDispatcher {
    group: GroupMessageStrategy,
    conversation: ConversationMessageStrategy,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self {
            group: GroupMessageStrategy,
            conversation: ConversationMessageStrategy,
        }
    }

    pub fn select(&self, target: &MessageTarget) -> &dyn SendMessageStrategy {
        match target {
            MessageTarget::Group(_) => &self.group,
            MessageTarget::Conversation(_) | MessageTarget::Direct(_) => &self.conversation,
        }
    }

    pub async fn dispatch(
        &self,
        store: &MessageManager,
        msg: &OutgoingMessage,
    ) -> anyhow::Result<Message> {
        let target = msg.target()?;
        let strategy = self.select(&target);
        debug!("[Dispatch] {} -> {} strategy", msg.sender_id, strategy.name());
        strategy.send(store, msg, &target).await
    }
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
