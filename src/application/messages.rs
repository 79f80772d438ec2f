//! Private messages between two users.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    CreateMessageParams, FollowsRepo, MessagesRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{MessageRecord, UserRecord};
use crate::domain::error::FieldErrors;
use crate::domain::posts::validate_comment_text;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("unknown user")]
    UnknownUser,
    #[error("message rejected: {0}")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub partner: UserRecord,
    /// Both directions, oldest first.
    pub messages: Vec<MessageRecord>,
    pub is_following: bool,
}

#[derive(Clone)]
pub struct MessageService {
    users: Arc<dyn UsersRepo>,
    messages: Arc<dyn MessagesRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl MessageService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        messages: Arc<dyn MessagesRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            users,
            messages,
            follows,
        }
    }

    pub async fn conversation(&self, viewer: Uuid, username: &str) -> Result<Conversation, MessageError> {
        let partner = self.resolve(username).await?;
        let mut messages = self.messages.list_between(viewer, partner.id).await?;
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let is_following =
            viewer != partner.id && self.follows.follow_exists(viewer, partner.id).await?;

        Ok(Conversation {
            partner,
            messages,
            is_following,
        })
    }

    /// Stores a message from `viewer` to `username`.
    pub async fn send(
        &self,
        viewer: Uuid,
        username: &str,
        text: &str,
    ) -> Result<MessageRecord, MessageError> {
        let recipient = self.resolve(username).await?;
        let mut errors = FieldErrors::new();
        let Some(text) = errors.collect(validate_comment_text(text)) else {
            return Err(MessageError::Invalid(errors));
        };

        let message = self
            .messages
            .create_message(CreateMessageParams {
                sender_id: viewer,
                recipient_id: recipient.id,
                text,
            })
            .await?;
        info!(message_id = %message.id, sender = %viewer, recipient = %recipient.id, "Message sent");
        Ok(message)
    }

    async fn resolve(&self, username: &str) -> Result<UserRecord, MessageError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(MessageError::UnknownUser)
    }
}
