//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl UserRecord {
    /// Full name when one was given at sign-up, the username otherwise.
    pub fn display_name(&self) -> String {
        crate::domain::users::display_name(&self.first_name, &self.last_name, &self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub image_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A post joined with everything a feed card shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub text: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_name: String,
    pub group_id: Option<Uuid>,
    pub group_slug: Option<String>,
    pub group_title: Option<String>,
    pub image_path: Option<String>,
    pub comment_count: u64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author_username: String,
    pub author_name: String,
    pub text: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowRecord {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub text: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}
