//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{NumberedPage, PageRequest};
use crate::domain::entities::{
    CommentRecord, CommentView, FollowRecord, GroupRecord, MessageRecord, PostRecord,
    PostSummary, SessionRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which posts a feed lists. Every variant is ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostQueryFilter {
    All,
    Group(Uuid),
    Author(Uuid),
    /// Posts whose author is followed by this user.
    FollowedBy(Uuid),
    /// Case-insensitive substring of the post text.
    TextContains(String),
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateGroupParams {
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub text: String,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CreateMessageParams {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    /// All users ordered by username.
    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError>;

    /// All groups ordered by title.
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<NumberedPage<PostSummary>, RepoError>;

    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;

    async fn find_summary(&self, id: i64) -> Result<Option<PostSummary>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    /// Comments on a post, oldest first.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentView>, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Inserts the edge; `None` when it already existed.
    async fn insert_follow(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<Option<FollowRecord>, RepoError>;

    /// Removes the edge; `false` when there was none.
    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid)
    -> Result<bool, RepoError>;

    async fn follow_exists(&self, follower_id: Uuid, followed_id: Uuid)
    -> Result<bool, RepoError>;

    async fn count_followers(&self, user_id: Uuid) -> Result<u64, RepoError>;

    async fn count_following(&self, user_id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait MessagesRepo: Send + Sync {
    async fn create_message(&self, params: CreateMessageParams)
    -> Result<MessageRecord, RepoError>;

    /// Messages exchanged in either direction, oldest first.
    async fn list_between(&self, a: Uuid, b: Uuid) -> Result<Vec<MessageRecord>, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError>;

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError>;

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
