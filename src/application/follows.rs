//! The follow graph: directed edges between users.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollowIgnored,
}

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown user")]
    UnknownUser,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Creates the edge `follower -> followee` unless it exists or both are the same user.
    pub async fn follow(&self, follower: Uuid, followee: Uuid) -> Result<FollowOutcome, FollowError> {
        if follower == followee {
            return Ok(FollowOutcome::SelfFollowIgnored);
        }
        match self.follows.insert_follow(follower, followee).await? {
            Some(edge) => {
                info!(
                    follower = %edge.follower_id,
                    followed = %edge.followed_id,
                    "Follow edge created"
                );
                Ok(FollowOutcome::Created)
            }
            None => Ok(FollowOutcome::AlreadyFollowing),
        }
    }

    pub async fn follow_username(
        &self,
        follower: Uuid,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let followee = self.resolve(username).await?;
        self.follow(follower, followee.id).await
    }

    /// Removes the edge; returns whether one existed.
    pub async fn unfollow(&self, follower: Uuid, followee: Uuid) -> Result<bool, FollowError> {
        let removed = self.follows.delete_follow(follower, followee).await?;
        if removed {
            info!(follower = %follower, followed = %followee, "Follow edge removed");
        }
        Ok(removed)
    }

    pub async fn unfollow_username(&self, follower: Uuid, username: &str) -> Result<bool, FollowError> {
        let followee = self.resolve(username).await?;
        self.unfollow(follower, followee.id).await
    }

    pub async fn is_following(&self, follower: Uuid, followee: Uuid) -> Result<bool, FollowError> {
        if follower == followee {
            return Ok(false);
        }
        Ok(self.follows.follow_exists(follower, followee).await?)
    }

    pub async fn follower_count(&self, user: Uuid) -> Result<u64, FollowError> {
        Ok(self.follows.count_followers(user).await?)
    }

    pub async fn following_count(&self, user: Uuid) -> Result<u64, FollowError> {
        Ok(self.follows.count_following(user).await?)
    }

    async fn resolve(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FollowError::UnknownUser)
    }
}
