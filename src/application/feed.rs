//! Feed composition: which posts a page lists and the context around them.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::application::pagination::{NumberedPage, PAGE_SIZE, PageNumber, PageRequest};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostQueryFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentView, GroupRecord, PostSummary, UserRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    All,
    Group(String),
    Author(String),
    Following(Uuid),
    Search(String),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown author")]
    UnknownAuthor,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct Feed {
    pub posts: NumberedPage<PostSummary>,
    /// Set for group feeds.
    pub group: Option<GroupRecord>,
    /// Set for author feeds.
    pub author: Option<UserRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct Sidebar {
    pub groups: Vec<GroupRecord>,
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorStats {
    pub posts: u64,
    pub followers: u64,
    pub following: u64,
}

#[derive(Debug, Clone)]
pub struct ProfileContext {
    pub author: UserRecord,
    pub posts: NumberedPage<PostSummary>,
    pub stats: AuthorStats,
    pub is_following: bool,
    pub is_self: bool,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostSummary,
    pub author: UserRecord,
    pub comments: Vec<CommentView>,
    pub stats: AuthorStats,
    pub is_following: bool,
    pub is_author: bool,
}

#[derive(Clone)]
pub struct FeedService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FeedService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            users,
            groups,
            posts,
            comments,
            follows,
        }
    }

    /// One page of the feed for `scope`, newest first.
    ///
    /// A page past the end comes back empty with the real totals.
    pub async fn feed(&self, scope: &FeedScope, page: PageNumber) -> Result<Feed, FeedError> {
        let request = PageRequest::new(page, PAGE_SIZE);
        let mut group = None;
        let mut author = None;

        let filter = match scope {
            FeedScope::All => PostQueryFilter::All,
            FeedScope::Group(slug) => {
                let record = self
                    .groups
                    .find_by_slug(slug)
                    .await?
                    .ok_or(FeedError::UnknownGroup)?;
                let filter = PostQueryFilter::Group(record.id);
                group = Some(record);
                filter
            }
            FeedScope::Author(username) => {
                let record = self.find_author(username).await?;
                let filter = PostQueryFilter::Author(record.id);
                author = Some(record);
                filter
            }
            FeedScope::Following(user_id) => PostQueryFilter::FollowedBy(*user_id),
            FeedScope::Search(text) => {
                let needle = text.trim();
                if needle.is_empty() {
                    return Ok(Feed {
                        posts: NumberedPage::new(Vec::new(), request, 0),
                        group,
                        author,
                    });
                }
                PostQueryFilter::TextContains(needle.to_string())
            }
        };

        let posts = self.posts.list_posts(&filter, request).await?;
        debug!(
            scope = ?scope,
            page = posts.number,
            total = posts.total_count,
            "Composed feed page"
        );
        Ok(Feed {
            posts,
            group,
            author,
        })
    }

    /// Groups and users listed beside the feeds.
    pub async fn sidebar(&self) -> Result<Sidebar, FeedError> {
        let groups = self.groups.list_groups().await?;
        let users = self.users.list_users().await?;
        Ok(Sidebar { groups, users })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        page: PageNumber,
    ) -> Result<ProfileContext, FeedError> {
        let author = self.find_author(username).await?;
        let posts = self
            .posts
            .list_posts(
                &PostQueryFilter::Author(author.id),
                PageRequest::new(page, PAGE_SIZE),
            )
            .await?;
        let stats = AuthorStats {
            posts: posts.total_count,
            followers: self.follows.count_followers(author.id).await?,
            following: self.follows.count_following(author.id).await?,
        };
        let is_following = self.viewer_follows(viewer, author.id).await?;
        let is_self = viewer == Some(author.id);

        Ok(ProfileContext {
            author,
            posts,
            stats,
            is_following,
            is_self,
        })
    }

    /// A single post addressed as `/profile/{username}/post/{id}`.
    ///
    /// A post that exists under a different author is reported as unknown.
    pub async fn post_detail(
        &self,
        username: &str,
        post_id: i64,
        viewer: Option<Uuid>,
    ) -> Result<PostDetail, FeedError> {
        let author = self.find_author(username).await?;
        let post = self
            .posts
            .find_summary(post_id)
            .await?
            .filter(|post| post.author_id == author.id)
            .ok_or(FeedError::UnknownPost)?;

        let comments = self.comments.list_for_post(post.id).await?;
        let stats = self.author_stats(author.id).await?;
        let is_following = self.viewer_follows(viewer, author.id).await?;
        let is_author = viewer == Some(author.id);

        Ok(PostDetail {
            post,
            author,
            comments,
            stats,
            is_following,
            is_author,
        })
    }

    pub async fn author_stats(&self, author_id: Uuid) -> Result<AuthorStats, FeedError> {
        Ok(AuthorStats {
            posts: self
                .posts
                .count_posts(&PostQueryFilter::Author(author_id))
                .await?,
            followers: self.follows.count_followers(author_id).await?,
            following: self.follows.count_following(author_id).await?,
        })
    }

    async fn find_author(&self, username: &str) -> Result<UserRecord, FeedError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownAuthor)
    }

    async fn viewer_follows(&self, viewer: Option<Uuid>, author: Uuid) -> Result<bool, FeedError> {
        match viewer {
            Some(viewer) if viewer != author => {
                Ok(self.follows.follow_exists(viewer, author).await?)
            }
            _ => Ok(false),
        }
    }
}
