//! Post, comment and image write paths.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams, UsersRepo,
};
use crate::cache::PageCache;
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::error::FieldErrors;
use crate::domain::posts::{UNKNOWN_GROUP_MESSAGE, validate_comment_text, validate_post_text};
use crate::domain::uploads::{ImageProbe, probe_image};
use crate::infra::uploads::{UploadStorage, UploadStorageError};

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<ImageUpload>,
    /// Edit only: drop the current image when no new one is uploaded.
    pub clear_image: bool,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post form rejected: {0}")]
    Invalid(FieldErrors),
    #[error("only the author may change this post")]
    Forbidden,
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
}

struct ValidatedPost {
    text: String,
    group_id: Option<Uuid>,
    image: Option<(ImageUpload, ImageProbe)>,
}

#[derive(Clone)]
pub struct PostService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    storage: Arc<UploadStorage>,
    cache: Arc<PageCache>,
}

impl PostService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        storage: Arc<UploadStorage>,
        cache: Arc<PageCache>,
    ) -> Self {
        Self {
            users,
            groups,
            posts,
            writer,
            comments,
            storage,
            cache,
        }
    }

    pub async fn create_post(
        &self,
        actor: Uuid,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let validated = self.validate(submission).await?;
        let image_path = self.store_image(validated.image.as_ref()).await?;

        let params = CreatePostParams {
            text: validated.text,
            author_id: actor,
            group_id: validated.group_id,
            image_path: image_path.clone(),
        };
        let post = match self.writer.create_post(params).await {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(image_path.as_deref()).await;
                return Err(err.into());
            }
        };

        self.cache.invalidate_all();
        info!(post_id = post.id, author = %actor, "Post created");
        Ok(post)
    }

    /// Loads a post for editing, enforcing that it belongs to `username` and
    /// that `actor` wrote it.
    pub async fn load_for_edit(
        &self,
        actor: Uuid,
        username: &str,
        post_id: i64,
    ) -> Result<PostRecord, PostError> {
        let post = self.find_owned(username, post_id).await?;
        if post.author_id != actor {
            return Err(PostError::Forbidden);
        }
        Ok(post)
    }

    pub async fn edit_post(
        &self,
        actor: Uuid,
        username: &str,
        post_id: i64,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let current = self.load_for_edit(actor, username, post_id).await?;
        let clear_image = submission.clear_image;
        let validated = self.validate(submission).await?;

        let new_image = self.store_image(validated.image.as_ref()).await?;
        let image_path = match (&new_image, clear_image) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => None,
            (None, false) => current.image_path.clone(),
        };

        let params = UpdatePostParams {
            id: current.id,
            text: validated.text,
            group_id: validated.group_id,
            image_path: image_path.clone(),
        };
        let post = match self.writer.update_post(params).await {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(new_image.as_deref()).await;
                return Err(err.into());
            }
        };

        if current.image_path != image_path {
            self.discard_image(current.image_path.as_deref()).await;
        }

        self.cache.invalidate_all();
        info!(post_id = post.id, author = %actor, "Post updated");
        Ok(post)
    }

    pub async fn delete_post(
        &self,
        actor: Uuid,
        username: &str,
        post_id: i64,
    ) -> Result<(), PostError> {
        let post = self.load_for_edit(actor, username, post_id).await?;
        self.writer.delete_post(post.id).await?;
        self.discard_image(post.image_path.as_deref()).await;

        self.cache.invalidate_all();
        info!(post_id = post.id, author = %actor, "Post deleted");
        Ok(())
    }

    pub async fn add_comment(
        &self,
        actor: Uuid,
        username: &str,
        post_id: i64,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let post = self.find_owned(username, post_id).await?;
        let mut errors = FieldErrors::new();
        let text = errors.collect(validate_comment_text(text));
        let Some(text) = text else {
            return Err(PostError::Invalid(errors));
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: actor,
                text,
            })
            .await?;
        info!(post_id = post.id, comment_id = comment.id, "Comment added");
        Ok(comment)
    }

    async fn find_owned(&self, username: &str, post_id: i64) -> Result<PostRecord, PostError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(PostError::NotFound)?;
        self.posts
            .find_by_id(post_id)
            .await?
            .filter(|post| post.author_id == author.id)
            .ok_or(PostError::NotFound)
    }

    /// Checks every field and reports all failures together.
    async fn validate(&self, submission: PostSubmission) -> Result<ValidatedPost, PostError> {
        let mut errors = FieldErrors::new();
        let text = errors.collect(validate_post_text(&submission.text));

        if let Some(group_id) = submission.group_id
            && self.groups.find_by_id(group_id).await?.is_none()
        {
            errors.push("group", UNKNOWN_GROUP_MESSAGE);
        }

        let image = match submission.image {
            Some(upload) => match probe_image(&upload.bytes) {
                Ok(probe) => Some((upload, probe)),
                Err(rejection) => {
                    errors.push("image", rejection.form_message());
                    None
                }
            },
            None => None,
        };

        match (text, errors.is_empty()) {
            (Some(text), true) => Ok(ValidatedPost {
                text,
                group_id: submission.group_id,
                image,
            }),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn store_image(
        &self,
        image: Option<&(ImageUpload, ImageProbe)>,
    ) -> Result<Option<String>, PostError> {
        let Some((upload, probe)) = image else {
            return Ok(None);
        };
        let stored = self
            .storage
            .store_image(&upload.file_name, &upload.bytes, probe)
            .await?;
        info!(
            path = %stored.stored_path,
            checksum = %stored.checksum,
            size = stored.size_bytes,
            "Stored post image"
        );
        Ok(Some(stored.stored_path))
    }

    async fn discard_image(&self, stored_path: Option<&str>) {
        let Some(path) = stored_path else {
            return;
        };
        if let Err(err) = self.storage.delete(path).await {
            warn!(path, error = %err, "Failed to remove stored post image");
        }
    }
}
