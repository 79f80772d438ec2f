use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CommentsRepo, CreateCommentParams, RepoError},
    domain::{
        entities::{CommentRecord, CommentView},
        users::display_name,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: Uuid,
    text: String,
    created_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct CommentViewRow {
    id: i64,
    post_id: i64,
    text: String,
    created_at: OffsetDateTime,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (post_id, author_id, text)
            VALUES ($1, $2, $3)
            RETURNING id, post_id, author_id, text, created_at
            "#,
        )
        .bind(params.post_id)
        .bind(params.author_id)
        .bind(&params.text)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CommentRecord {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            text: row.text,
            created_at: row.created_at,
        })
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentView>, RepoError> {
        let rows = sqlx::query_as::<_, CommentViewRow>(
            r#"
            SELECT
                c.id, c.post_id, c.text, c.created_at,
                u.username AS author_username,
                u.first_name AS author_first_name,
                u.last_name AS author_last_name
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| CommentView {
                id: row.id,
                post_id: row.post_id,
                author_name: display_name(
                    &row.author_first_name,
                    &row.author_last_name,
                    &row.author_username,
                ),
                author_username: row.author_username,
                text: row.text,
                created_at: row.created_at,
            })
            .collect())
    }
}
