use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        pagination::{NumberedPage, PageRequest},
        repos::{
            CreatePostParams, PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError,
            UpdatePostParams,
        },
    },
    domain::{entities::{PostRecord, PostSummary}, users::display_name},
};

use super::{PostgresRepositories, map_sqlx_error};

const SUMMARY_SELECT: &str = "SELECT \
    p.id, p.text, p.author_id, p.group_id, p.image_path, p.created_at, p.updated_at, \
    u.username AS author_username, u.first_name AS author_first_name, \
    u.last_name AS author_last_name, \
    g.slug AS group_slug, g.title AS group_title, \
    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count \
    FROM posts p";

const SUMMARY_JOINS: &str = " JOIN users u ON u.id = p.author_id \
    LEFT JOIN post_groups g ON g.id = p.group_id";

const NEWEST_FIRST: &str = " ORDER BY p.created_at DESC, p.id DESC";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    author_id: Uuid,
    group_id: Option<Uuid>,
    image_path: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            author_id: row.author_id,
            group_id: row.group_id,
            image_path: row.image_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostSummaryRow {
    id: i64,
    text: String,
    author_id: Uuid,
    group_id: Option<Uuid>,
    image_path: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    group_slug: Option<String>,
    group_title: Option<String>,
    comment_count: i64,
}

impl TryFrom<PostSummaryRow> for PostSummary {
    type Error = RepoError;

    fn try_from(row: PostSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            text: row.text,
            author_id: row.author_id,
            author_name: display_name(
                &row.author_first_name,
                &row.author_last_name,
                &row.author_username,
            ),
            author_username: row.author_username,
            group_id: row.group_id,
            group_slug: row.group_slug,
            group_title: row.group_title,
            image_path: row.image_path,
            comment_count: PostgresRepositories::convert_count(row.comment_count)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<NumberedPage<PostSummary>, RepoError> {
        let total = self.count_posts(filter).await?;

        let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        Self::apply_feed_joins(&mut qb, filter);
        qb.push(SUMMARY_JOINS);
        Self::apply_feed_conditions(&mut qb, filter);
        qb.push(NEWEST_FIRST);
        qb.push(" LIMIT ");
        qb.push_bind(page.limit());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows = qb
            .build_query_as::<PostSummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let items = rows
            .into_iter()
            .map(PostSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NumberedPage::new(items, page, total))
    }

    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p");
        Self::apply_feed_joins(&mut qb, filter);
        Self::apply_feed_conditions(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, text, author_id, group_id, image_path, created_at, updated_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_summary(&self, id: i64) -> Result<Option<PostSummary>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        qb.push(SUMMARY_JOINS);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostSummaryRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostSummary::try_from).transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (text, author_id, group_id, image_path)
            VALUES ($1, $2, $3, $4)
            RETURNING id, text, author_id, group_id, image_path, created_at, updated_at
            "#,
        )
        .bind(&params.text)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(&params.image_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image_path = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, text, author_id, group_id, image_path, created_at, updated_at
            "#,
        )
        .bind(params.id)
        .bind(&params.text)
        .bind(params.group_id)
        .bind(&params.image_path)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
