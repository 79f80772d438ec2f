use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{FollowsRepo, RepoError},
    domain::entities::FollowRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct FollowRow {
    id: Uuid,
    follower_id: Uuid,
    followed_id: Uuid,
    created_at: OffsetDateTime,
}

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn insert_follow(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<Option<FollowRecord>, RepoError> {
        // concurrent duplicates collapse into the unique (follower, followed) pair
        let row = sqlx::query_as::<_, FollowRow>(
            r#"
            INSERT INTO follows (id, follower_id, followed_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_id, followed_id) DO NOTHING
            RETURNING id, follower_id, followed_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| FollowRecord {
            id: row.id,
            follower_id: row.follower_id,
            followed_id: row.followed_id,
            created_at: row.created_at,
        }))
    }

    async fn delete_follow(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<bool, RepoError> {
        let result =
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
                .bind(follower_id)
                .bind(followed_id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn follow_exists(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn count_followers(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM follows WHERE followed_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM follows WHERE follower_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}
