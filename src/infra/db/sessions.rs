use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateSessionParams, RepoError, SessionsRepo},
    domain::entities::SessionRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    prefix: String,
    hashed_secret: Vec<u8>,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (id, user_id, prefix, hashed_secret, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, prefix, hashed_secret, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(&params.prefix)
        .bind(&params.hashed_secret)
        .bind(params.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, prefix, hashed_secret, created_at, expires_at
            FROM sessions
            WHERE prefix = $1
            "#,
        )
        .bind(prefix)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SessionRecord::from))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM sessions WHERE prefix = $1")
            .bind(prefix)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
