use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateMessageParams, MessagesRepo, RepoError},
    domain::entities::MessageRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    recipient_id: Uuid,
    text: String,
    created_at: OffsetDateTime,
}

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl MessagesRepo for PostgresRepositories {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<MessageRecord, RepoError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, sender_id, recipient_id, text)
            VALUES ($1, $2, $3, $4)
            RETURNING id, sender_id, recipient_id, text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.sender_id)
        .bind(params.recipient_id)
        .bind(&params.text)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn list_between(&self, a: Uuid, b: Uuid) -> Result<Vec<MessageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, sender_id, recipient_id, text, created_at
            FROM messages
            WHERE (sender_id = $1 AND recipient_id = $2)
               OR (sender_id = $2 AND recipient_id = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(MessageRecord::from).collect())
    }
}
