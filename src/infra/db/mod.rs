//! Postgres-backed repository implementations.

mod comments;
mod follows;
mod groups;
mod messages;
mod posts;
mod sessions;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{HealthRepo, PostQueryFilter, RepoError};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Joins needed by a filter; pushed right after `FROM posts p`.
    ///
    /// The following feed joins the follow edges of the viewer. Edges are
    /// unique per (follower, followed) so the join never duplicates a post.
    fn apply_feed_joins(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostQueryFilter) {
        if let PostQueryFilter::FollowedBy(user_id) = filter {
            qb.push(" JOIN follows f ON f.followed_id = p.author_id AND f.follower_id = ");
            qb.push_bind(*user_id);
        }
    }

    fn apply_feed_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostQueryFilter) {
        qb.push(" WHERE TRUE");
        match filter {
            PostQueryFilter::All | PostQueryFilter::FollowedBy(_) => {}
            PostQueryFilter::Group(group_id) => {
                qb.push(" AND p.group_id = ");
                qb.push_bind(*group_id);
            }
            PostQueryFilter::Author(author_id) => {
                qb.push(" AND p.author_id = ");
                qb.push_bind(*author_id);
            }
            PostQueryFilter::TextContains(needle) => {
                qb.push(" AND p.text ILIKE ");
                qb.push_bind(format!("%{}%", escape_like(needle)));
                qb.push(" ESCAPE '\\'");
            }
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}

/// Escapes `%`, `_` and `\` so user text matches literally inside `LIKE`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
