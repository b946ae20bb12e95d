use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo_types::{User, UserField, UserFilter};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage for user records keyed by id.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Exact id lookup; a miss is `Ok(None)`.
    async fn get_one(&self, id: Uuid) -> Result<Option<User>, RepoError>;

    /// Every record satisfying `filter`, in insertion order.
    async fn get_all(&self, filter: &UserFilter) -> Result<Vec<User>, RepoError>;

    /// Store `user` as given and hand it back.
    async fn add_one(&self, user: User) -> Result<User, RepoError>;
}

/// Process-local store. Each instance owns its own records.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_one(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_all(&self, filter: &UserFilter) -> Result<Vec<User>, RepoError> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| filter.matches(u)).cloned().collect())
    }

    async fn add_one(&self, user: User) -> Result<User, RepoError> {
        self.users.write().await.push(user.clone());
        debug!(user_id = %user.id, "user stored in memory");
        Ok(user)
    }
}

/// Postgres-backed store over the `users` table.
#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// `SELECT` over `users` with one bound equality per condition, oldest first.
fn select_users(conditions: Vec<(UserField, &str)>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT id, name, username, hashed_password FROM users");
    for (i, (field, value)) in conditions.into_iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        // column names come from the closed UserField set, never from input
        qb.push(field.column()).push("::text = ").push_bind(value.to_string());
    }
    qb.push(" ORDER BY seq ASC");
    qb
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_one(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, username, hashed_password
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn get_all(&self, filter: &UserFilter) -> Result<Vec<User>, RepoError> {
        let Ok(conditions) = filter.resolve() else {
            debug!(?filter, "filter names an unknown field");
            return Ok(Vec::new());
        };

        let mut qb = select_users(conditions);
        let users = qb.build_query_as::<User>().fetch_all(&self.db).await?;
        Ok(users)
    }

    async fn add_one(&self, user: User) -> Result<User, RepoError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, username, hashed_password)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.hashed_password)
        .execute(&self.db)
        .await?;
        Ok(user)
    }
}
