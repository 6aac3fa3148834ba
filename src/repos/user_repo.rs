/*
 * Responsibility
 * - users / favourites の保存先 (UserStore) の契約
 * - Postgres (SQLx) 実装
 * - DB エラーは RepoError に変換して返す
 */
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub user_name: String,
    pub password_hash: String,
    pub favourites: Vec<String>,
}

/// Result of adding a favourite under a size cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Updated(Vec<String>),
    // The list is at the cap and the item is not already in it.
    Full,
}

/// Data-access collaborator for users and their favourites.
///
/// Favourite operations return `Ok(None)` when the user does not exist.
/// Implementations must be safe to share across requests.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    // Returns the store name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn find_user_by_name(&self, user_name: &str) -> RepoResult<Option<UserRow>>;

    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<UserRow>>;

    // `RepoError::Conflict` when the user name is taken.
    async fn create_user(&self, user_name: &str, password_hash: &str) -> RepoResult<UserRow>;

    async fn get_favourites(&self, id: Uuid) -> RepoResult<Option<Vec<String>>>;

    // Set semantics: adding an existing item leaves the list unchanged.
    // The cap check and the append happen in one atomic step.
    async fn add_favourite(
        &self,
        id: Uuid,
        item: &str,
        max: usize,
    ) -> RepoResult<Option<AddOutcome>>;

    async fn remove_favourite(&self, id: Uuid, item: &str) -> RepoResult<Option<Vec<String>>>;
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply the embedded migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self::new(pool))
    }
}

#[derive(FromRow)]
struct FavouritesRow {
    favourites: Vec<String>,
}

#[async_trait]
impl UserStore for PgUserStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn find_user_by_name(&self, user_name: &str) -> RepoResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, user_name, password_hash, favourites
            FROM users
            WHERE user_name = $1
            "#,
        )
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, user_name, password_hash, favourites
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn create_user(&self, user_name: &str, password_hash: &str) -> RepoResult<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, user_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, user_name, password_hash, favourites
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row)
    }

    async fn get_favourites(&self, id: Uuid) -> RepoResult<Option<Vec<String>>> {
        let row = sqlx::query_as::<_, FavouritesRow>(
            r#"
            SELECT favourites
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.favourites))
    }

    async fn add_favourite(
        &self,
        id: Uuid,
        item: &str,
        max: usize,
    ) -> RepoResult<Option<AddOutcome>> {
        let max = i32::try_from(max).unwrap_or(i32::MAX);

        let row = sqlx::query_as::<_, FavouritesRow>(
            r#"
            UPDATE users
            SET favourites = CASE
                WHEN $2 = ANY(favourites) THEN favourites
                ELSE array_append(favourites, $2)
            END
            WHERE id = $1
              AND ($2 = ANY(favourites) OR cardinality(favourites) < $3)
            RETURNING favourites
            "#,
        )
        .bind(id)
        .bind(item)
        .bind(max)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Some(AddOutcome::Updated(row.favourites)));
        }

        // No row updated: either the user is gone or the list is full.
        let exists = self.get_favourites(id).await?.is_some();
        Ok(exists.then_some(AddOutcome::Full))
    }

    async fn remove_favourite(&self, id: Uuid, item: &str) -> RepoResult<Option<Vec<String>>> {
        let row = sqlx::query_as::<_, FavouritesRow>(
            r#"
            UPDATE users
            SET favourites = array_remove(favourites, $2)
            WHERE id = $1
            RETURNING favourites
            "#,
        )
        .bind(id)
        .bind(item)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.favourites))
    }
}
