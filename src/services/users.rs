/*
 * Responsibility
 * - 登録 / ログイン (資格情報の照合) / favourites の業務ルール
 * - UserStore (保存先) と PasswordHasher を束ねる
 * - 失敗は AppError (Validation は理由をそのままクライアントへ) に変換
 */
use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppError;
use crate::repos::{AddOutcome, UserRow, UserStore, error::RepoError, error::RepoResult};
use crate::services::password::{PasswordError, PasswordHasher};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    max_favourites: usize,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("store", &self.store.backend_name())
            .field("max_favourites", &self.max_favourites)
            .finish()
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        tracing::error!(error = %e, "password hashing failure");
        AppError::Internal
    }
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, max_favourites: usize) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(),
            max_favourites,
        }
    }

    /// Create an account. Returns the confirmation message shown to the client.
    pub async fn register_user(
        &self,
        user_name: &str,
        password: &str,
        password2: Option<&str>,
    ) -> Result<String, AppError> {
        if user_name.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("User name and password are required"));
        }
        if let Some(confirm) = password2
            && confirm != password
        {
            return Err(AppError::validation("Passwords do not match"));
        }

        let hash = self.hash(password).await?;

        match self.store.create_user(user_name, &hash).await {
            Ok(row) => {
                tracing::info!(user_id = %row.id, "user registered");
                Ok(format!("User {} successfully registered", row.user_name))
            }
            Err(RepoError::Conflict) => Err(AppError::validation("User Name already taken")),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up `user_name` and check `password` against the stored hash.
    pub async fn find_user_by_credentials(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<UserRow, AppError> {
        if user_name.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("User name and password are required"));
        }

        let user = self
            .store
            .find_user_by_name(user_name)
            .await?
            .ok_or_else(|| AppError::validation(format!("Unable to find user {user_name}")))?;

        if !self.verify(password, &user.password_hash).await? {
            return Err(AppError::validation(format!(
                "Incorrect password for user {user_name}"
            )));
        }

        Ok(user)
    }

    /// Raw lookup for the authorization gate, which handles each outcome itself.
    pub async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<UserRow>> {
        self.store.find_user_by_id(id).await
    }

    pub async fn get_favourites(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        self.store
            .get_favourites(user_id)
            .await?
            .ok_or(AppError::Unauthenticated)
    }

    pub async fn add_favourite(&self, user_id: Uuid, item: &str) -> Result<Vec<String>, AppError> {
        let item = normalize_item(item)?;

        match self
            .store
            .add_favourite(user_id, item, self.max_favourites)
            .await?
        {
            Some(AddOutcome::Updated(favourites)) => Ok(favourites),
            Some(AddOutcome::Full) => Err(AppError::validation(format!(
                "Unable to update favourites for user with id: {user_id}"
            ))),
            None => Err(AppError::Unauthenticated),
        }
    }

    pub async fn remove_favourite(
        &self,
        user_id: Uuid,
        item: &str,
    ) -> Result<Vec<String>, AppError> {
        let item = normalize_item(item)?;

        self.store
            .remove_favourite(user_id, item)
            .await?
            .ok_or(AppError::Unauthenticated)
    }

    // argon2 is CPU-bound; keep it off the async workers
    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        let hash = tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "hashing task failed");
                AppError::Internal
            })??;

        Ok(hash)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();

        let ok = tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "verification task failed");
                AppError::Internal
            })??;

        Ok(ok)
    }
}

fn normalize_item(item: &str) -> Result<&str, AppError> {
    let item = item.trim();
    if item.is_empty() {
        return Err(AppError::validation("favourite id is required"));
    }
    Ok(item)
}
