//! In-process `UserStore` used for local development without Postgres and in tests.
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::user_repo::{AddOutcome, UserRow, UserStore};

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRow>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user. Returns `true` if it existed.
    #[cfg(test)]
    pub async fn delete_user(&self, id: Uuid) -> bool {
        self.users.write().await.remove(&id).is_some()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn find_user_by_name(&self, user_name: &str) -> RepoResult<Option<UserRow>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.user_name == user_name).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<UserRow>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create_user(&self, user_name: &str, password_hash: &str) -> RepoResult<UserRow> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.user_name == user_name) {
            return Err(RepoError::Conflict);
        }

        let row = UserRow {
            id: Uuid::new_v4(),
            user_name: user_name.to_string(),
            password_hash: password_hash.to_string(),
            favourites: Vec::new(),
        };
        users.insert(row.id, row.clone());

        Ok(row)
    }

    async fn get_favourites(&self, id: Uuid) -> RepoResult<Option<Vec<String>>> {
        let users = self.users.read().await;
        Ok(users.get(&id).map(|u| u.favourites.clone()))
    }

    async fn add_favourite(
        &self,
        id: Uuid,
        item: &str,
        max: usize,
    ) -> RepoResult<Option<AddOutcome>> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if !user.favourites.iter().any(|f| f == item) {
            if user.favourites.len() >= max {
                return Ok(Some(AddOutcome::Full));
            }
            user.favourites.push(item.to_string());
        }

        Ok(Some(AddOutcome::Updated(user.favourites.clone())))
    }

    async fn remove_favourite(&self, id: Uuid, item: &str) -> RepoResult<Option<Vec<String>>> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        user.favourites.retain(|f| f != item);

        Ok(Some(user.favourites.clone()))
    }
}
