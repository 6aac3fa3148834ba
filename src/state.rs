/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - users: UserService, tokens: TokenService, gate の lookup timeout
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::services::{auth::TokenService, users::UserService};

#[derive(Clone, Debug)]
pub struct AppState {
    pub users: UserService,
    pub tokens: Arc<TokenService>,
    pub auth_resolve_timeout: Duration,
}

impl AppState {
    pub fn new(users: UserService, tokens: Arc<TokenService>, auth_resolve_timeout: Duration) -> Self {
        Self {
            users,
            tokens,
            auth_resolve_timeout,
        }
    }
}
