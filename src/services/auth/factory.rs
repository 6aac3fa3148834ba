/// Factory: build `TokenService` from application `Config`.
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::services::auth::TokenService;

pub fn build_token_service(config: &Config) -> Result<Arc<TokenService>, ConfigError> {
    let tokens = TokenService::new(
        &config.jwt_secret,
        config.token_ttl_seconds,
        config.token_leeway_seconds,
    )?;

    Ok(Arc::new(tokens))
}
