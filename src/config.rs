/*
 * Responsibility
 * - 環境変数の読み込み (JWT_SECRET, DATABASE_URL, CORS 許可, timeout など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    // None is only allowed outside production (in-memory store)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    pub jwt_secret: String,
    pub token_ttl_seconds: u64,
    pub token_leeway_seconds: u64,
    pub auth_resolve_timeout: Duration,

    pub max_favourites: usize,

    pub request_timeout: Duration,
    pub request_body_limit_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the signing secret or credentials embedded in DATABASE_URL
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("token_leeway_seconds", &self.token_leeway_seconds)
            .field("auth_resolve_timeout", &self.auth_resolve_timeout)
            .field("max_favourites", &self.max_favourites)
            .field("request_timeout", &self.request_timeout)
            .field("request_body_limit_bytes", &self.request_body_limit_bytes)
            .finish()
    }
}

/// 3 days
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3 * 24 * 60 * 60;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (env, map in tests, ...).
    pub fn from_source<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&get, "PORT", 8080)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV"));

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let database_url = get("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if database_url.is_none() && app_env.is_production() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        let database_max_connections = parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?;

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET"));
        }

        let token_ttl_seconds = parse_or(&get, "TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS)?;
        if token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("TOKEN_TTL_SECONDS"));
        }
        let token_leeway_seconds = parse_or(&get, "TOKEN_LEEWAY_SECONDS", 0)?;

        let auth_resolve_timeout =
            Duration::from_millis(parse_or(&get, "AUTH_RESOLVE_TIMEOUT_MS", 3000)?);

        let max_favourites = parse_or(&get, "MAX_FAVOURITES", 50)?;

        let request_timeout = Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECONDS", 30)?);
        let request_body_limit_bytes = parse_or(&get, "REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)?;

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            database_url,
            database_max_connections,
            jwt_secret,
            token_ttl_seconds,
            token_leeway_seconds,
            auth_resolve_timeout,
            max_favourites,
            request_timeout,
            request_body_limit_bytes,
        })
    }
}

// Unset -> default, set but unparsable -> Invalid
fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_source(source(&[("JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.app_env, AppEnv::Development);
        assert!(config.database_url.is_none());
        assert_eq!(config.token_ttl_seconds, 259_200);
        assert_eq!(config.token_leeway_seconds, 0);
        assert_eq!(config.auth_resolve_timeout, Duration::from_millis(3000));
        assert_eq!(config.max_favourites, 50);
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = Config::from_source(source(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));

        let err = Config::from_source(source(&[("JWT_SECRET", "   ")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid("JWT_SECRET"));
    }

    #[test]
    fn production_requires_database_url() {
        let err = Config::from_source(source(&[("JWT_SECRET", "x"), ("APP_ENV", "prod")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn unparsable_numbers_are_invalid() {
        let err = Config::from_source(source(&[("JWT_SECRET", "x"), ("PORT", "eighty")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Invalid("PORT"));

        let err = Config::from_source(source(&[("JWT_SECRET", "x"), ("TOKEN_TTL_SECONDS", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Invalid("TOKEN_TTL_SECONDS"));
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = Config::from_source(source(&[
            ("JWT_SECRET", "x"),
            ("CORS_ALLOWED_ORIGINS", " https://a.example , ,https://b.example"),
        ]))
        .unwrap();

        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = Config::from_source(source(&[
            ("JWT_SECRET", "very-secret-value"),
            ("DATABASE_URL", "postgres://user:pw@localhost/db"),
        ]))
        .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret-value"));
        assert!(!rendered.contains("pw@localhost"));
    }
}
