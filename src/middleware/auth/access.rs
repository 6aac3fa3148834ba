//! Authorization gate: bearer token 抽出 → 署名/期限検証 → 保存先でユーザー再解決 → AuthCtx を extensions に入れる
//!
//! - token transport は `Authorization: Bearer <jwt>` のみ (scheme は大文字小文字を区別しない)
//! - claim の userName は信用せず、`_id` で毎回ユーザーを引き直す (削除済みユーザーの token は即無効)
//! - どの段階で失敗しても外向きは同一の 401。原因はログにだけ残す

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};
use thiserror::Error;

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::repos::error::RepoError;
use crate::services::auth::VerificationFailure;
use crate::state::AppState;

/// 認証が必要な route 群に gate を適用する。
///
/// `route_layer` なので、マッチしないパスは 401 ではなく 404 のまま。
/// ```ignore
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

#[derive(Debug, Error)]
enum Rejection {
    #[error("missing or unsupported authorization header")]
    MissingToken,
    #[error("token verification failed: {0}")]
    Verification(#[from] VerificationFailure),
    #[error("token subject no longer exists")]
    UnknownSubject,
    #[error("user lookup failed")]
    Upstream(#[source] RepoError),
    #[error("user lookup timed out")]
    Timeout,
}

/// `Authorization: Bearer <token>` から token を取り出す。
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthCtx, Rejection> {
    let token = bearer_token(headers).ok_or(Rejection::MissingToken)?;

    let claim = state.tokens.verify(token)?;

    // fail closed: timeout / backend error are both treated as unauthenticated
    let user = tokio::time::timeout(
        state.auth_resolve_timeout,
        state.users.find_user_by_id(claim.subject_id),
    )
    .await
    .map_err(|_| Rejection::Timeout)?
    .map_err(Rejection::Upstream)?
    .ok_or(Rejection::UnknownSubject)?;

    if user.user_name != claim.user_name {
        tracing::debug!(user_id = %user.id, "user name changed since token was issued");
    }
    tracing::debug!(
        user_id = %user.id,
        token_expires_at = claim.expires_at,
        "access token accepted"
    );

    Ok(AuthCtx::new(user.id, user.user_name))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let result = authenticate(&state, req.headers()).await;

    let auth_ctx = match result {
        Ok(ctx) => ctx,
        Err(rejection) => {
            match &rejection {
                Rejection::MissingToken => {
                    tracing::debug!(reason = %rejection, "request rejected");
                }
                Rejection::Verification(kind) => {
                    tracing::warn!(kind = ?kind, "access token verification failed");
                }
                Rejection::UnknownSubject => {
                    tracing::warn!("access token subject not found");
                }
                Rejection::Upstream(err) => {
                    tracing::error!(error = ?err, "user lookup failed during authorization");
                }
                Rejection::Timeout => {
                    tracing::error!(
                        timeout_ms = state.auth_resolve_timeout.as_millis() as u64,
                        "user lookup timed out during authorization"
                    );
                }
            }
            return Err(AppError::Unauthenticated);
        }
    };

    tracing::debug!(
        user_id = %auth_ctx.user_id,
        user_name = %auth_ctx.user_name,
        "request authenticated"
    );

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(auth_ctx);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::{HeaderValue, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::api::extractors::AuthCtxExtractor;
    use crate::repos::error::RepoResult;
    use crate::repos::{AddOutcome, MemoryUserStore, UserRow, UserStore};
    use crate::services::auth::TokenService;
    use crate::services::users::UserService;

    const SECRET: &str = "gate-test-secret";

    fn state_with(store: Arc<dyn UserStore>, timeout: Duration) -> AppState {
        AppState::new(
            UserService::new(store, 50),
            Arc::new(TokenService::new(SECRET, 3600, 0).unwrap()),
            timeout,
        )
    }

    fn app(state: AppState, reached: Arc<AtomicBool>) -> Router {
        let router = Router::new().route(
            "/whoami",
            get(move |AuthCtxExtractor(ctx): AuthCtxExtractor| {
                let reached = reached.clone();
                async move {
                    reached.store(true, Ordering::SeqCst);
                    ctx.user_name
                }
            }),
        );

        apply(router, state.clone()).with_state(state)
    }

    async fn call(router: Router, auth: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut req = Request::builder().uri("/whoami");
        if let Some(value) = auth {
            req = req.header(header::AUTHORIZATION, value);
        }

        let res = router.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, body)
    }

    async fn seeded() -> (Arc<MemoryUserStore>, UserRow) {
        let store = Arc::new(MemoryUserStore::new());
        let user = store.create_user("alice", "hash").await.unwrap();
        (store, user)
    }

    fn token_for(id: Uuid, name: &str) -> String {
        TokenService::new(SECRET, 3600, 0).unwrap().issue(id, name).unwrap()
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        // the legacy custom scheme is not accepted
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("JWT abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn valid_token_reaches_handler_with_stored_identity() {
        let (store, user) = seeded().await;
        let reached = Arc::new(AtomicBool::new(false));
        let router = app(state_with(store, Duration::from_secs(1)), reached.clone());

        let token = token_for(user.id, "alice");
        let (status, body) = call(router, Some(&format!("Bearer {token}"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"alice");
        assert!(reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn identity_comes_from_storage_not_the_claim() {
        let (store, user) = seeded().await;
        let router = app(
            state_with(store, Duration::from_secs(1)),
            Arc::new(AtomicBool::new(false)),
        );

        let token = token_for(user.id, "someone-else");
        let (status, body) = call(router, Some(&format!("Bearer {token}"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"alice");
    }

    #[tokio::test]
    async fn every_failure_looks_the_same_and_never_reaches_handler() {
        let (store, user) = seeded().await;
        let valid = token_for(user.id, "alice");
        let foreign = TokenService::new("other-secret", 3600, 0)
            .unwrap()
            .issue(user.id, "alice")
            .unwrap();
        let stranger = token_for(Uuid::new_v4(), "ghost");

        let cases = [
            None,
            Some("garbage".to_string()),
            Some(format!("JWT {valid}")),
            Some("Bearer not.a.jwt".to_string()),
            Some(format!("Bearer {foreign}")),
            Some(format!("Bearer {stranger}")),
        ];

        let mut bodies = Vec::new();
        for auth in cases {
            let reached = Arc::new(AtomicBool::new(false));
            let router = app(
                state_with(store.clone(), Duration::from_secs(1)),
                reached.clone(),
            );

            let (status, body) = call(router, auth.as_deref()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "auth: {auth:?}");
            assert!(!reached.load(Ordering::SeqCst), "auth: {auth:?}");
            bodies.push(body);
        }

        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn deleted_user_token_is_rejected_immediately() {
        let (store, user) = seeded().await;
        let token = token_for(user.id, "alice");
        let header_value = format!("Bearer {token}");
        let state = state_with(store.clone(), Duration::from_secs(1));

        let (status, _) = call(
            app(state.clone(), Arc::new(AtomicBool::new(false))),
            Some(&header_value),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert!(store.delete_user(user.id).await);

        let (status, missing_user_body) = call(
            app(state.clone(), Arc::new(AtomicBool::new(false))),
            Some(&header_value),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, no_header_body) = call(app(state, Arc::new(AtomicBool::new(false))), None).await;
        assert_eq!(missing_user_body, no_header_body);
    }

    struct SlowStore;

    struct BrokenStore;

    #[async_trait]
    impl UserStore for SlowStore {
        fn backend_name(&self) -> &'static str {
            "slow"
        }
        async fn find_user_by_name(&self, _: &str) -> RepoResult<Option<UserRow>> {
            Ok(None)
        }
        async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<UserRow>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(UserRow {
                id,
                user_name: "late".into(),
                password_hash: String::new(),
                favourites: Vec::new(),
            }))
        }
        async fn create_user(&self, _: &str, _: &str) -> RepoResult<UserRow> {
            Err(RepoError::Conflict)
        }
        async fn get_favourites(&self, _: Uuid) -> RepoResult<Option<Vec<String>>> {
            Ok(None)
        }
        async fn add_favourite(
            &self,
            _: Uuid,
            _: &str,
            _: usize,
        ) -> RepoResult<Option<AddOutcome>> {
            Ok(None)
        }
        async fn remove_favourite(&self, _: Uuid, _: &str) -> RepoResult<Option<Vec<String>>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl UserStore for BrokenStore {
        fn backend_name(&self) -> &'static str {
            "broken"
        }
        async fn find_user_by_name(&self, _: &str) -> RepoResult<Option<UserRow>> {
            Err(RepoError::Db(sqlx::Error::PoolTimedOut))
        }
        async fn find_user_by_id(&self, _: Uuid) -> RepoResult<Option<UserRow>> {
            Err(RepoError::Db(sqlx::Error::PoolTimedOut))
        }
        async fn create_user(&self, _: &str, _: &str) -> RepoResult<UserRow> {
            Err(RepoError::Db(sqlx::Error::PoolTimedOut))
        }
        async fn get_favourites(&self, _: Uuid) -> RepoResult<Option<Vec<String>>> {
            Err(RepoError::Db(sqlx::Error::PoolTimedOut))
        }
        async fn add_favourite(
            &self,
            _: Uuid,
            _: &str,
            _: usize,
        ) -> RepoResult<Option<AddOutcome>> {
            Err(RepoError::Db(sqlx::Error::PoolTimedOut))
        }
        async fn remove_favourite(&self, _: Uuid, _: &str) -> RepoResult<Option<Vec<String>>> {
            Err(RepoError::Db(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn slow_lookup_times_out_as_unauthenticated() {
        let reached = Arc::new(AtomicBool::new(false));
        let router = app(
            state_with(Arc::new(SlowStore), Duration::from_millis(50)),
            reached.clone(),
        );
        let token = token_for(Uuid::new_v4(), "late");

        let (status, _) = call(router, Some(&format!("Bearer {token}"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn storage_failure_fails_closed() {
        let router = app(
            state_with(Arc::new(BrokenStore), Duration::from_secs(1)),
            Arc::new(AtomicBool::new(false)),
        );
        let token = token_for(Uuid::new_v4(), "alice");

        let (status, _) = call(router, Some(&format!("Bearer {token}"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
