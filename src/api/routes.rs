/*
 * Responsibility
 * - /api 配下の URL 構造を定義 (全て先頭 "/" 付きで統一)
 * - Bearer が必要な範囲 (favourites) にだけ route_layer で gate を掛ける
 */
use axum::{
    Router,
    routing::{get, post, put},
};

use crate::api::handlers::{
    favourites::{add_favourite, list_favourites, remove_favourite},
    users::{login, register},
};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login));

    let protected = Router::new()
        .route("/user/favourites", get(list_favourites))
        .route(
            "/user/favourites/{id}",
            put(add_favourite).delete(remove_favourite),
        );
    let protected = middleware::auth::access::apply(protected, state);

    public.merge(protected)
}
