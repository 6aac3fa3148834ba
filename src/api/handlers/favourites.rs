/*
 * Responsibility
 * - /user/favourites 系 handler (認証必須)
 * - 対象ユーザーは常に AuthCtx (gate が解決したユーザー) で、path や body からは取らない
 * - :id は favourite item の id
 */
use axum::{
    Json,
    extract::{Path, State},
};

use crate::{api::extractors::AuthCtxExtractor, error::AppError, state::AppState};

pub async fn list_favourites(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<Vec<String>>, AppError> {
    let favourites = state.users.get_favourites(ctx.user_id).await?;
    Ok(Json(favourites))
}

pub async fn add_favourite(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(item_id): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let favourites = state.users.add_favourite(ctx.user_id, &item_id).await?;
    Ok(Json(favourites))
}

pub async fn remove_favourite(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(item_id): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let favourites = state.users.remove_favourite(ctx.user_id, &item_id).await?;
    Ok(Json(favourites))
}
