/*
 * Responsibility
 * - POST /user/register, POST /user/login (認証なし)
 * - Json を extractor で受け、UserService / TokenService を呼ぶ
 * - body の JSON 不正も 422 { message } に揃える
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::{
    api::dto::users::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest},
    error::AppError,
    state::AppState,
};

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = json_body(payload)?;

    let message = state
        .users
        .register_user(&req.user_name, &req.password, req.password2.as_deref())
        .await?;

    Ok(Json(MessageResponse { message }))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let req = json_body(payload)?;

    let user = state
        .users
        .find_user_by_credentials(&req.user_name, &req.password)
        .await?;

    let token = state.tokens.issue(user.id, &user.user_name).map_err(|e| {
        tracing::error!(error = %e, user_id = %user.id, "failed to issue token");
        AppError::Internal
    })?;

    tracing::info!(user_id = %user.id, "login successful");

    Ok(Json(LoginResponse {
        message: "login successful",
        token,
    }))
}
