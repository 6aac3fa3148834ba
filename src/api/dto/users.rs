/*
 * Responsibility
 * - register / login / favourites の request/response DTO
 * - フィールド欠落は serde(default) で空文字にし、Service 側の validation で 422 にする
 */
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "userName", alias = "username", default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
    // Confirmation is optional; when present it must match
    #[serde(default)]
    pub password2: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "userName", alias = "username", default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
}
