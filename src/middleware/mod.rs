/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: favourites 系に掛ける authorization gate
 * - cors / http: Router 全体に掛ける横断的な layer
 */
pub mod auth;
pub mod cors;
pub mod http;
