/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証 + 保存先で再解決して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - JWT 検証ロジックは middleware/services 側の責務
 * - user_name は token の claim ではなく保存先のレコードから取る
 */

use uuid::Uuid;

/// 認証済みのリクエストに付与されるコンテキスト (1 リクエスト限り)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCtx {
    pub user_id: Uuid,
    pub user_name: String,
}

impl AuthCtx {
    pub fn new(user_id: Uuid, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
        }
    }
}
