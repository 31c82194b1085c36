use axum::extract::FromRequestParts;
use http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// 上流の認証レイヤーが付与するユーザーIDヘッダー
pub const USER_ID_HEADER: &str = "x-user-id";

/// リクエストのログインユーザー
///
/// ヘッダーがない場合は未ログイン（None）。不正な値はバリデーションエラー。
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Option<Uuid>);

impl CurrentUser {
    /// ログイン必須の操作で使用
    pub fn require(&self) -> Result<Uuid, AppError> {
        self.0.ok_or(AppError::Unauthenticated)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Self(None));
        };

        let user_id = value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| {
                tracing::warn!("不正な x-user-id ヘッダー");
                AppError::Validation("Invalid X-User-Id header".to_string())
            })?;

        Ok(Self(Some(user_id)))
    }
}
