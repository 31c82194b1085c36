use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::models::Platform;

/// アプリケーションエラー
///
/// `Display` の文言はそのままユーザーに表示される（コールバック画面など）。
/// 内部エラーの詳細はログにのみ出力する。
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// プロバイダー側で認可が拒否された（error パラメータ付きリダイレクト）
    #[error("{0}")]
    ProviderDenied(String),

    #[error("No authorization code received")]
    MissingAuthorizationCode,

    #[error("Code verifier not found")]
    CodeVerifierNotFound,

    #[error("Invalid state parameter")]
    OAuthStateInvalid,

    /// トークン交換失敗（プロバイダーのエラーメッセージ）
    #[error("{0}")]
    TokenExchange(String),

    /// プロフィール取得失敗（プロバイダーのエラーメッセージ）
    #[error("{0}")]
    ProfileFetch(String),

    #[error("Request to {} timed out", .0.display_name())]
    ProviderTimeout(Platform),

    #[error("Failed to reach {}", .0.display_name())]
    ProviderUnavailable(Platform),

    #[error("User not authenticated")]
    Unauthenticated,

    #[error("{} is not configured", .0.display_name())]
    PlatformNotConfigured(Platform),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// エラー種別に対応する HTTP ステータス
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProviderDenied(_)
            | Self::MissingAuthorizationCode
            | Self::CodeVerifierNotFound
            | Self::OAuthStateInvalid
            | Self::UnsupportedPlatform(_)
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::TokenExchange(_) | Self::ProfileFetch(_) | Self::ProviderUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::ProviderTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PlatformNotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::AccountNotFound => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// エラー内容をログに出力する
    ///
    /// 内部エラーは error、利用者起因のものは warn / debug。
    pub fn log(&self) {
        match self {
            Self::Database(e) => tracing::error!(error = ?e, "データベースエラー"),
            Self::Internal(e) => tracing::error!(error = ?e, "内部エラー"),
            Self::TokenExchange(msg) => tracing::warn!(provider_message = %msg, "トークン交換エラー"),
            Self::ProfileFetch(msg) => tracing::warn!(provider_message = %msg, "プロフィール取得エラー"),
            Self::ProviderTimeout(p) => tracing::warn!(platform = %p, "プロバイダー通信タイムアウト"),
            Self::ProviderUnavailable(p) => tracing::warn!(platform = %p, "プロバイダー通信エラー"),
            Self::OAuthStateInvalid => {
                tracing::warn!("無効なOAuth stateパラメータ（CSRF攻撃の可能性）")
            }
            other => tracing::debug!(error = %other, "リクエストエラー"),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            AppError::MissingAuthorizationCode.to_string(),
            "No authorization code received"
        );
        assert_eq!(
            AppError::CodeVerifierNotFound.to_string(),
            "Code verifier not found"
        );
        assert_eq!(AppError::Unauthenticated.to_string(), "User not authenticated");
        assert_eq!(
            AppError::ProviderTimeout(Platform::Linkedin).to_string(),
            "Request to LinkedIn timed out"
        );
    }

    #[test]
    fn test_timeout_is_distinct_from_other_provider_failures() {
        assert_eq!(
            AppError::ProviderTimeout(Platform::Twitter).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::ProviderUnavailable(Platform::Twitter).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_database_error_message_is_generic() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "Database error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
