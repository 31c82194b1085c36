//! ソーシャルアカウント連携ハンドラー
//!
//! # Security
//! - access_token / refresh_token はレスポンス・ログに含めない
//! - state は一度きり（コールバックで消費）

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use super::current_user::CurrentUser;
use crate::error::AppError;
use crate::models::{Platform, SocialAccount};
use crate::services::{
    self, CallbackContext, CallbackOutcome, CallbackQuery, CallbackStatus,
    callback::ACCOUNTS_VIEW_PATH,
};
use crate::state::AppState;

/// 認可 URL レスポンス
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    /// プロバイダーの認可 URL（フロントエンドでリダイレクトに使用）
    pub auth_url: String,
}

/// コールバック結果レスポンス
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub status: CallbackStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<SocialAccount>,
    pub redirect_to: &'static str,
    pub redirect_after_ms: Option<u64>,
}

impl From<&CallbackOutcome> for CallbackResponse {
    fn from(outcome: &CallbackOutcome) -> Self {
        Self {
            status: outcome.status,
            message: outcome.message.clone(),
            account: outcome.account.clone(),
            redirect_to: ACCOUNTS_VIEW_PATH,
            redirect_after_ms: outcome
                .redirect_after()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

fn parse_platform(value: &str) -> Result<Platform, AppError> {
    value
        .parse()
        .map_err(|_| AppError::UnsupportedPlatform(value.to_string()))
}

/// 連携済みアカウント一覧
///
/// GET /api/social/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<SocialAccount>>, AppError> {
    let user_id = user.require()?;
    let accounts = state.account_store.list_active(user_id).await?;

    tracing::debug!(user_id = %user_id, count = accounts.len(), "連携済みアカウント取得");
    Ok(Json(accounts))
}

/// 認可 URL を生成
///
/// GET /api/social/platforms/{platform}/authorize
///
/// フロントエンドはこの URL にユーザーをリダイレクトする。
pub async fn authorize(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    user: CurrentUser,
) -> Result<Json<AuthorizeResponse>, AppError> {
    let platform = parse_platform(&platform)?;
    let connector = state.connectors.get(platform)?;

    let start = services::start_authorization(
        connector.as_ref(),
        &state.pending_authorizations,
        user.0,
    )?;

    Ok(Json(AuthorizeResponse {
        auth_url: start.auth_url,
    }))
}

/// OAuth コールバック処理
///
/// GET /api/social/platforms/{platform}/callback
///
/// SPA のコールバック画面がプロバイダーから受け取ったクエリをそのまま転送する。
/// 失敗時もボディは同じ形（status = error）で、HTTP ステータスのみエラー種別に従う。
pub async fn callback(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    user: CurrentUser,
    Query(query): Query<CallbackQuery>,
) -> Result<(StatusCode, Json<CallbackResponse>), AppError> {
    let platform = parse_platform(&platform)?;
    tracing::info!(platform = %platform, "OAuth コールバック受信");

    let ctx = CallbackContext {
        connectors: &state.connectors,
        pending: &state.pending_authorizations,
        store: state.account_store.as_ref(),
    };
    let outcome = services::handle_callback(&ctx, platform, user.0, query).await;

    let status = outcome
        .error
        .as_ref()
        .map_or(StatusCode::OK, AppError::status_code);

    Ok((status, Json(CallbackResponse::from(&outcome))))
}

/// 連携解除
///
/// DELETE /api/social/accounts/{account_id}
///
/// プロバイダー側のトークン失効は行わない。
pub async fn disconnect_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    let user_id = user.require()?;
    state.account_store.disconnect(user_id, account_id).await?;

    tracing::info!(user_id = %user_id, account_id = %account_id, "ソーシャルアカウント連携解除");
    Ok(StatusCode::NO_CONTENT)
}

/// アカウント同期（必要ならトークン更新）
///
/// POST /api/social/accounts/{account_id}/sync
pub async fn sync_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    user: CurrentUser,
) -> Result<Json<SocialAccount>, AppError> {
    let user_id = user.require()?;
    let account = services::sync_account(
        &state.connectors,
        state.account_store.as_ref(),
        user_id,
        account_id,
    )
    .await?;

    Ok(Json(account))
}
