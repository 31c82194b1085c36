//! OAuth コールバック処理
//!
//! プロバイダーからのリダイレクトで受け取ったクエリを検証し、
//! コネクタ経由でアカウントを保存する。結果は SPA が表示する状態
//! （loading → success | error）として返す。

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::connectors::{self, AuthorizationGrant, AuthorizationFlow, ConnectorRegistry};
use super::pending::{PendingAuthorization, PendingAuthorizationStore};
use crate::error::AppError;
use crate::models::{Platform, SocialAccount};
use crate::repositories::AccountStore;

/// 完了後のリダイレクト先
pub const ACCOUNTS_VIEW_PATH: &str = "/dashboard/accounts";

pub const SUCCESS_REDIRECT_DELAY: Duration = Duration::from_millis(2000);
pub const ERROR_REDIRECT_DELAY: Duration = Duration::from_millis(3000);

const DEFAULT_DENIAL_MESSAGE: &str = "Authorization failed";

/// コールバックのクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Loading,
    Success,
    Error,
}

/// コールバック画面の状態
#[derive(Debug)]
pub struct CallbackOutcome {
    pub status: CallbackStatus,
    pub message: String,
    pub account: Option<SocialAccount>,
    /// 失敗時の原因（HTTP ステータスの決定に使用）
    pub error: Option<AppError>,
}

impl CallbackOutcome {
    /// 初期状態
    pub fn loading(platform: Platform) -> Self {
        Self {
            status: CallbackStatus::Loading,
            message: format!("Connecting {}", platform.display_name()),
            account: None,
            error: None,
        }
    }

    /// 連携結果から最終状態へ遷移
    pub fn resolve(platform: Platform, result: Result<SocialAccount, AppError>) -> Self {
        match result {
            Ok(account) => Self {
                status: CallbackStatus::Success,
                message: format!(
                    "{} account connected successfully!",
                    platform.display_name()
                ),
                account: Some(account),
                error: None,
            },
            Err(e) => {
                let message = match e.to_string() {
                    m if m.trim().is_empty() => {
                        format!("Failed to connect {} account", platform.display_name())
                    }
                    m => m,
                };
                Self {
                    status: CallbackStatus::Error,
                    message,
                    account: None,
                    error: Some(e),
                }
            }
        }
    }

    /// 最終状態では ACCOUNTS_VIEW_PATH へ遷移するまでの待ち時間
    pub fn redirect_after(&self) -> Option<Duration> {
        match self.status {
            CallbackStatus::Loading => None,
            CallbackStatus::Success => Some(SUCCESS_REDIRECT_DELAY),
            CallbackStatus::Error => Some(ERROR_REDIRECT_DELAY),
        }
    }
}

/// コールバック処理に必要な依存
pub struct CallbackContext<'a> {
    pub connectors: &'a ConnectorRegistry,
    pub pending: &'a PendingAuthorizationStore,
    pub store: &'a dyn AccountStore,
}

/// コールバックを処理し、最終状態を返す
///
/// # 処理フロー
/// 1. error パラメータがあれば拒否として終了
/// 2. code がなければ終了
/// 3. state を使うプラットフォームは保留中の認可を照合（一度きり）
/// 4. コネクタで連携
pub async fn handle_callback(
    ctx: &CallbackContext<'_>,
    platform: Platform,
    user_id: Option<Uuid>,
    query: CallbackQuery,
) -> CallbackOutcome {
    let result = run(ctx, platform, user_id, query).await;

    match &result {
        Ok(account) => {
            tracing::info!(platform = %platform, account_id = %account.id, "コールバック処理成功")
        }
        Err(e) => {
            tracing::warn!(platform = %platform, error = %e, "コールバック処理失敗");
            e.log();
        }
    }

    CallbackOutcome::resolve(platform, result)
}

async fn run(
    ctx: &CallbackContext<'_>,
    platform: Platform,
    user_id: Option<Uuid>,
    query: CallbackQuery,
) -> Result<SocialAccount, AppError> {
    // state は提示された時点で消費する（成功・失敗にかかわらず再利用不可）
    let pending = query
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| ctx.pending.take(s));

    if query.error.is_some() {
        let description = query
            .error_description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DENIAL_MESSAGE.to_string());
        return Err(AppError::ProviderDenied(description));
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AppError::MissingAuthorizationCode)?;

    let connector = ctx.connectors.get(platform)?;
    let flow = connector.authorization_flow();

    let code_verifier = if flow.uses_state() {
        verify_pending(platform, flow, user_id, pending)?
    } else {
        None
    };

    connectors::connect(
        connector.as_ref(),
        ctx.store,
        user_id,
        AuthorizationGrant {
            code,
            code_verifier,
        },
    )
    .await
}

/// 保留中の認可を照合し、PKCE の code_verifier を返す
fn verify_pending(
    platform: Platform,
    flow: AuthorizationFlow,
    user_id: Option<Uuid>,
    pending: Option<PendingAuthorization>,
) -> Result<Option<SecretString>, AppError> {
    let Some(pending) = pending else {
        return Err(if flow.uses_pkce() {
            AppError::CodeVerifierNotFound
        } else {
            AppError::OAuthStateInvalid
        });
    };

    if pending.platform != platform {
        return Err(AppError::OAuthStateInvalid);
    }
    if let (Some(started_by), Some(current)) = (pending.user_id, user_id) {
        if started_by != current {
            return Err(AppError::OAuthStateInvalid);
        }
    }

    if flow.uses_pkce() {
        pending
            .code_verifier
            .map(Some)
            .ok_or(AppError::CodeVerifierNotFound)
    } else {
        Ok(None)
    }
}
