//! プロバイダー API 呼び出しの共通処理
//!
//! タイムアウト・通信エラー・非 2xx レスポンスを AppError に変換する。

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;
use crate::models::Platform;

/// 失敗時のエラー種別
#[derive(Debug, Clone, Copy)]
enum Stage {
    Token,
    Profile,
}

/// プラットフォームに紐付いた HTTP クライアント
#[derive(Clone)]
pub struct ProviderHttp {
    client: reqwest::Client,
    platform: Platform,
}

impl ProviderHttp {
    pub fn new(client: reqwest::Client, platform: Platform) -> Self {
        Self { client, platform }
    }

    /// トークンエンドポイントへ application/x-www-form-urlencoded で POST
    ///
    /// `basic_auth` を指定した場合は `Authorization: Basic base64(id:secret)` を付与する
    pub async fn post_token_form<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
    ) -> Result<T, AppError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(form_body(params));

        if let Some((client_id, client_secret)) = basic_auth {
            request = request.header(
                "Authorization",
                basic_authorization(client_id, client_secret),
            );
        }

        self.send(request, Stage::Token).await
    }

    /// プロフィールエンドポイントへ GET
    pub async fn get_profile<T: DeserializeOwned>(
        &self,
        url: reqwest::Url,
        bearer_token: Option<&str>,
    ) -> Result<T, AppError> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        self.send(request, Stage::Profile).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        stage: Stage,
    ) -> Result<T, AppError> {
        let platform = self.platform;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::warn!(platform = %platform, ?stage, "プロバイダー通信タイムアウト");
                AppError::ProviderTimeout(platform)
            } else {
                // URL にはクエリのアクセストークンが含まれうるため除去してから出力
                let e = e.without_url();
                tracing::error!(platform = %platform, ?stage, error = ?e, "プロバイダー通信エラー");
                AppError::ProviderUnavailable(platform)
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                AppError::ProviderTimeout(platform)
            } else {
                let e = e.without_url();
                tracing::error!(platform = %platform, error = ?e, "レスポンス読み込みエラー");
                AppError::ProviderUnavailable(platform)
            }
        })?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&body)
                .ok()
                .as_ref()
                .and_then(provider_error_message)
                .unwrap_or_else(|| fallback_message(platform, stage));
            // Note: レスポンスボディにはトークンが含まれ得るためログに出力しない
            tracing::error!(
                platform = %platform,
                status = %status,
                ?stage,
                provider_message = %message,
                "プロバイダーAPIエラー"
            );
            return Err(stage_error(stage, message));
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(platform = %platform, ?stage, error = ?e, "プロバイダーレスポンスのパースエラー");
            stage_error(stage, fallback_message(platform, stage))
        })
    }
}

fn stage_error(stage: Stage, message: String) -> AppError {
    match stage {
        Stage::Token => AppError::TokenExchange(message),
        Stage::Profile => AppError::ProfileFetch(message),
    }
}

fn fallback_message(platform: Platform, stage: Stage) -> String {
    match stage {
        Stage::Token => format!("Failed to connect {}", platform.display_name()),
        Stage::Profile => format!("Failed to get {} user data", platform.display_name()),
    }
}

/// エラーボディからユーザー向けメッセージを抽出
///
/// プロバイダーごとに形式が異なるため、既知のフィールドを順に探す
pub fn provider_error_message(body: &Value) -> Option<String> {
    let candidates = [
        body.get("error_description"),
        body.get("error_message"),
        body.get("error").and_then(|e| e.get("message")),
        body.get("message"),
        body.get("detail"),
        body.get("title"),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// application/x-www-form-urlencoded 形式の body を構築
pub fn form_body(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// HTTP Basic 認証ヘッダー値
pub fn basic_authorization(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", client_id, client_secret))
    )
}
