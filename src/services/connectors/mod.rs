//! プラットフォーム別コネクタ
//!
//! 各プラットフォームは [`PlatformConnector`] を実装し、
//! 認可 URL 生成・トークン交換・プロフィール取得と正規化を担当する。
//! 永続化までの共通フローは [`connect`]。

pub mod facebook;
pub mod http;
pub mod instagram;
pub mod linkedin;
pub mod registry;
pub mod twitter;

pub use facebook::FacebookConnector;
pub use instagram::InstagramConnector;
pub use linkedin::LinkedInConnector;
pub use registry::ConnectorRegistry;
pub use twitter::TwitterConnector;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewSocialAccount, Platform, SocialAccount};
use crate::repositories::AccountStore;

/// OAuth クライアント資格情報
///
/// # Security
/// client_secret はログに出力しない
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// プロバイダーのエンドポイント（テストではフェイクサーバーに差し替える）
#[derive(Debug, Clone)]
pub struct ConnectorEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
}

/// コネクタ共通の設定
pub struct ConnectorConfig {
    pub credentials: ClientCredentials,
    /// `{app_origin}/auth/<platform>/callback`
    pub redirect_uri: String,
    pub endpoints: ConnectorEndpoints,
}

/// 認可フローの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationFlow {
    /// state なし（Instagram, Facebook）
    Plain,
    /// state あり（LinkedIn）
    State,
    /// state + PKCE（Twitter）
    StateWithPkce,
}

impl AuthorizationFlow {
    pub fn uses_state(&self) -> bool {
        !matches!(self, Self::Plain)
    }

    pub fn uses_pkce(&self) -> bool {
        matches!(self, Self::StateWithPkce)
    }
}

/// 認可 URL に埋め込む試行ごとの値
#[derive(Debug, Default)]
pub struct AuthorizationRequest<'a> {
    pub state: Option<&'a str>,
    pub code_challenge: Option<&'a str>,
}

/// コールバックで受け取った認可コード（と PKCE verifier）
#[derive(Debug)]
pub struct AuthorizationGrant {
    pub code: String,
    pub code_verifier: Option<SecretString>,
}

/// トークンエンドポイントのレスポンス（各プロバイダー共通部分）
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// 取得したトークン
#[derive(Debug)]
pub struct ProviderTokens {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// 有効期間（秒）。レスポンスに含まれない場合は None
    pub expires_in: Option<i64>,
}

impl ProviderTokens {
    /// 有効期限を計算
    ///
    /// 負の値や日時の範囲を超える値はプロバイダーの不正値として扱い、期限なし（None）にする。
    pub fn expires_at(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let secs = self.expires_in?;
        let expires_at = if secs < 0 {
            None
        } else {
            now.checked_add(Duration::seconds(secs))
        };
        if expires_at.is_none() {
            tracing::warn!(expires_in = secs, "expires_in が範囲外のため期限なしとして扱う");
        }
        expires_at
    }
}

impl TryFrom<TokenResponse> for ProviderTokens {
    type Error = AppError;

    fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
        if response.access_token.is_empty() {
            return Err(AppError::TokenExchange(
                "Provider returned an empty access token".to_string(),
            ));
        }
        Ok(Self {
            access_token: SecretString::from(response.access_token),
            refresh_token: response
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            expires_in: response.expires_in,
        })
    }
}

/// 正規化済みのプロフィール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub platform_user_id: String,
    pub username: String,
    pub display_name: String,
    /// 基本スコープで取得できない場合は 0
    pub followers_count: i64,
}

/// プラットフォーム別コネクタ
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    fn platform(&self) -> Platform;

    fn authorization_flow(&self) -> AuthorizationFlow;

    /// 認可 URL を生成
    fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Result<String, AppError>;

    /// 認可コードをアクセストークンに交換
    async fn exchange_code(&self, grant: &AuthorizationGrant) -> Result<ProviderTokens, AppError>;

    /// アクセストークンでプロフィールを取得し正規化
    async fn fetch_profile(&self, access_token: &SecretString)
    -> Result<ProviderProfile, AppError>;

    /// リフレッシュトークンでアクセストークンを更新
    ///
    /// リフレッシュ手段がないプラットフォームは None を返す
    async fn refresh_tokens(
        &self,
        _refresh_token: &SecretString,
    ) -> Result<Option<ProviderTokens>, AppError> {
        Ok(None)
    }
}

/// 連携処理の共通フロー
///
/// # 処理フロー
/// 1. 認可コードをトークンに交換
/// 2. プロフィール取得・正規化
/// 3. ログインユーザーを確認（未ログインなら `Unauthenticated`）
/// 4. アカウントを保存し、保存後の行を返す
///
/// リトライは行わない。失敗した場合は認可フローからやり直す。
pub async fn connect(
    connector: &dyn PlatformConnector,
    store: &dyn AccountStore,
    user_id: Option<Uuid>,
    grant: AuthorizationGrant,
) -> Result<SocialAccount, AppError> {
    let platform = connector.platform();

    let tokens = connector.exchange_code(&grant).await?;
    tracing::debug!(platform = %platform, "トークン交換成功");
    // Note: access_token はログに出力しない

    let profile = connector.fetch_profile(&tokens.access_token).await?;
    tracing::info!(platform = %platform, "プロフィール取得成功");

    let user_id = user_id.ok_or(AppError::Unauthenticated)?;

    let token_expires_at = tokens.expires_at(OffsetDateTime::now_utc());
    let account = store
        .insert(NewSocialAccount {
            user_id,
            platform,
            platform_user_id: profile.platform_user_id,
            username: profile.username,
            display_name: profile.display_name,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_expires_at,
            followers_count: profile.followers_count,
        })
        .await?;

    tracing::info!(
        platform = %platform,
        user_id = %user_id,
        account_id = %account.id,
        "ソーシャルアカウント連携完了"
    );

    Ok(account)
}
