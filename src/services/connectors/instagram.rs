use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::http::ProviderHttp;
use super::{
    AuthorizationFlow, AuthorizationGrant, AuthorizationRequest, ConnectorConfig,
    ConnectorEndpoints, PlatformConnector, ProviderProfile, ProviderTokens, TokenResponse,
};
use crate::error::AppError;
use crate::models::Platform;

/// Instagram OAuth URLs
const INSTAGRAM_AUTH_URL: &str = "https://api.instagram.com/oauth/authorize";
const INSTAGRAM_TOKEN_URL: &str = "https://api.instagram.com/oauth/access_token";
const INSTAGRAM_PROFILE_URL: &str = "https://graph.instagram.com/me";

const INSTAGRAM_SCOPE: &str = "user_profile,user_media";
const INSTAGRAM_PROFILE_FIELDS: &str = "id,username,account_type,media_count,followers_count";

/// Instagram `/me` レスポンス
#[derive(Debug, Deserialize)]
struct InstagramProfileResponse {
    id: String,
    username: String,
    /// Basic Display API では返らない（ビジネスアカウントのみ）
    #[serde(default)]
    followers_count: Option<i64>,
}

/// Instagram コネクタ
#[derive(Clone)]
pub struct InstagramConnector {
    client_id: String,
    client_secret: Arc<SecretString>,
    redirect_uri: String,
    endpoints: ConnectorEndpoints,
    http: ProviderHttp,
}

impl InstagramConnector {
    pub fn new(config: ConnectorConfig, http_client: reqwest::Client) -> Self {
        Self {
            client_id: config.credentials.client_id,
            client_secret: Arc::new(config.credentials.client_secret),
            redirect_uri: config.redirect_uri,
            endpoints: config.endpoints,
            http: ProviderHttp::new(http_client, Platform::Instagram),
        }
    }

    pub fn default_endpoints() -> ConnectorEndpoints {
        ConnectorEndpoints {
            authorize_url: INSTAGRAM_AUTH_URL.to_string(),
            token_url: INSTAGRAM_TOKEN_URL.to_string(),
            profile_url: INSTAGRAM_PROFILE_URL.to_string(),
        }
    }
}

fn normalize_profile(profile: InstagramProfileResponse) -> ProviderProfile {
    ProviderProfile {
        platform_user_id: profile.id,
        display_name: profile.username.clone(),
        username: profile.username,
        followers_count: profile.followers_count.unwrap_or(0),
    }
}

#[async_trait]
impl PlatformConnector for InstagramConnector {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn authorization_flow(&self) -> AuthorizationFlow {
        AuthorizationFlow::Plain
    }

    fn authorization_url(&self, _request: &AuthorizationRequest<'_>) -> Result<String, AppError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", INSTAGRAM_SCOPE),
            ("response_type", "code"),
        ];

        let url = reqwest::Url::parse_with_params(&self.endpoints.authorize_url, &params)
            .map_err(|e| {
                tracing::error!(error = ?e, "Instagram認可URL生成エラー");
                AppError::Internal(anyhow::anyhow!("failed to generate auth url"))
            })?;

        Ok(url.to_string())
    }

    async fn exchange_code(&self, grant: &AuthorizationGrant) -> Result<ProviderTokens, AppError> {
        let response: TokenResponse = self
            .http
            .post_token_form(
                &self.endpoints.token_url,
                &[
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.expose_secret()),
                    ("grant_type", "authorization_code"),
                    ("redirect_uri", self.redirect_uri.as_str()),
                    ("code", grant.code.as_str()),
                ],
                None,
            )
            .await?;

        response.try_into()
    }

    async fn fetch_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<ProviderProfile, AppError> {
        // Graph API はクエリパラメータでトークンを受け取る
        let url = reqwest::Url::parse_with_params(
            &self.endpoints.profile_url,
            &[
                ("fields", INSTAGRAM_PROFILE_FIELDS),
                ("access_token", access_token.expose_secret()),
            ],
        )
        .map_err(|e| {
            tracing::error!(error = ?e, "Instagram プロフィールURL生成エラー");
            AppError::Internal(anyhow::anyhow!("invalid profile url"))
        })?;

        let profile: InstagramProfileResponse = self.http.get_profile(url, None).await?;
        Ok(normalize_profile(profile))
    }
}
