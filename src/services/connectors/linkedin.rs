use std::collections::HashMap;
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

/// LinkedIn OAuth URLs
const LINKEDIN_AUTH_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
const LINKEDIN_TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const LINKEDIN_PROFILE_URL: &str = "https://api.linkedin.com/v2/people/~:(id,firstName,lastName)";

const LINKEDIN_SCOPE: &str = "r_liteprofile r_emailaddress w_member_social";
const LINKEDIN_LOCALE: &str = "en_US";

/// LinkedIn プロフィールレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkedInProfileResponse {
    id: String,
    #[serde(default)]
    first_name: Option<LocalizedName>,
    #[serde(default)]
    last_name: Option<LocalizedName>,
}

#[derive(Debug, Deserialize)]
struct LocalizedName {
    #[serde(default)]
    localized: HashMap<String, String>,
}

impl LocalizedName {
    fn en_us(name: Option<&Self>) -> &str {
        name.and_then(|n| n.localized.get(LINKEDIN_LOCALE))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// LinkedIn コネクタ
#[derive(Clone)]
pub struct LinkedInConnector {
    client_id: String,
    client_secret: Arc<SecretString>,
    redirect_uri: String,
    endpoints: ConnectorEndpoints,
    http: ProviderHttp,
}

impl LinkedInConnector {
    pub fn new(config: ConnectorConfig, http_client: reqwest::Client) -> Self {
        Self {
            client_id: config.credentials.client_id,
            client_secret: Arc::new(config.credentials.client_secret),
            redirect_uri: config.redirect_uri,
            endpoints: config.endpoints,
            http: ProviderHttp::new(http_client, Platform::Linkedin),
        }
    }

    pub fn default_endpoints() -> ConnectorEndpoints {
        ConnectorEndpoints {
            authorize_url: LINKEDIN_AUTH_URL.to_string(),
            token_url: LINKEDIN_TOKEN_URL.to_string(),
            profile_url: LINKEDIN_PROFILE_URL.to_string(),
        }
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<ProviderTokens, AppError> {
        let response: TokenResponse = self
            .http
            .post_token_form(&self.endpoints.token_url, params, None)
            .await?;

        response.try_into()
    }
}

/// 姓名を連結（欠けている部分は空文字）。フォロワー数は基本スコープでは取得できない
fn normalize_profile(profile: LinkedInProfileResponse) -> ProviderProfile {
    let first_name = LocalizedName::en_us(profile.first_name.as_ref());
    let last_name = LocalizedName::en_us(profile.last_name.as_ref());
    let full_name = format!("{} {}", first_name, last_name).trim().to_string();

    ProviderProfile {
        platform_user_id: profile.id,
        username: full_name.clone(),
        display_name: full_name,
        followers_count: 0,
    }
}

#[async_trait]
impl PlatformConnector for LinkedInConnector {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    fn authorization_flow(&self) -> AuthorizationFlow {
        AuthorizationFlow::State
    }

    fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Result<String, AppError> {
        let state = request.state.ok_or_else(|| {
            tracing::error!("LinkedIn認可URLには state が必要");
            AppError::Internal(anyhow::anyhow!("state is required"))
        })?;

        let params = [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", LINKEDIN_SCOPE),
            ("state", state),
        ];

        let url = reqwest::Url::parse_with_params(&self.endpoints.authorize_url, &params)
            .map_err(|e| {
                tracing::error!(error = ?e, "LinkedIn認可URL生成エラー");
                AppError::Internal(anyhow::anyhow!("failed to generate auth url"))
            })?;

        Ok(url.to_string())
    }

    async fn exchange_code(&self, grant: &AuthorizationGrant) -> Result<ProviderTokens, AppError> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", grant.code.as_str()),
        ])
        .await
    }

    async fn fetch_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<ProviderProfile, AppError> {
        let url = reqwest::Url::parse(&self.endpoints.profile_url).map_err(|e| {
            tracing::error!(error = ?e, "LinkedIn プロフィールURL生成エラー");
            AppError::Internal(anyhow::anyhow!("invalid profile url"))
        })?;

        let profile: LinkedInProfileResponse = self
            .http
            .get_profile(url, Some(access_token.expose_secret()))
            .await?;
        Ok(normalize_profile(profile))
    }

    async fn refresh_tokens(
        &self,
        refresh_token: &SecretString,
    ) -> Result<Option<ProviderTokens>, AppError> {
        let tokens = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
            ])
            .await?;

        tracing::info!("LinkedIn アクセストークン更新成功");
        Ok(Some(tokens))
    }
}
