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

/// Twitter OAuth 2.0 URLs
const TWITTER_AUTH_URL: &str = "https://twitter.com/i/oauth2/authorize";
const TWITTER_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const TWITTER_PROFILE_URL: &str = "https://api.twitter.com/2/users/me";

const TWITTER_SCOPE: &str = "tweet.read tweet.write users.read follows.read";

/// Twitter `/2/users/me` レスポンス
#[derive(Debug, Deserialize)]
struct TwitterUserResponse {
    data: TwitterUser,
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
    id: String,
    username: String,
    name: String,
    #[serde(default)]
    public_metrics: Option<TwitterPublicMetrics>,
}

#[derive(Debug, Deserialize)]
struct TwitterPublicMetrics {
    #[serde(default)]
    followers_count: i64,
}

/// Twitter コネクタ（OAuth 2.0 + PKCE）
///
/// # Security
/// - トークンエンドポイントには Basic 認証ヘッダーでクライアント資格情報を送る
/// - code_verifier はログに出力しない
#[derive(Clone)]
pub struct TwitterConnector {
    client_id: String,
    client_secret: Arc<SecretString>,
    redirect_uri: String,
    endpoints: ConnectorEndpoints,
    http: ProviderHttp,
}

impl TwitterConnector {
    pub fn new(config: ConnectorConfig, http_client: reqwest::Client) -> Self {
        Self {
            client_id: config.credentials.client_id,
            client_secret: Arc::new(config.credentials.client_secret),
            redirect_uri: config.redirect_uri,
            endpoints: config.endpoints,
            http: ProviderHttp::new(http_client, Platform::Twitter),
        }
    }

    pub fn default_endpoints() -> ConnectorEndpoints {
        ConnectorEndpoints {
            authorize_url: TWITTER_AUTH_URL.to_string(),
            token_url: TWITTER_TOKEN_URL.to_string(),
            profile_url: TWITTER_PROFILE_URL.to_string(),
        }
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<ProviderTokens, AppError> {
        let response: TokenResponse = self
            .http
            .post_token_form(
                &self.endpoints.token_url,
                params,
                Some((self.client_id.as_str(), self.client_secret.expose_secret())),
            )
            .await?;

        response.try_into()
    }
}

fn normalize_profile(response: TwitterUserResponse) -> ProviderProfile {
    let user = response.data;
    ProviderProfile {
        platform_user_id: user.id,
        username: user.username,
        display_name: user.name,
        followers_count: user.public_metrics.map(|m| m.followers_count).unwrap_or(0),
    }
}

#[async_trait]
impl PlatformConnector for TwitterConnector {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn authorization_flow(&self) -> AuthorizationFlow {
        AuthorizationFlow::StateWithPkce
    }

    fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Result<String, AppError> {
        let (Some(state), Some(code_challenge)) = (request.state, request.code_challenge) else {
            tracing::error!("Twitter認可URLには state と code_challenge が必要");
            return Err(AppError::Internal(anyhow::anyhow!(
                "state and code_challenge are required"
            )));
        };

        let params = [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", TWITTER_SCOPE),
            ("state", state),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
        ];

        let url = reqwest::Url::parse_with_params(&self.endpoints.authorize_url, &params)
            .map_err(|e| {
                tracing::error!(error = ?e, "Twitter認可URL生成エラー");
                AppError::Internal(anyhow::anyhow!("failed to generate auth url"))
            })?;

        Ok(url.to_string())
    }

    async fn exchange_code(&self, grant: &AuthorizationGrant) -> Result<ProviderTokens, AppError> {
        let code_verifier = grant
            .code_verifier
            .as_ref()
            .ok_or(AppError::CodeVerifierNotFound)?;

        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", grant.code.as_str()),
            ("code_verifier", code_verifier.expose_secret()),
        ])
        .await
    }

    async fn fetch_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<ProviderProfile, AppError> {
        let url = reqwest::Url::parse_with_params(
            &self.endpoints.profile_url,
            &[("user.fields", "public_metrics,profile_image_url")],
        )
        .map_err(|e| {
            tracing::error!(error = ?e, "Twitter プロフィールURL生成エラー");
            AppError::Internal(anyhow::anyhow!("invalid profile url"))
        })?;

        let response: TwitterUserResponse = self
            .http
            .get_profile(url, Some(access_token.expose_secret()))
            .await?;
        Ok(normalize_profile(response))
    }

    /// refresh_token はローテーションされるため、新しい値を保存すること
    async fn refresh_tokens(
        &self,
        refresh_token: &SecretString,
    ) -> Result<Option<ProviderTokens>, AppError> {
        let tokens = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .await?;

        tracing::info!("Twitter アクセストークン更新成功");
        Ok(Some(tokens))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::services::connectors::ClientCredentials;

    fn create_test_connector() -> TwitterConnector {
        TwitterConnector::new(
            ConnectorConfig {
                credentials: ClientCredentials {
                    client_id: "tw-client-id".to_string(),
                    client_secret: SecretString::from("tw-secret".to_string()),
                },
                redirect_uri: "http://localhost:5173/auth/twitter/callback".to_string(),
                endpoints: TwitterConnector::default_endpoints(),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_generate_auth_url() {
        let connector = create_test_connector();
        let url = connector
            .authorization_url(&AuthorizationRequest {
                state: Some("abcdefghijklmnopqrstuvwxyz012345"),
                code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"),
            })
            .unwrap();

        assert!(url.starts_with(TWITTER_AUTH_URL));
        let query: BTreeMap<String, String> = reqwest::Url::parse(&url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect();
        let keys: Vec<&str> = query.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "client_id",
                "code_challenge",
                "code_challenge_method",
                "redirect_uri",
                "response_type",
                "scope",
                "state",
            ]
        );
        assert_eq!(query["scope"], "tweet.read tweet.write users.read follows.read");
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(
            query["code_challenge"],
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
        assert_eq!(query["state"], "abcdefghijklmnopqrstuvwxyz012345");
    }

    #[test]
    fn test_auth_url_requires_pkce_challenge() {
        let connector = create_test_connector();
        let result = connector.authorization_url(&AuthorizationRequest {
            state: Some("state"),
            code_challenge: None,
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_exchange_without_verifier_fails_before_request() {
        let connector = create_test_connector();
        let result = connector
            .exchange_code(&AuthorizationGrant {
                code: "abc".to_string(),
                code_verifier: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::CodeVerifierNotFound)));
    }

    #[test]
    fn test_normalize_profile() {
        let response: TwitterUserResponse = serde_json::from_str(
            r#"{"data":{"id":"2244994945","username":"TwitterDev","name":"Twitter Dev",
                "public_metrics":{"followers_count":513958,"following_count":2039}}}"#,
        )
        .unwrap();
        let profile = normalize_profile(response);

        assert_eq!(profile.platform_user_id, "2244994945");
        assert_eq!(profile.username, "TwitterDev");
        assert_eq!(profile.display_name, "Twitter Dev");
        assert_eq!(profile.followers_count, 513958);
    }

    #[test]
    fn test_normalize_profile_without_metrics() {
        let response: TwitterUserResponse =
            serde_json::from_str(r#"{"data":{"id":"1","username":"u","name":"n"}}"#).unwrap();
        assert_eq!(normalize_profile(response).followers_count, 0);
    }
}
