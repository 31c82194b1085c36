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

/// Facebook OAuth URLs
const FACEBOOK_AUTH_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v18.0/oauth/access_token";
const FACEBOOK_PROFILE_URL: &str = "https://graph.facebook.com/me";

const FACEBOOK_SCOPE: &str = "pages_manage_posts,pages_read_engagement,pages_show_list";

/// Facebook `/me` レスポンス
#[derive(Debug, Deserialize)]
struct FacebookProfileResponse {
    id: String,
    name: String,
}

/// Facebook コネクタ
///
/// トークン交換もコネクタ内で行う（他プラットフォームと同じ形）。
#[derive(Clone)]
pub struct FacebookConnector {
    app_id: String,
    app_secret: Arc<SecretString>,
    redirect_uri: String,
    endpoints: ConnectorEndpoints,
    http: ProviderHttp,
}

impl FacebookConnector {
    pub fn new(config: ConnectorConfig, http_client: reqwest::Client) -> Self {
        Self {
            app_id: config.credentials.client_id,
            app_secret: Arc::new(config.credentials.client_secret),
            redirect_uri: config.redirect_uri,
            endpoints: config.endpoints,
            http: ProviderHttp::new(http_client, Platform::Facebook),
        }
    }

    pub fn default_endpoints() -> ConnectorEndpoints {
        ConnectorEndpoints {
            authorize_url: FACEBOOK_AUTH_URL.to_string(),
            token_url: FACEBOOK_TOKEN_URL.to_string(),
            profile_url: FACEBOOK_PROFILE_URL.to_string(),
        }
    }
}

/// フォロワー数は基本スコープでは取得できないため 0
fn normalize_profile(profile: FacebookProfileResponse) -> ProviderProfile {
    ProviderProfile {
        platform_user_id: profile.id,
        display_name: profile.name.clone(),
        username: profile.name,
        followers_count: 0,
    }
}

#[async_trait]
impl PlatformConnector for FacebookConnector {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn authorization_flow(&self) -> AuthorizationFlow {
        AuthorizationFlow::Plain
    }

    fn authorization_url(&self, _request: &AuthorizationRequest<'_>) -> Result<String, AppError> {
        let params = [
            ("client_id", self.app_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", FACEBOOK_SCOPE),
            ("response_type", "code"),
        ];

        let url = reqwest::Url::parse_with_params(&self.endpoints.authorize_url, &params)
            .map_err(|e| {
                tracing::error!(error = ?e, "Facebook認可URL生成エラー");
                AppError::Internal(anyhow::anyhow!("failed to generate auth url"))
            })?;

        Ok(url.to_string())
    }

    async fn exchange_code(&self, grant: &AuthorizationGrant) -> Result<ProviderTokens, AppError> {
        // Graph API のトークン交換は grant_type を取らない
        let response: TokenResponse = self
            .http
            .post_token_form(
                &self.endpoints.token_url,
                &[
                    ("client_id", self.app_id.as_str()),
                    ("client_secret", self.app_secret.expose_secret()),
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
        let url = reqwest::Url::parse_with_params(
            &self.endpoints.profile_url,
            &[
                ("fields", "id,name,email"),
                ("access_token", access_token.expose_secret()),
            ],
        )
        .map_err(|e| {
            tracing::error!(error = ?e, "Facebook プロフィールURL生成エラー");
            AppError::Internal(anyhow::anyhow!("invalid profile url"))
        })?;

        let profile: FacebookProfileResponse = self.http.get_profile(url, None).await?;
        Ok(normalize_profile(profile))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::services::connectors::ClientCredentials;

    #[test]
    fn test_generate_auth_url() {
        let connector = FacebookConnector::new(
            ConnectorConfig {
                credentials: ClientCredentials {
                    client_id: "fb-app-id".to_string(),
                    client_secret: SecretString::from("fb-secret".to_string()),
                },
                redirect_uri: "https://app.example.com/auth/facebook/callback".to_string(),
                endpoints: FacebookConnector::default_endpoints(),
            },
            reqwest::Client::new(),
        );

        let url = connector
            .authorization_url(&AuthorizationRequest::default())
            .unwrap();

        assert!(url.starts_with(FACEBOOK_AUTH_URL));
        let query: BTreeMap<String, String> = reqwest::Url::parse(&url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect();
        assert_eq!(query.len(), 4);
        assert_eq!(query["client_id"], "fb-app-id");
        assert_eq!(
            query["redirect_uri"],
            "https://app.example.com/auth/facebook/callback"
        );
        assert_eq!(
            query["scope"],
            "pages_manage_posts,pages_read_engagement,pages_show_list"
        );
        assert_eq!(query["response_type"], "code");
    }

    #[test]
    fn test_normalize_profile() {
        let response: FacebookProfileResponse = serde_json::from_str(
            r#"{"id":"10158","name":"Ada Lovelace","email":"ada@example.com"}"#,
        )
        .unwrap();
        let profile = normalize_profile(response);

        assert_eq!(profile.username, "Ada Lovelace");
        assert_eq!(profile.display_name, "Ada Lovelace");
        assert_eq!(profile.followers_count, 0);
    }

    /// tracing 出力を溜めるバッファ
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_unreachable_profile_endpoint_does_not_log_token() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        // 127.0.0.1:1 は待ち受けがないため接続拒否になる
        let connector = FacebookConnector::new(
            ConnectorConfig {
                credentials: ClientCredentials {
                    client_id: "fb-app-id".to_string(),
                    client_secret: SecretString::from("fb-secret".to_string()),
                },
                redirect_uri: "https://app.example.com/auth/facebook/callback".to_string(),
                endpoints: ConnectorEndpoints {
                    authorize_url: FACEBOOK_AUTH_URL.to_string(),
                    token_url: FACEBOOK_TOKEN_URL.to_string(),
                    profile_url: "http://127.0.0.1:1/me".to_string(),
                },
            },
            reqwest::Client::new(),
        );

        let result = connector
            .fetch_profile(&SecretString::from("SUPER_SECRET_TOKEN".to_string()))
            .await;

        assert!(matches!(
            result,
            Err(AppError::ProviderUnavailable(Platform::Facebook))
        ));
        let output = logs.contents();
        assert!(output.contains("プロバイダー通信エラー"));
        assert!(!output.contains("SUPER_SECRET_TOKEN"));
        assert!(!output.contains("access_token"));
    }
}
