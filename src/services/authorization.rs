use secrecy::SecretString;
use serde::Serialize;
use uuid::Uuid;

use super::connectors::{AuthorizationRequest, PlatformConnector};
use super::pending::PendingAuthorizationStore;
use super::pkce;
use crate::error::AppError;

/// 認可開始の結果
#[derive(Debug, Serialize)]
pub struct AuthorizationStart {
    pub auth_url: String,
    /// state を使わないプラットフォームでは None
    #[serde(skip)]
    pub state: Option<String>,
}

/// 認可フローを開始し、プロバイダーの認可 URL を返す
///
/// state を使うプラットフォームでは試行ごとに state（と PKCE verifier）を生成し、
/// URL の生成に成功した後で保留中の認可として保存する。
pub fn start_authorization(
    connector: &dyn PlatformConnector,
    pending: &PendingAuthorizationStore,
    user_id: Option<Uuid>,
) -> Result<AuthorizationStart, AppError> {
    let platform = connector.platform();
    let flow = connector.authorization_flow();

    let state = flow.uses_state().then(pkce::generate_state);
    let code_verifier = flow.uses_pkce().then(pkce::generate_code_verifier);
    let code_challenge = code_verifier
        .as_deref()
        .map(pkce::generate_code_challenge);

    let auth_url = connector.authorization_url(&AuthorizationRequest {
        state: state.as_deref(),
        code_challenge: code_challenge.as_deref(),
    })?;

    if let Some(state) = &state {
        pending.insert(
            state.clone(),
            platform,
            user_id,
            code_verifier.map(SecretString::from),
        );
    }

    tracing::info!(platform = %platform, user_id = ?user_id, "認可フロー開始");

    Ok(AuthorizationStart { auth_url, state })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use secrecy::ExposeSecret;
    use time::Duration;

    use super::*;
    use crate::models::Platform;
    use crate::services::connectors::{
        ClientCredentials, ConnectorConfig, InstagramConnector, LinkedInConnector,
        TwitterConnector,
    };

    fn connector_config(platform: Platform) -> ConnectorConfig {
        ConnectorConfig {
            credentials: ClientCredentials {
                client_id: format!("{}-client", platform),
                client_secret: SecretString::from("secret".to_string()),
            },
            redirect_uri: format!("http://localhost:5173{}", platform.callback_path()),
            endpoints: match platform {
                Platform::Twitter => TwitterConnector::default_endpoints(),
                Platform::Linkedin => LinkedInConnector::default_endpoints(),
                _ => InstagramConnector::default_endpoints(),
            },
        }
    }

    fn query_of(url: &str) -> BTreeMap<String, String> {
        reqwest::Url::parse(url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }

    #[test]
    fn test_twitter_start_stores_verifier_matching_challenge() {
        let connector =
            TwitterConnector::new(connector_config(Platform::Twitter), reqwest::Client::new());
        let pending = PendingAuthorizationStore::new(Duration::minutes(10));
        let user_id = Uuid::new_v4();

        let start = start_authorization(&connector, &pending, Some(user_id)).unwrap();
        let query = query_of(&start.auth_url);
        let state = start.state.unwrap();

        assert_eq!(query["state"], state);
        assert_eq!(state.len(), pkce::STATE_LENGTH);

        let stored = pending.take(&state).unwrap();
        assert_eq!(stored.platform, Platform::Twitter);
        assert_eq!(stored.user_id, Some(user_id));
        let verifier = stored.code_verifier.unwrap();
        assert_eq!(
            query["code_challenge"],
            pkce::generate_code_challenge(verifier.expose_secret())
        );
    }

    #[test]
    fn test_each_start_gets_fresh_state_and_verifier() {
        let connector =
            TwitterConnector::new(connector_config(Platform::Twitter), reqwest::Client::new());
        let pending = PendingAuthorizationStore::new(Duration::minutes(10));

        let first = start_authorization(&connector, &pending, None).unwrap();
        let second = start_authorization(&connector, &pending, None).unwrap();

        assert_ne!(first.state, second.state);
        assert_ne!(
            query_of(&first.auth_url)["code_challenge"],
            query_of(&second.auth_url)["code_challenge"]
        );
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_linkedin_start_stores_state_without_verifier() {
        let connector =
            LinkedInConnector::new(connector_config(Platform::Linkedin), reqwest::Client::new());
        let pending = PendingAuthorizationStore::new(Duration::minutes(10));

        let start = start_authorization(&connector, &pending, None).unwrap();
        let stored = pending.take(start.state.as_deref().unwrap()).unwrap();

        assert!(stored.code_verifier.is_none());
        assert!(!query_of(&start.auth_url).contains_key("code_challenge"));
    }

    #[test]
    fn test_plain_flow_stores_nothing() {
        let connector = InstagramConnector::new(
            connector_config(Platform::Instagram),
            reqwest::Client::new(),
        );
        let pending = PendingAuthorizationStore::new(Duration::minutes(10));

        let start = start_authorization(&connector, &pending, None).unwrap();

        assert!(start.state.is_none());
        assert!(pending.is_empty());
        assert!(!query_of(&start.auth_url).contains_key("state"));
    }
}
