use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::{
    ClientCredentials, ConnectorConfig, FacebookConnector, InstagramConnector, LinkedInConnector,
    PlatformConnector, TwitterConnector,
};
use crate::config::Config;
use crate::error::AppError;
use crate::models::Platform;

/// 設定済みコネクタの一覧
///
/// 資格情報が揃っているプラットフォームのみ登録される。
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<Platform, Arc<dyn PlatformConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 設定からコネクタを構築
    ///
    /// 全コネクタでタイムアウト付きの HTTP クライアントを共有する
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "HTTP クライアントの構築に失敗");
                AppError::Internal(anyhow::anyhow!("failed to build http client"))
            })?;

        let mut registry = Self::new();

        for platform in Platform::ALL {
            let Some((client_id, client_secret)) = config.client_credentials(platform) else {
                tracing::info!(platform = %platform, "{} 未設定（スキップ）", platform.display_name());
                continue;
            };

            let connector_config = |endpoints| ConnectorConfig {
                credentials: ClientCredentials {
                    client_id: client_id.to_string(),
                    client_secret: SecretString::from(client_secret.expose_secret().clone()),
                },
                redirect_uri: config.redirect_uri(platform),
                endpoints,
            };

            let connector: Arc<dyn PlatformConnector> = match platform {
                Platform::Instagram => Arc::new(InstagramConnector::new(
                    connector_config(InstagramConnector::default_endpoints()),
                    http_client.clone(),
                )),
                Platform::Facebook => Arc::new(FacebookConnector::new(
                    connector_config(FacebookConnector::default_endpoints()),
                    http_client.clone(),
                )),
                Platform::Twitter => Arc::new(TwitterConnector::new(
                    connector_config(TwitterConnector::default_endpoints()),
                    http_client.clone(),
                )),
                Platform::Linkedin => Arc::new(LinkedInConnector::new(
                    connector_config(LinkedInConnector::default_endpoints()),
                    http_client.clone(),
                )),
                Platform::Tiktok => continue,
            };

            tracing::info!(platform = %platform, "{} コネクタを初期化", platform.display_name());
            registry.register(connector);
        }

        Ok(registry)
    }

    /// コネクタを登録（同じプラットフォームは上書き）
    pub fn register(&mut self, connector: Arc<dyn PlatformConnector>) {
        self.connectors.insert(connector.platform(), connector);
    }

    /// プラットフォームのコネクタを取得
    ///
    /// # Errors
    /// - TikTok: `UnsupportedPlatform`（連携未対応）
    /// - 資格情報未設定: `PlatformNotConfigured`
    pub fn get(&self, platform: Platform) -> Result<Arc<dyn PlatformConnector>, AppError> {
        if platform == Platform::Tiktok {
            return Err(AppError::UnsupportedPlatform(platform.to_string()));
        }
        self.find(platform)
            .ok_or(AppError::PlatformNotConfigured(platform))
    }

    pub fn find(&self, platform: Platform) -> Option<Arc<dyn PlatformConnector>> {
        self.connectors.get(&platform).cloned()
    }

    /// 設定済みプラットフォーム（表示順）
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.connectors.contains_key(p))
            .collect()
    }
}
