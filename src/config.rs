use secrecy::SecretBox;
use serde::Deserialize;

use crate::models::Platform;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// 未設定の場合はインメモリストアで起動（開発用）
    #[serde(default)]
    pub database_url: Option<SecretBox<String>>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// SPA のオリジン（redirect_uri と CORS の許可元に使用）
    pub app_origin: String,

    /// トークン暗号化キー（Base64エンコード、32バイト）
    pub token_encryption_key: SecretBox<String>,

    /// プロバイダー API 呼び出しのタイムアウト（秒）
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// 認可開始からコールバックまでの有効期限（秒）
    #[serde(default = "default_pending_authorization_ttl_secs")]
    pub pending_authorization_ttl_secs: i64,

    // Instagram 設定（オプション）
    #[serde(default)]
    pub instagram_client_id: Option<String>,
    pub instagram_client_secret: Option<SecretBox<String>>,

    // Facebook 設定（オプション）
    #[serde(default)]
    pub facebook_app_id: Option<String>,
    pub facebook_app_secret: Option<SecretBox<String>>,

    // Twitter 設定（オプション）
    #[serde(default)]
    pub twitter_client_id: Option<String>,
    pub twitter_client_secret: Option<SecretBox<String>>,

    // LinkedIn 設定（オプション）
    #[serde(default)]
    pub linkedin_client_id: Option<String>,
    pub linkedin_client_secret: Option<SecretBox<String>>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PENDING_AUTHORIZATION_TTL_SECS: i64 = 600;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

fn default_pending_authorization_ttl_secs() -> i64 {
    DEFAULT_PENDING_AUTHORIZATION_TTL_SECS
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// プラットフォームごとのコールバック URI
    ///
    /// `{app_origin}/auth/<platform>/callback`
    pub fn redirect_uri(&self, platform: Platform) -> String {
        format!(
            "{}{}",
            self.app_origin.trim_end_matches('/'),
            platform.callback_path()
        )
    }

    /// クライアントID・シークレットの組（両方揃っている場合のみ）
    pub fn client_credentials(&self, platform: Platform) -> Option<(&str, &SecretBox<String>)> {
        let (id, secret) = match platform {
            Platform::Instagram => (&self.instagram_client_id, &self.instagram_client_secret),
            Platform::Facebook => (&self.facebook_app_id, &self.facebook_app_secret),
            Platform::Twitter => (&self.twitter_client_id, &self.twitter_client_secret),
            Platform::Linkedin => (&self.linkedin_client_id, &self.linkedin_client_secret),
            Platform::Tiktok => return None,
        };
        match (id, secret) {
            (Some(id), Some(secret)) if !id.is_empty() => Some((id.as_str(), secret)),
            _ => None,
        }
    }
}
