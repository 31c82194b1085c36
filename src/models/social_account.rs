use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::Platform;

/// ユーザーと連携済みソーシャルアカウントの紐付け
///
/// # Security
/// access_token / refresh_token は API レスポンスに含めない。
/// `Debug` 出力も secrecy によりマスクされる。
#[derive(Debug, Serialize)]
pub struct SocialAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub platform_user_id: String,
    pub username: String,
    pub display_name: String,
    #[serde(skip)]
    pub access_token: SecretString,
    #[serde(skip)]
    pub refresh_token: Option<SecretString>,
    pub token_expires_at: Option<OffsetDateTime>,
    pub followers_count: i64,
    pub is_active: bool,
    pub connected_at: OffsetDateTime,
    pub last_sync_at: Option<OffsetDateTime>,
}

impl Clone for SocialAccount {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            user_id: self.user_id,
            platform: self.platform,
            platform_user_id: self.platform_user_id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            access_token: copy_secret(&self.access_token),
            refresh_token: self.refresh_token.as_ref().map(copy_secret),
            token_expires_at: self.token_expires_at,
            followers_count: self.followers_count,
            is_active: self.is_active,
            connected_at: self.connected_at,
            last_sync_at: self.last_sync_at,
        }
    }
}

/// コネクタが正規化した新規アカウント情報（挿入前）
#[derive(Debug)]
pub struct NewSocialAccount {
    pub user_id: Uuid,
    pub platform: Platform,
    pub platform_user_id: String,
    pub username: String,
    pub display_name: String,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub token_expires_at: Option<OffsetDateTime>,
    pub followers_count: i64,
}

/// 同期処理の結果（last_sync_at は保存時に現在時刻で更新）
#[derive(Debug, Default)]
pub struct SyncUpdate {
    pub followers_count: Option<i64>,
    /// トークンがローテーションされた場合のみ設定
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub token_expires_at: Option<OffsetDateTime>,
}

/// SecretString の複製（平文は呼び出し元に露出しない）
pub(crate) fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}
