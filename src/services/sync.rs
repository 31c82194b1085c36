use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::connectors::ConnectorRegistry;
use crate::error::AppError;
use crate::models::{SocialAccount, SyncUpdate};
use crate::repositories::AccountStore;

/// 有効期限までの残りがこれ未満ならトークンを更新する
pub const REFRESH_MARGIN: Duration = Duration::minutes(5);

/// トークン更新が必要か（リフレッシュトークンがあり、期限が近いか切れている）
pub fn needs_refresh(account: &SocialAccount, now: OffsetDateTime) -> bool {
    account.refresh_token.is_some()
        && account
            .token_expires_at
            .is_some_and(|expires_at| expires_at <= now + REFRESH_MARGIN)
}

/// アカウントを同期する
///
/// # 処理フロー
/// 1. 所有者確認（他ユーザー・解除済みは `AccountNotFound`）
/// 2. コネクタ未設定なら last_sync_at のみ更新
/// 3. 期限が近ければトークンを更新
/// 4. プロフィールを再取得してフォロワー数を保存
pub async fn sync_account(
    connectors: &ConnectorRegistry,
    store: &dyn AccountStore,
    user_id: Uuid,
    account_id: Uuid,
) -> Result<SocialAccount, AppError> {
    let account = store
        .find(account_id)
        .await?
        .filter(|a| a.user_id == user_id && a.is_active)
        .ok_or(AppError::AccountNotFound)?;
    let platform = account.platform;

    let Some(connector) = connectors.find(platform) else {
        tracing::info!(platform = %platform, account_id = %account_id, "コネクタ未設定のため同期日時のみ更新");
        store.touch_sync(account_id).await?;
        return store
            .find(account_id)
            .await?
            .ok_or(AppError::AccountNotFound);
    };

    let now = OffsetDateTime::now_utc();
    let mut update = SyncUpdate::default();

    if let Some(refresh_token) = account
        .refresh_token
        .as_ref()
        .filter(|_| needs_refresh(&account, now))
    {
        match connector.refresh_tokens(refresh_token).await? {
            Some(tokens) => {
                update.token_expires_at = tokens.expires_at(now);
                update.access_token = Some(tokens.access_token);
                update.refresh_token = tokens.refresh_token;
            }
            None => {
                tracing::debug!(platform = %platform, "トークン更新手段なし（現在のトークンを使用）");
            }
        }
    }

    let access_token = update
        .access_token
        .as_ref()
        .unwrap_or(&account.access_token);
    let profile = connector.fetch_profile(access_token).await?;
    update.followers_count = Some(profile.followers_count);

    let synced = store.record_sync(account_id, update).await?;
    tracing::info!(
        platform = %platform,
        account_id = %account_id,
        followers_count = synced.followers_count,
        "アカウント同期完了"
    );

    Ok(synced)
}
