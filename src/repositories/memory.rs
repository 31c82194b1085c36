use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AccountStore;
use crate::error::AppError;
use crate::models::{NewSocialAccount, SocialAccount, SyncUpdate};

/// インメモリのアカウントストア
///
/// DATABASE_URL 未設定時（ローカル開発）とテストで使用する。
/// プロセス終了でデータは失われる。
#[derive(Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<Vec<SocialAccount>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 無効化済みも含めた全行数
    pub async fn row_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<SocialAccount>, AppError> {
        let accounts = self.accounts.read().await;
        let mut active: Vec<SocialAccount> = accounts
            .iter()
            .filter(|a| a.user_id == user_id && a.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.connected_at.cmp(&a.connected_at));
        Ok(active)
    }

    async fn find(&self, account_id: Uuid) -> Result<Option<SocialAccount>, AppError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.id == account_id).cloned())
    }

    async fn insert(&self, account: NewSocialAccount) -> Result<SocialAccount, AppError> {
        let mut accounts = self.accounts.write().await;

        if let Some(existing) = accounts.iter_mut().find(|a| {
            a.is_active
                && a.user_id == account.user_id
                && a.platform == account.platform
                && a.platform_user_id == account.platform_user_id
        }) {
            existing.username = account.username;
            existing.display_name = account.display_name;
            existing.access_token = account.access_token;
            existing.refresh_token = account.refresh_token;
            existing.token_expires_at = account.token_expires_at;
            existing.followers_count = account.followers_count;
            return Ok(existing.clone());
        }

        let stored = SocialAccount {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            platform: account.platform,
            platform_user_id: account.platform_user_id,
            username: account.username,
            display_name: account.display_name,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            token_expires_at: account.token_expires_at,
            followers_count: account.followers_count,
            is_active: true,
            connected_at: OffsetDateTime::now_utc(),
            last_sync_at: None,
        };
        accounts.push(stored.clone());
        Ok(stored)
    }

    async fn disconnect(&self, user_id: Uuid, account_id: Uuid) -> Result<(), AppError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == account_id && a.user_id == user_id)
            .ok_or(AppError::AccountNotFound)?;
        account.is_active = false;
        Ok(())
    }

    async fn touch_sync(&self, account_id: Uuid) -> Result<(), AppError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or(AppError::AccountNotFound)?;
        account.last_sync_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    async fn record_sync(
        &self,
        account_id: Uuid,
        update: SyncUpdate,
    ) -> Result<SocialAccount, AppError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or(AppError::AccountNotFound)?;

        if let Some(followers_count) = update.followers_count {
            account.followers_count = followers_count;
        }
        if let Some(access_token) = update.access_token {
            account.access_token = access_token;
            account.token_expires_at = update.token_expires_at;
        }
        if let Some(refresh_token) = update.refresh_token {
            account.refresh_token = Some(refresh_token);
        }
        account.last_sync_at = Some(OffsetDateTime::now_utc());
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::{ExposeSecret, SecretString};

    use super::*;
    use crate::models::Platform;

    fn new_account(user_id: Uuid, platform: Platform, platform_user_id: &str) -> NewSocialAccount {
        NewSocialAccount {
            user_id,
            platform,
            platform_user_id: platform_user_id.to_string(),
            username: "ada".to_string(),
            display_name: "Ada Lovelace".to_string(),
            access_token: SecretString::from("token-1".to_string()),
            refresh_token: None,
            token_expires_at: None,
            followers_count: 3,
        }
    }

    #[tokio::test]
    async fn test_insert_sets_defaults() {
        let store = InMemoryAccountStore::new();
        let user_id = Uuid::new_v4();

        let account = store
            .insert(new_account(user_id, Platform::Instagram, "ig-1"))
            .await
            .unwrap();

        assert!(account.is_active);
        assert!(account.last_sync_at.is_none());
        assert_eq!(account.user_id, user_id);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let store = InMemoryAccountStore::new();
        let user_id = Uuid::new_v4();
        let account = store
            .insert(new_account(user_id, Platform::Twitter, "tw-1"))
            .await
            .unwrap();

        store.disconnect(user_id, account.id).await.unwrap();
        store.disconnect(user_id, account.id).await.unwrap();

        let stored = store.find(account.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        // 論理削除のため行は残る
        assert_eq!(store.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_other_users_account_fails() {
        let store = InMemoryAccountStore::new();
        let account = store
            .insert(new_account(Uuid::new_v4(), Platform::Twitter, "tw-1"))
            .await
            .unwrap();

        let result = store.disconnect(Uuid::new_v4(), account.id).await;
        assert!(matches!(result, Err(AppError::AccountNotFound)));
        assert!(store.find(account.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_list_active_excludes_disconnected_and_orders_newest_first() {
        let store = InMemoryAccountStore::new();
        let user_id = Uuid::new_v4();

        let first = store
            .insert(new_account(user_id, Platform::Instagram, "ig-1"))
            .await
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store
            .insert(new_account(user_id, Platform::Linkedin, "li-1"))
            .await
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let third = store
            .insert(new_account(user_id, Platform::Facebook, "fb-1"))
            .await
            .unwrap();
        store
            .insert(new_account(Uuid::new_v4(), Platform::Facebook, "fb-2"))
            .await
            .unwrap();

        store.disconnect(user_id, second.id).await.unwrap();

        let listed = store.list_active(user_id).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);
        assert!(listed.iter().all(|a| a.is_active));
    }

    #[tokio::test]
    async fn test_reconnect_updates_existing_active_row() {
        let store = InMemoryAccountStore::new();
        let user_id = Uuid::new_v4();
        let first = store
            .insert(new_account(user_id, Platform::Twitter, "tw-1"))
            .await
            .unwrap();

        let mut again = new_account(user_id, Platform::Twitter, "tw-1");
        again.access_token = SecretString::from("token-2".to_string());
        again.followers_count = 99;
        let second = store.insert(again).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.access_token.expose_secret(), "token-2");
        assert_eq!(second.followers_count, 99);
        assert_eq!(store.list_active(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect_creates_new_row() {
        let store = InMemoryAccountStore::new();
        let user_id = Uuid::new_v4();
        let first = store
            .insert(new_account(user_id, Platform::Twitter, "tw-1"))
            .await
            .unwrap();
        store.disconnect(user_id, first.id).await.unwrap();

        let second = store
            .insert(new_account(user_id, Platform::Twitter, "tw-1"))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.row_count().await, 2);
    }

    #[tokio::test]
    async fn test_record_sync_updates_followers_and_sync_time() {
        let store = InMemoryAccountStore::new();
        let account = store
            .insert(new_account(Uuid::new_v4(), Platform::Twitter, "tw-1"))
            .await
            .unwrap();

        let updated = store
            .record_sync(
                account.id,
                SyncUpdate {
                    followers_count: Some(120),
                    ..SyncUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.followers_count, 120);
        assert!(updated.last_sync_at.is_some());
        assert_eq!(updated.access_token.expose_secret(), "token-1");
    }

    #[tokio::test]
    async fn test_touch_sync_unknown_account() {
        let store = InMemoryAccountStore::new();
        let result = store.touch_sync(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::AccountNotFound)));
    }
}
