pub mod memory;
pub mod social_account;

pub use memory::InMemoryAccountStore;
pub use social_account::SocialAccountRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewSocialAccount, SocialAccount, SyncUpdate};

/// ソーシャルアカウントの永続化インターフェース
///
/// 実体は Postgres（[`SocialAccountRepository`]）または
/// インメモリ（[`InMemoryAccountStore`]）。
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// ユーザーの有効なアカウント一覧（connected_at 降順）
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<SocialAccount>, AppError>;

    async fn find(&self, account_id: Uuid) -> Result<Option<SocialAccount>, AppError>;

    /// 新しいアカウントを保存
    ///
    /// 同一ユーザー・プラットフォーム・プラットフォームIDの有効な行が既にある場合は
    /// その行を最新のトークンとプロフィールで更新して返す（重複行を作らない）。
    async fn insert(&self, account: NewSocialAccount) -> Result<SocialAccount, AppError>;

    /// 連携解除（is_active = false、論理削除）
    ///
    /// 既に解除済みでもエラーにしない。
    /// 他ユーザーのアカウント・存在しない ID は `AccountNotFound`。
    async fn disconnect(&self, user_id: Uuid, account_id: Uuid) -> Result<(), AppError>;

    /// last_sync_at のみ現在時刻に更新
    async fn touch_sync(&self, account_id: Uuid) -> Result<(), AppError>;

    /// 同期結果を保存し、last_sync_at を現在時刻に更新
    async fn record_sync(
        &self,
        account_id: Uuid,
        update: SyncUpdate,
    ) -> Result<SocialAccount, AppError>;
}
