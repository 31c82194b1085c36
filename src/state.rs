use std::sync::Arc;

use time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::AccountStore;
use crate::services::{ConnectorRegistry, PendingAuthorizationStore};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// ソーシャルアカウントストア（Postgres またはインメモリ）
    pub account_store: Arc<dyn AccountStore>,
    /// 設定済みプラットフォームのコネクタ
    pub connectors: ConnectorRegistry,
    /// 認可開始からコールバックまでの保留中の認可
    pub pending_authorizations: PendingAuthorizationStore,
}

impl AppState {
    /// 設定からコネクタを構築して AppState を作成
    pub fn new(config: Config, account_store: Arc<dyn AccountStore>) -> Result<Self, AppError> {
        let connectors = ConnectorRegistry::from_config(&config)?;
        Ok(Self::with_connectors(config, account_store, connectors))
    }

    /// コネクタを指定して AppState を作成（テストでフェイクプロバイダーを使う場合）
    pub fn with_connectors(
        config: Config,
        account_store: Arc<dyn AccountStore>,
        connectors: ConnectorRegistry,
    ) -> Self {
        let pending_authorizations = PendingAuthorizationStore::new(Duration::seconds(
            config.pending_authorization_ttl_secs,
        ));

        Self {
            config: Arc::new(config),
            account_store,
            connectors,
            pending_authorizations,
        }
    }
}
