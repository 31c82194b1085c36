use axum::{Json, extract::State};
use serde::Serialize;

use crate::models::Platform;
use crate::state::AppState;

/// ヘルスチェックレスポンス
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// 資格情報が設定され、連携可能なプラットフォーム
    pub platforms: Vec<Platform>,
}

/// ヘルスチェックハンドラー
///
/// GET /api/health
///
/// サービスの稼働状況を返す。
/// ロードバランサーやモニタリングツールから呼び出される。
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        platforms: state.connectors.platforms(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::repositories::InMemoryAccountStore;
    use crate::services::ConnectorRegistry;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        let config: Config = envy::from_iter([
            ("APP_ORIGIN".to_string(), "http://localhost:5173".to_string()),
            ("TOKEN_ENCRYPTION_KEY".to_string(), "key".to_string()),
        ])
        .unwrap();
        let state = AppState::with_connectors(
            config,
            Arc::new(InMemoryAccountStore::new()),
            ConnectorRegistry::new(),
        );

        let response = health_check(State(state)).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert!(response.platforms.is_empty());
    }
}
