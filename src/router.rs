use std::time::Duration;

use axum::{
    Router,
    routing::{delete, get, post},
};
use http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::handlers::{self, current_user::USER_ID_HEADER};
use crate::state::AppState;

/// Router の構築
pub fn create_router(state: AppState) -> Result<Router, AppError> {
    let cors = cors_layer(&state.config.app_origin)?;

    Ok(Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/social/accounts", get(handlers::list_accounts))
        .route(
            "/api/social/accounts/{account_id}",
            delete(handlers::disconnect_account),
        )
        .route(
            "/api/social/accounts/{account_id}/sync",
            post(handlers::sync_account),
        )
        .route(
            "/api/social/platforms/{platform}/authorize",
            get(handlers::authorize),
        )
        .route(
            "/api/social/platforms/{platform}/callback",
            get(handlers::callback),
        )
        .layer(cors)
        .with_state(state))
}

/// SPA のオリジンのみ許可する CORS 設定
fn cors_layer(app_origin: &str) -> Result<CorsLayer, AppError> {
    let origin = HeaderValue::from_str(app_origin.trim_end_matches('/')).map_err(|e| {
        tracing::error!(error = ?e, app_origin = %app_origin, "APP_ORIGIN が不正");
        AppError::Internal(anyhow::anyhow!("invalid APP_ORIGIN: {}", e))
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(USER_ID_HEADER)])
        .max_age(Duration::from_secs(3600)))
}
