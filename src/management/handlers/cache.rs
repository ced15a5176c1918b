//! 客户端缓存管理处理器

use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::json;

use crate::management::response;
use crate::management::server::AppState;

/// 当前缓存的租户
pub async fn list_cached_providers(State(state): State<AppState>) -> Response {
    let accounts = state.factory.cached_accounts();
    response::success(json!({
        "ttlSeconds": state.factory.ttl().as_secs(),
        "count": accounts.len(),
        "accounts": accounts,
    }))
}

/// 清除全部缓存
pub async fn clear_provider_cache(State(state): State<AppState>) -> Response {
    let removed = state.factory.invalidate(None);
    response::success_with_message(json!({ "removed": removed }), "客户端缓存已清空")
}

/// 清除单个租户的缓存
pub async fn evict_provider(
    State(state): State<AppState>,
    Path(account_identifier): Path<String>,
) -> Response {
    let removed = state.factory.invalidate(Some(&account_identifier));
    response::success(json!({
        "accountIdentifier": account_identifier,
        "removed": removed,
    }))
}
