//! # 路由配置
//!
//! `/health` 公开，其余路由经过 Bearer 认证

use axum::Router;
use axum::routing::{delete, get, post};

use super::handlers::{cache, credentials, health, mural};
use super::middleware::auth;
use crate::management::server::AppState;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/mural/{account_identifier}", mural_routes())
        .nest("/integration-credentials", credential_routes())
        .nest("/admin/provider-cache", cache_routes())
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(protected)
        .with_state(state)
}

/// Mural 租户路由
fn mural_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts",
            get(mural::get_accounts).post(mural::create_account),
        )
        .route("/accounts/all", get(mural::get_all_accounts))
        .route("/accounts/{account_id}", get(mural::get_account))
        .route("/organizations", post(mural::create_organization))
        .route("/organizations/search", post(mural::search_organizations))
        .route(
            "/organizations/search/all",
            post(mural::get_all_organizations),
        )
        .route(
            "/organizations/{organization_id}",
            get(mural::get_organization),
        )
        .route(
            "/organizations/{organization_id}/kyc-link",
            get(mural::get_organization_kyc_link),
        )
        .route(
            "/organizations/{organization_id}/tos-link",
            get(mural::get_organization_tos_link),
        )
        .route("/payouts/payout", post(mural::create_payout_request))
        .route(
            "/payouts/payout/{payout_request_id}",
            get(mural::get_payout_request),
        )
        .route(
            "/payouts/payout/{payout_request_id}/execute",
            post(mural::execute_payout_request),
        )
        .route(
            "/payouts/payout/{payout_request_id}/cancel",
            post(mural::cancel_payout_request),
        )
        .route("/payouts/search", post(mural::search_payout_requests))
        .route("/payouts/search/all", post(mural::get_all_payout_requests))
        .route("/payouts/bank-details", get(mural::get_bank_details))
        .route(
            "/payouts/fees/token-to-fiat",
            post(mural::get_payout_fees_for_token_amount),
        )
        .route(
            "/payouts/fees/fiat-to-token",
            post(mural::get_payout_fees_for_fiat_amount),
        )
        .route(
            "/transactions/search/account/{account_id}",
            post(mural::search_transactions),
        )
        .route(
            "/transactions/search/account/{account_id}/all",
            post(mural::get_all_transactions),
        )
}

/// 集成凭证管理路由
fn credential_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(credentials::list_credentials)
                .post(credentials::create_credential)
                .patch(credentials::update_credentials),
        )
        .route("/count", get(credentials::count_credentials))
        .route(
            "/{id}",
            get(credentials::get_credential)
                .put(credentials::replace_credential)
                .patch(credentials::update_credential)
                .delete(credentials::delete_credential),
        )
}

/// 客户端缓存管理路由
fn cache_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(cache::list_cached_providers).delete(cache::clear_provider_cache),
        )
        .route("/{account_identifier}", delete(cache::evict_provider))
}
