//! # Mural 租户路由处理器
//!
//! 路径中的 `accountIdentifier` 选择租户凭证。上游 JSON 原样返回，
//! 限流错误按 [`RetryPolicy`](crate::provider::RetryPolicy) 重试。

use axum::Json;
use axum::extract::{Extension, Path, Query, RawQuery, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ProviderError, ProviderResult, Result};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};
use crate::management::middleware::RequestId;
use crate::management::response::ErrorInfo;
use crate::management::server::AppState;
use crate::provider::types::{
    Account, AccountsResponse, BankDetailsResponse, CreateAccountRequest,
    CreateOrganizationRequest, CreatePayoutRequest, FeeQuoteResponse, FiatFeeRequest,
    KycLinkResponse, Organization, Page, PayoutResponse, PayoutStatusFilter, TokenFeeRequest,
    TosLinkResponse, Transaction,
};
use crate::provider::{Drained, MuralProvider, ON_BEHALF_OF_HEADER};

/// 分页查询参数
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub limit: Option<u32>,
    pub next_id: Option<String>,
}

/// 拉取全部时的上限参数
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainParams {
    pub max_items: Option<usize>,
}

/// 组织搜索请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSearchBody {
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub next_id: Option<String>,
}

/// 出金搜索请求体
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutSearchBody {
    pub filter: PayoutStatusFilter,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub next_id: Option<String>,
}

/// 拉取全部的响应体
///
/// 中途失败时保留已取得的结果，`complete` 为 `false` 并附带中断原因
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainedBody<T: Serialize> {
    pub results: Vec<T>,
    pub total: usize,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl<T: Serialize> From<Drained<T>> for DrainedBody<T> {
    fn from(drained: Drained<T>) -> Self {
        let error = drained.interrupted.map(|err| ErrorInfo {
            code: err.kind().code().to_string(),
            message: err.to_string(),
            details: None,
        });
        Self {
            total: drained.items.len(),
            complete: error.is_none(),
            results: drained.items,
            error,
        }
    }
}

/// 首页即失败时作为错误返回，以便走重试与错误映射
fn partial_or_error<T>(drained: Drained<T>) -> ProviderResult<Drained<T>> {
    match drained {
        Drained {
            items,
            interrupted: Some(err),
        } if items.is_empty() => Err(err),
        drained => Ok(drained),
    }
}

/// 读取 `on-behalf-of` 请求头，空值视为未提供
fn on_behalf_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ON_BEHALF_OF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

async fn resolve(
    state: &AppState,
    request_id: &RequestId,
    account_identifier: &str,
    operation: &str,
) -> ProviderResult<Arc<MuralProvider>> {
    ldebug!(
        request_id,
        LogStage::RequestStart,
        LogComponent::Handler,
        operation,
        &format!("处理 Mural 请求: account={account_identifier}")
    );
    state.factory.resolve(account_identifier).await
}

fn max_items(state: &AppState, params: &DrainParams) -> usize {
    params.max_items.unwrap_or(state.config.provider.max_items)
}

// ---------------------------------------------------------------------------
// 账户
// ---------------------------------------------------------------------------

pub async fn get_accounts(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AccountsResponse>> {
    let provider = resolve(&state, &request_id, &account_identifier, "get_accounts").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();

    let accounts = state
        .retry
        .execute("get_accounts", || provider.get_accounts(obo))
        .await?;
    Ok(Json(accounts))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, account_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Account>> {
    let provider = resolve(&state, &request_id, &account_identifier, "get_account").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();

    let account = state
        .retry
        .execute("get_account", || provider.get_account(&account_id, obo))
        .await?;
    Ok(Json(account))
}

pub async fn create_account(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreateAccountRequest>,
) -> Result<Json<Account>> {
    let provider = resolve(&state, &request_id, &account_identifier, "create_account").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();
    let description = body.description.as_deref();

    let account = state
        .retry
        .execute("create_account", || {
            provider.create_account(&body.name, description, obo)
        })
        .await?;
    Ok(Json(account))
}

/// 全部账户；上游不分页，按 `maxItems` 截断
pub async fn get_all_accounts(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    Query(params): Query<DrainParams>,
    headers: HeaderMap,
) -> Result<Json<DrainedBody<Account>>> {
    let provider = resolve(&state, &request_id, &account_identifier, "get_all_accounts").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();
    let max = max_items(&state, &params);

    let accounts = state
        .retry
        .execute("get_all_accounts", || provider.get_all_accounts(max, obo))
        .await?;
    Ok(Json(DrainedBody::from(Drained {
        items: accounts,
        interrupted: None,
    })))
}

// ---------------------------------------------------------------------------
// 组织
// ---------------------------------------------------------------------------

pub async fn create_organization(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    Json(body): Json<CreateOrganizationRequest>,
) -> Result<Json<Organization>> {
    let provider = resolve(&state, &request_id, &account_identifier, "create_organization").await?;
    let provider = provider.as_ref();
    let body = &body;

    let organization = state
        .retry
        .execute("create_organization", || provider.create_organization(body))
        .await?;
    Ok(Json(organization))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, organization_id)): Path<(String, String)>,
) -> Result<Json<Organization>> {
    let provider = resolve(&state, &request_id, &account_identifier, "get_organization").await?;
    let provider = provider.as_ref();

    let organization = state
        .retry
        .execute("get_organization", || provider.get_organization(&organization_id))
        .await?;
    Ok(Json(organization))
}

pub async fn get_organization_kyc_link(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, organization_id)): Path<(String, String)>,
) -> Result<Json<KycLinkResponse>> {
    let provider =
        resolve(&state, &request_id, &account_identifier, "get_organization_kyc_link").await?;
    let provider = provider.as_ref();

    let link = state
        .retry
        .execute("get_organization_kyc_link", || {
            provider.get_organization_kyc_link(&organization_id)
        })
        .await?;
    Ok(Json(link))
}

pub async fn get_organization_tos_link(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, organization_id)): Path<(String, String)>,
) -> Result<Json<TosLinkResponse>> {
    let provider =
        resolve(&state, &request_id, &account_identifier, "get_organization_tos_link").await?;
    let provider = provider.as_ref();

    let link = state
        .retry
        .execute("get_organization_tos_link", || {
            provider.get_organization_tos_link(&organization_id)
        })
        .await?;
    Ok(Json(link))
}

pub async fn search_organizations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    Json(body): Json<OrganizationSearchBody>,
) -> Result<Json<Page<Organization>>> {
    let provider = resolve(&state, &request_id, &account_identifier, "search_organizations").await?;
    let provider = provider.as_ref();
    let filter = body.filter.as_ref();
    let next_id = body.next_id.as_deref();

    let page = state
        .retry
        .execute("search_organizations", || {
            provider.search_organizations(filter, body.limit, next_id)
        })
        .await?;
    Ok(Json(page))
}

pub async fn get_all_organizations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    Query(params): Query<DrainParams>,
    Json(body): Json<OrganizationSearchBody>,
) -> Result<Json<DrainedBody<Organization>>> {
    let provider =
        resolve(&state, &request_id, &account_identifier, "get_all_organizations").await?;
    let provider = provider.as_ref();
    let filter = body.filter.as_ref();
    let max_items = max_items(&state, &params);

    let drained = state
        .retry
        .execute("get_all_organizations", || async move {
            partial_or_error(provider.get_all_organizations(filter, max_items).await)
        })
        .await?;
    Ok(Json(drained.into()))
}

// ---------------------------------------------------------------------------
// 出金
// ---------------------------------------------------------------------------

pub async fn create_payout_request(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreatePayoutRequest>,
) -> Result<Json<PayoutResponse>> {
    let provider =
        resolve(&state, &request_id, &account_identifier, "create_payout_request").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();
    let body = &body;

    let payout = state
        .retry
        .execute("create_payout_request", || {
            provider.create_payout_request(body, obo)
        })
        .await?;
    Ok(Json(payout))
}

pub async fn get_payout_request(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, payout_request_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<PayoutResponse>> {
    let provider = resolve(&state, &request_id, &account_identifier, "get_payout_request").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();

    let payout = state
        .retry
        .execute("get_payout_request", || {
            provider.get_payout_request(&payout_request_id, obo)
        })
        .await?;
    Ok(Json(payout))
}

pub async fn search_payout_requests(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PayoutSearchBody>,
) -> Result<Json<Page<PayoutResponse>>> {
    let provider =
        resolve(&state, &request_id, &account_identifier, "search_payout_requests").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();
    let next_id = body.next_id.as_deref();

    let page = state
        .retry
        .execute("search_payout_requests", || {
            provider.search_payout_requests(&body.filter, body.limit, next_id, obo)
        })
        .await?;
    Ok(Json(page))
}

pub async fn get_all_payout_requests(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    Query(params): Query<DrainParams>,
    headers: HeaderMap,
    Json(body): Json<PayoutSearchBody>,
) -> Result<Json<DrainedBody<PayoutResponse>>> {
    let provider =
        resolve(&state, &request_id, &account_identifier, "get_all_payout_requests").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();
    let filter = &body.filter;
    let max_items = max_items(&state, &params);

    let drained = state
        .retry
        .execute("get_all_payout_requests", || async move {
            partial_or_error(provider.get_all_payout_requests(filter, max_items, obo).await)
        })
        .await?;
    Ok(Json(drained.into()))
}

/// 执行出金请求；`on-behalf-of` 必填
pub async fn execute_payout_request(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, payout_request_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<PayoutResponse>> {
    let obo = on_behalf_of(&headers).ok_or_else(|| {
        ProviderError::bad_request(format!(
            "{ON_BEHALF_OF_HEADER} header is required to execute payout requests"
        ))
    })?;
    let provider =
        resolve(&state, &request_id, &account_identifier, "execute_payout_request").await?;
    let provider = provider.as_ref();
    let obo = obo.as_str();

    let payout = state
        .retry
        .execute("execute_payout_request", || {
            provider.execute_payout_request(&payout_request_id, obo)
        })
        .await?;
    Ok(Json(payout))
}

pub async fn cancel_payout_request(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, payout_request_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<PayoutResponse>> {
    let provider =
        resolve(&state, &request_id, &account_identifier, "cancel_payout_request").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();

    let payout = state
        .retry
        .execute("cancel_payout_request", || {
            provider.cancel_payout_request(&payout_request_id, obo)
        })
        .await?;
    Ok(Json(payout))
}

/// 银行信息；`fiatCurrencyAndRail` 可重复出现
pub async fn get_bank_details(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<BankDetailsResponse>> {
    let rails: Vec<String> = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .filter(|(key, _)| key == "fiatCurrencyAndRail")
        .map(|(_, value)| value.into_owned())
        .collect();
    if rails.is_empty() {
        return Err(ProviderError::bad_request("fiatCurrencyAndRail is required").into());
    }

    let provider = resolve(&state, &request_id, &account_identifier, "get_bank_details").await?;
    let provider = provider.as_ref();
    let rails = rails.as_slice();

    let details = state
        .retry
        .execute("get_bank_details", || provider.get_bank_details(rails))
        .await?;
    Ok(Json(details))
}

pub async fn get_payout_fees_for_token_amount(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    Json(body): Json<Vec<TokenFeeRequest>>,
) -> Result<Json<FeeQuoteResponse>> {
    let provider = resolve(
        &state,
        &request_id,
        &account_identifier,
        "get_payout_fees_for_token_amount",
    )
    .await?;
    let provider = provider.as_ref();
    let body = body.as_slice();

    let fees = state
        .retry
        .execute("get_payout_fees_for_token_amount", || {
            provider.get_payout_fees_for_token_amount(body)
        })
        .await?;
    Ok(Json(fees))
}

pub async fn get_payout_fees_for_fiat_amount(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(account_identifier): Path<String>,
    Json(body): Json<Vec<FiatFeeRequest>>,
) -> Result<Json<FeeQuoteResponse>> {
    let provider = resolve(
        &state,
        &request_id,
        &account_identifier,
        "get_payout_fees_for_fiat_amount",
    )
    .await?;
    let provider = provider.as_ref();
    let body = body.as_slice();

    let fees = state
        .retry
        .execute("get_payout_fees_for_fiat_amount", || {
            provider.get_payout_fees_for_fiat_amount(body)
        })
        .await?;
    Ok(Json(fees))
}

// ---------------------------------------------------------------------------
// 交易
// ---------------------------------------------------------------------------

pub async fn search_transactions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, account_id)): Path<(String, String)>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> Result<Json<Page<Transaction>>> {
    let provider = resolve(&state, &request_id, &account_identifier, "search_transactions").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();
    let next_id = params.next_id.as_deref();

    let page = state
        .retry
        .execute("search_transactions", || {
            provider.search_transactions(&account_id, params.limit, next_id, obo)
        })
        .await?;
    Ok(Json(page))
}

pub async fn get_all_transactions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((account_identifier, account_id)): Path<(String, String)>,
    Query(params): Query<DrainParams>,
    headers: HeaderMap,
) -> Result<Json<DrainedBody<Transaction>>> {
    let provider =
        resolve(&state, &request_id, &account_identifier, "get_all_transactions").await?;
    let provider = provider.as_ref();
    let obo = on_behalf_of(&headers);
    let obo = obo.as_deref();
    let account_id = account_id.as_str();
    let max_items = max_items(&state, &params);

    let drained = state
        .retry
        .execute("get_all_transactions", || async move {
            partial_or_error(
                provider
                    .get_all_transactions(account_id, max_items, obo)
                    .await,
            )
        })
        .await?;
    Ok(Json(drained.into()))
}
