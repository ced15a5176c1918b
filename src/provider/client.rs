//! # Mural API 客户端
//!
//! 每个实例绑定一个租户的凭证。每个操作只发起一次上游请求，失败统一映射为 [`ProviderError`]

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use url::Url;

use super::pagination::{DEFAULT_PAGE_SIZE, Drained, drain};
use super::types::{
    Account, AccountsResponse, BankDetailsResponse, CreateAccountRequest,
    CreateOrganizationRequest, CreatePayoutRequest, FeeQuoteResponse, FiatFeeRequest,
    KycLinkResponse, Organization, Page, PayoutResponse, PayoutStatusFilter, TokenFeeRequest,
    TosLinkResponse, Transaction,
};
use crate::error::{DEFAULT_RETRY_AFTER_SECONDS, ProviderError, ProviderResult};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 代理身份请求头
pub const ON_BEHALF_OF_HEADER: &str = "on-behalf-of";
/// 资金操作密钥请求头
pub const TRANSFER_API_KEY_HEADER: &str = "transfer-api-key";
/// 上游限流等待秒数响应头
pub const RETRY_AFTER_API_HEADER: &str = "retry-after-api";

const THROTTLER_MARKER: &str = "ThrottlerException";
const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Mural error";

/// 构造客户端所需的凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuralCredentials {
    pub base_url: String,
    pub api_key: String,
    pub transfer_api_key: Option<String>,
}

/// 客户端参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub page_size: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// 需要资金操作密钥的操作
#[derive(Debug, Clone, Copy)]
enum TransferAction {
    Execute,
    Cancel,
}

impl TransferAction {
    const fn verb(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Cancel => "cancel",
        }
    }
}

/// 绑定单个租户凭证的 Mural 客户端
#[derive(Debug)]
pub struct MuralProvider {
    base_url: String,
    transfer_api_key: Option<String>,
    client: Client,
    options: ClientOptions,
}

impl MuralProvider {
    /// 创建客户端
    ///
    /// `base_url` 或 `api_key` 为空、`base_url` 不是合法 URL 时返回 `Internal`
    pub fn new(credentials: MuralCredentials, options: ClientOptions) -> ProviderResult<Self> {
        let base_url = credentials.base_url.trim();
        let api_key = credentials.api_key.trim();

        if base_url.is_empty() || api_key.is_empty() {
            return Err(ProviderError::Internal(
                "Mural provider requires baseUrl and apiKey".to_string(),
            ));
        }

        Url::parse(base_url).map_err(|e| {
            ProviderError::Internal(format!("Invalid Mural baseUrl '{base_url}': {e}"))
        })?;

        let mut auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderError::Internal("Mural apiKey contains invalid characters".into()))?;
        auth_value.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(AUTHORIZATION, auth_value);
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| ProviderError::Internal(format!("Failed to build Mural HTTP client: {e}")))?;

        let transfer_api_key = credentials
            .transfer_api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transfer_api_key,
            client,
            options,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn has_transfer_api_key(&self) -> bool {
        self.transfer_api_key.is_some()
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.options.page_size
    }

    // -----------------------------------------------------------------------
    // 请求构造与响应处理
    // -----------------------------------------------------------------------

    fn request(&self, method: Method, path: &str, on_behalf_of: Option<&str>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match on_behalf_of.filter(|id| !id.is_empty()) {
            Some(organization_id) => builder.header(ON_BEHALF_OF_HEADER, organization_id),
            None => builder,
        }
    }

    fn transfer_request(
        &self,
        action: TransferAction,
        path: &str,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<RequestBuilder> {
        let transfer_api_key = self.transfer_api_key.as_deref().ok_or_else(|| {
            ProviderError::Internal(format!(
                "Transfer API key is required to {} payout requests",
                action.verb()
            ))
        })?;

        Ok(self
            .request(Method::POST, path, on_behalf_of)
            .header(TRANSFER_API_KEY_HEADER, transfer_api_key)
            .json(&json!({})))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> ProviderResult<T> {
        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(operation, &e))?;

        let status = response.status();
        ldebug!(
            "system",
            LogStage::ExternalApi,
            LogComponent::MuralClient,
            operation,
            &format!(
                "Mural 响应: status={}, elapsed={}ms",
                status.as_u16(),
                started.elapsed().as_millis()
            )
        );

        if !status.is_success() {
            return Err(Self::error_response(operation, response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(operation, &e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::Internal(format!("Failed to decode Mural response for {operation}: {e}"))
        })
    }

    fn transport_error(&self, operation: &str, err: &reqwest::Error) -> ProviderError {
        lwarn!(
            "system",
            LogStage::ExternalApi,
            LogComponent::MuralClient,
            operation,
            &format!("Mural 请求未收到响应: {err}")
        );

        if err.is_builder() {
            return ProviderError::Internal(format!("Failed to build Mural request: {err}"));
        }
        if err.is_timeout() {
            return ProviderError::ServiceUnavailable(format!(
                "Mural API request timed out after {}s",
                self.options.request_timeout.as_secs()
            ));
        }
        ProviderError::ServiceUnavailable(format!("Mural API is unreachable: {err}"))
    }

    async fn error_response(operation: &str, response: Response) -> ProviderError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER_API_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.unwrap_or_default();

        let err = map_error_response(status, retry_after.as_deref(), &body);
        lwarn!(
            "system",
            LogStage::ExternalApi,
            LogComponent::MuralClient,
            operation,
            &format!(
                "Mural 返回错误: status={}, kind={:?}, message={err}",
                status.as_u16(),
                err.kind()
            )
        );
        err
    }

    // -----------------------------------------------------------------------
    // 账户
    // -----------------------------------------------------------------------

    /// 账户列表；上游返回裸数组时包装为 `{accounts: [...]}`
    pub async fn get_accounts(&self, on_behalf_of: Option<&str>) -> ProviderResult<AccountsResponse> {
        let body: Value = self
            .send(
                "get_accounts",
                self.request(Method::GET, "/api/accounts", on_behalf_of),
            )
            .await?;
        decode("get_accounts", wrap_accounts(body))
    }

    pub async fn get_account(
        &self,
        account_id: &str,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<Account> {
        let path = format!("/api/accounts/{}", segment(account_id));
        self.send("get_account", self.request(Method::GET, &path, on_behalf_of))
            .await
    }

    pub async fn create_account(
        &self,
        name: &str,
        description: Option<&str>,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<Account> {
        let body = CreateAccountRequest {
            name: name.to_string(),
            description: description.map(str::to_owned),
        };
        self.send(
            "create_account",
            self.request(Method::POST, "/api/accounts", on_behalf_of)
                .json(&body),
        )
        .await
    }

    /// 拉取全部账户（上游不分页，截断到 `max_items`）
    pub async fn get_all_accounts(
        &self,
        max_items: usize,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<Vec<Account>> {
        let mut accounts = self.get_accounts(on_behalf_of).await?.accounts;
        accounts.truncate(max_items);
        Ok(accounts)
    }

    // -----------------------------------------------------------------------
    // 组织
    // -----------------------------------------------------------------------

    pub async fn get_organization(&self, organization_id: &str) -> ProviderResult<Organization> {
        let path = format!("/api/organizations/{}", segment(organization_id));
        self.send("get_organization", self.request(Method::GET, &path, None))
            .await
    }

    pub async fn create_organization(
        &self,
        request: &CreateOrganizationRequest,
    ) -> ProviderResult<Organization> {
        self.send(
            "create_organization",
            self.request(Method::POST, "/api/organizations", None)
                .json(request),
        )
        .await
    }

    pub async fn get_organization_kyc_link(
        &self,
        organization_id: &str,
    ) -> ProviderResult<KycLinkResponse> {
        let path = format!("/api/organizations/{}/kyc-link", segment(organization_id));
        self.send("get_organization_kyc_link", self.request(Method::GET, &path, None))
            .await
    }

    pub async fn get_organization_tos_link(
        &self,
        organization_id: &str,
    ) -> ProviderResult<TosLinkResponse> {
        let path = format!("/api/organizations/{}/tos-link", segment(organization_id));
        self.send("get_organization_tos_link", self.request(Method::GET, &path, None))
            .await
    }

    /// 搜索组织；未给出过滤条件时发送 `{}`
    pub async fn search_organizations(
        &self,
        filter: Option<&Value>,
        limit: Option<u32>,
        next_id: Option<&str>,
    ) -> ProviderResult<Page<Organization>> {
        let empty = json!({});
        self.send(
            "search_organizations",
            self.request(Method::POST, "/api/organizations/search", None)
                .query(&page_query(limit, next_id))
                .json(filter.unwrap_or(&empty)),
        )
        .await
    }

    pub async fn get_all_organizations(
        &self,
        filter: Option<&Value>,
        max_items: usize,
    ) -> Drained<Organization> {
        drain(
            |limit, cursor| async move {
                self.search_organizations(filter, Some(limit), cursor.as_deref())
                    .await
            },
            self.options.page_size,
            max_items,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // 出金
    // -----------------------------------------------------------------------

    /// 创建出金请求
    ///
    /// 响应中 `payouts` 为非空数组时返回第一项，否则原样返回
    pub async fn create_payout_request(
        &self,
        request: &CreatePayoutRequest,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<PayoutResponse> {
        let body: Value = self
            .send(
                "create_payout_request",
                self.request(Method::POST, "/api/payouts/payout", on_behalf_of)
                    .json(request),
            )
            .await?;
        decode("create_payout_request", first_payout_or_body(body))
    }

    pub async fn get_payout_request(
        &self,
        payout_request_id: &str,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<PayoutResponse> {
        let path = format!("/api/payouts/payout/{}", segment(payout_request_id));
        self.send("get_payout_request", self.request(Method::GET, &path, on_behalf_of))
            .await
    }

    pub async fn search_payout_requests(
        &self,
        filter: &PayoutStatusFilter,
        limit: Option<u32>,
        next_id: Option<&str>,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<Page<PayoutResponse>> {
        self.send(
            "search_payout_requests",
            self.request(Method::POST, "/api/payouts/search", on_behalf_of)
                .query(&page_query(limit, next_id))
                .json(filter),
        )
        .await
    }

    pub async fn get_all_payout_requests(
        &self,
        filter: &PayoutStatusFilter,
        max_items: usize,
        on_behalf_of: Option<&str>,
    ) -> Drained<PayoutResponse> {
        drain(
            |limit, cursor| async move {
                self.search_payout_requests(filter, Some(limit), cursor.as_deref(), on_behalf_of)
                    .await
            },
            self.options.page_size,
            max_items,
        )
        .await
    }

    /// 执行出金请求，需要资金操作密钥
    pub async fn execute_payout_request(
        &self,
        payout_request_id: &str,
        on_behalf_of: &str,
    ) -> ProviderResult<PayoutResponse> {
        let path = format!("/api/payouts/payout/{}/execute", segment(payout_request_id));
        let request = self.transfer_request(TransferAction::Execute, &path, Some(on_behalf_of))?;
        self.send("execute_payout_request", request).await
    }

    /// 取消出金请求，需要资金操作密钥
    pub async fn cancel_payout_request(
        &self,
        payout_request_id: &str,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<PayoutResponse> {
        let path = format!("/api/payouts/payout/{}/cancel", segment(payout_request_id));
        let request = self.transfer_request(TransferAction::Cancel, &path, on_behalf_of)?;
        self.send("cancel_payout_request", request).await
    }

    /// 银行信息；每个币种通道作为一个重复的 `fiatCurrencyAndRail` 参数
    pub async fn get_bank_details(
        &self,
        fiat_currency_and_rail: &[String],
    ) -> ProviderResult<BankDetailsResponse> {
        let params: Vec<(&str, &str)> = fiat_currency_and_rail
            .iter()
            .map(|code| ("fiatCurrencyAndRail", code.as_str()))
            .collect();
        self.send(
            "get_bank_details",
            self.request(Method::GET, "/api/payouts/bank-details", None)
                .query(&params),
        )
        .await
    }

    pub async fn get_payout_fees_for_token_amount(
        &self,
        token_fee_requests: &[TokenFeeRequest],
    ) -> ProviderResult<FeeQuoteResponse> {
        self.send(
            "get_payout_fees_for_token_amount",
            self.request(Method::POST, "/api/payouts/fees/token-to-fiat", None)
                .json(&json!({ "tokenFeeRequests": token_fee_requests })),
        )
        .await
    }

    pub async fn get_payout_fees_for_fiat_amount(
        &self,
        fiat_fee_requests: &[FiatFeeRequest],
    ) -> ProviderResult<FeeQuoteResponse> {
        self.send(
            "get_payout_fees_for_fiat_amount",
            self.request(Method::POST, "/api/payouts/fees/fiat-to-token", None)
                .json(&json!({ "fiatFeeRequests": fiat_fee_requests })),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // 交易
    // -----------------------------------------------------------------------

    pub async fn search_transactions(
        &self,
        account_id: &str,
        limit: Option<u32>,
        next_id: Option<&str>,
        on_behalf_of: Option<&str>,
    ) -> ProviderResult<Page<Transaction>> {
        let path = format!("/api/transactions/search/account/{}", segment(account_id));
        self.send(
            "search_transactions",
            self.request(Method::POST, &path, on_behalf_of)
                .query(&page_query(limit, next_id))
                .json(&json!({})),
        )
        .await
    }

    pub async fn get_all_transactions(
        &self,
        account_id: &str,
        max_items: usize,
        on_behalf_of: Option<&str>,
    ) -> Drained<Transaction> {
        drain(
            |limit, cursor| async move {
                self.search_transactions(account_id, Some(limit), cursor.as_deref(), on_behalf_of)
                    .await
            },
            self.options.page_size,
            max_items,
        )
        .await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_id: Option<&'a str>,
}

fn page_query(limit: Option<u32>, next_id: Option<&str>) -> PageQuery<'_> {
    PageQuery {
        limit,
        next_id: next_id.filter(|id| !id.is_empty()),
    }
}

fn segment(value: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(value)
}

fn decode<T: DeserializeOwned>(operation: &str, body: Value) -> ProviderResult<T> {
    serde_json::from_value(body).map_err(|e| {
        ProviderError::Internal(format!("Failed to decode Mural response for {operation}: {e}"))
    })
}

/// 裸数组包装为 `{accounts: [...]}`，对象原样返回
#[must_use]
pub fn wrap_accounts(body: Value) -> Value {
    match body {
        Value::Array(accounts) => json!({ "accounts": accounts }),
        other => other,
    }
}

/// `payouts` 为非空数组时取第一项，否则返回原始响应
#[must_use]
pub fn first_payout_or_body(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("payouts") {
            Some(Value::Array(mut payouts)) if !payouts.is_empty() => payouts.swap_remove(0),
            Some(payouts) => {
                map.insert("payouts".to_string(), payouts);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

/// 上游错误响应映射
///
/// 400 → `BadRequest`；401/403 → `Unauthorized`；404 → `NotFound`；
/// 429 或含 `ThrottlerException` 的 500 → `RateLimited`；其余 → `Internal`
#[must_use]
pub fn map_error_response(status: StatusCode, retry_after: Option<&str>, body: &str) -> ProviderError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    let details: Vec<String> = parsed
        .get("details")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let message = if details.is_empty() {
        parsed
            .get("message")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .unwrap_or(UNKNOWN_ERROR_MESSAGE)
            .to_string()
    } else {
        details.join(", ")
    };

    let throttled = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::INTERNAL_SERVER_ERROR && body.contains(THROTTLER_MARKER));

    if throttled {
        let hint = parse_retry_after(retry_after);
        let wait = hint.unwrap_or(DEFAULT_RETRY_AFTER_SECONDS);
        return ProviderError::rate_limited(
            format!("Mural API rate limit exceeded. Retry after {wait} seconds"),
            hint,
        );
    }

    match status {
        StatusCode::BAD_REQUEST => ProviderError::BadRequest { message, details },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(message),
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        _ => ProviderError::Internal(message),
    }
}

/// 解析 `retry-after-api`，缺失或非法时为 `None`
fn parse_retry_after(value: Option<&str>) -> Option<u64> {
    value
        .map(str::trim)
        .and_then(|text| {
            text.parse::<u64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .and_then(|secs| Duration::try_from_secs_f64(secs.ceil()).ok())
                    .map(|delay| delay.as_secs())
            })
        })
}
