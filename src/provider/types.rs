//! # Mural 接口数据结构
//!
//! 请求体使用强类型；响应体只解析调用方关心的字段，其余字段保存在 `extra` 中原样透传

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// 通用
// ---------------------------------------------------------------------------

/// 代币金额
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub token_amount: f64,
    pub token_symbol: String,
}

/// 法币金额
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatAmount {
    pub fiat_amount: f64,
    pub fiat_currency_code: String,
}

/// 实体地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalAddress {
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zip: String,
}

/// 游标分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,
    #[serde(default)]
    pub total: u64,
}

impl<T> Page<T> {
    /// 下一页游标，空字符串视为没有下一页
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.next_id.as_deref().filter(|id| !id.is_empty())
    }
}

// ---------------------------------------------------------------------------
// 账户
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_api_enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 账户列表，始终是对象形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// 组织
// ---------------------------------------------------------------------------

/// 创建组织请求，按 `type` 区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum CreateOrganizationRequest {
    Individual {
        first_name: String,
        last_name: String,
        email: String,
    },
    Business {
        business_name: String,
    },
    DelegatedKycBusiness {
        physical_address: PhysicalAddress,
        email: String,
        tax_id: String,
        /// yyyy-MM-dd
        formation_date: String,
        business_name: String,
    },
    DelegatedKycIndividual {
        physical_address: PhysicalAddress,
        first_name: String,
        last_name: String,
        email: String,
        phone_number: String,
        tax_id: String,
        /// yyyy-MM-dd
        date_of_birth: String,
        /// ISO 3166-1 alpha-3
        nationality: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub organization_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycLinkResponse {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TosLinkResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos_link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// 出金
// ---------------------------------------------------------------------------

/// 单个收款明细，收款方与出金方式原样透传
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutItem {
    pub amount: TokenAmount,
    pub payout_details: Value,
    pub recipient_info: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting_details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutRequest {
    pub source_account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub payouts: Vec<PayoutItem>,
}

/// 出金请求。上游在不同接口下返回的形状不完全一致，因此所有已知字段都是可选的
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    AwaitingExecution,
    Canceled,
    Pending,
    Executed,
    Failed,
}

/// 出金搜索过滤条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutStatusFilter {
    #[serde(rename = "type", default = "payout_status_filter_type")]
    pub filter_type: String,
    #[serde(default)]
    pub statuses: Vec<PayoutStatus>,
}

fn payout_status_filter_type() -> String {
    "payoutStatus".to_string()
}

impl PayoutStatusFilter {
    #[must_use]
    pub fn new(statuses: Vec<PayoutStatus>) -> Self {
        Self {
            filter_type: payout_status_filter_type(),
            statuses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankNames {
    #[serde(default)]
    pub bank_names: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetailsResponse {
    #[serde(default)]
    pub bank_details: BTreeMap<String, BankNames>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// 费用报价
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenFeeRequest {
    pub amount: TokenAmount,
    pub fiat_and_rail_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatFeeRequest {
    pub fiat_amount: f64,
    pub token_symbol: String,
    pub fiat_and_rail_code: String,
}

/// 单条费用报价：成功或失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeeQuote {
    Success {
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    Error {
        message: String,
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
}

impl FeeQuote {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// 费用接口可能返回单条或多条报价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeeQuoteResponse {
    Many(Vec<FeeQuote>),
    One(FeeQuote),
}

// ---------------------------------------------------------------------------
// 交易
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
