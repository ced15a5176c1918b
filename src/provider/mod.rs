//! # Mural Provider 模块
//!
//! - `factory`：按租户解析凭证并缓存客户端
//! - `client`：绑定单个租户凭证的 Mural API 客户端
//! - `pagination`：游标分页拉取
//! - `retry`：调用方限流重试策略
//! - `types`：请求/响应模型

mod client;
mod factory;
pub mod pagination;
pub mod retry;
pub mod types;

pub use client::{
    ClientOptions, MuralCredentials, MuralProvider, ON_BEHALF_OF_HEADER, RETRY_AFTER_API_HEADER,
    TRANSFER_API_KEY_HEADER, first_payout_or_body, map_error_response, wrap_accounts,
};
pub use factory::{CachedProviderInfo, DEFAULT_CACHE_TTL, MURAL_PROVIDER_TYPE, ProviderFactory};
pub use pagination::{DEFAULT_MAX_ITEMS, DEFAULT_PAGE_SIZE, Drained, drain};
pub use retry::RetryPolicy;
