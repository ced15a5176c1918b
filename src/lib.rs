//! # Mural Proxy
//!
//! 多租户 Mural Pay API 代理核心库：按租户解析凭证、缓存客户端、
//! 统一错误映射、分页拉取与限流重试

pub mod logging;

pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod management;
pub mod provider;
pub mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProviderError, ProxyError, Result};
