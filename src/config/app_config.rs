//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DatabaseConfig;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 上游服务商配置
    pub provider: ProviderConfig,
    /// 调用方重试配置
    pub retry: RetryConfig,
    /// 认证配置
    pub auth: AuthConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 所有路由的前缀
    pub api_prefix: String,
    /// 允许的跨域来源，为空表示允许任意来源
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_prefix: "/api".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// 监听地址
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 上游服务商配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// 凭证表中的 `provider_type`
    pub provider_type: String,
    /// 客户端缓存有效期（秒）
    pub cache_ttl_seconds: u64,
    /// 单次上游请求超时（秒）
    pub request_timeout_seconds: u64,
    /// 分页拉取时的每页大小
    pub page_size: u32,
    /// 分页拉取的最大条目数
    pub max_items: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: "mural".to_string(),
            cache_ttl_seconds: 300,
            request_timeout_seconds: 30,
            page_size: 100,
            max_items: 1000,
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// 调用方重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            max_jitter_ms: 1000,
        }
    }
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 关闭后所有请求以匿名身份通过
    pub enabled: bool,
    /// HS256 签名密钥
    pub jwt_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret: String::new(),
            issuer: None,
            audience: None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }
        if !self.server.api_prefix.is_empty() && !self.server.api_prefix.starts_with('/') {
            return Err(format!(
                "API prefix must start with '/': {}",
                self.server.api_prefix
            ));
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max connections must be greater than 0".to_string());
        }

        if self.provider.provider_type.is_empty() {
            return Err("Provider type cannot be empty".to_string());
        }
        if self.provider.cache_ttl_seconds == 0 {
            return Err("Provider cache TTL must be greater than 0".to_string());
        }
        if self.provider.request_timeout_seconds == 0 {
            return Err("Provider request timeout must be greater than 0".to_string());
        }
        if self.provider.page_size == 0 || self.provider.max_items == 0 {
            return Err("Pagination page size and max items must be greater than 0".to_string());
        }

        if self.retry.max_attempts == 0 {
            return Err("Retry max attempts must be greater than 0".to_string());
        }

        if self.auth.enabled && self.auth.jwt_secret.is_empty() {
            return Err("JWT secret is required when auth is enabled".to_string());
        }

        Ok(())
    }
}
