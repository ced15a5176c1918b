//! # 配置管理模块
//!
//! 处理应用配置加载和验证

mod app_config;
mod database;

pub use app_config::{
    AppConfig, AuthConfig, LoggingConfig, ProviderConfig, RetryConfig, ServerConfig,
};
pub use database::DatabaseConfig;

use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::linfo;
use std::env;
use std::path::{Path, PathBuf};

/// 默认配置文件路径：`config/config.{RUST_ENV}.toml`
#[must_use]
pub fn default_config_path() -> PathBuf {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载配置文件
///
/// 未指定路径时使用 [`default_config_path`]
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_file = path.map_or_else(default_config_path, Path::to_path_buf);

    if !config_file.exists() {
        return Err(ProxyError::config(format!(
            "配置文件不存在: {}",
            config_file.display()
        )));
    }

    let config_content = std::fs::read_to_string(&config_file).map_err(|e| {
        ProxyError::config_with_source(format!("读取配置文件失败: {}", config_file.display()), e)
    })?;

    let config = parse_config(&config_content)?;

    linfo!(
        "system",
        LogStage::Configuration,
        LogComponent::Config,
        "load_config",
        &format!("配置加载成功: {}", config_file.display())
    );

    Ok(config)
}

/// 解析并验证 TOML 配置内容
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate().map_err(ProxyError::config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8088

        [database]
        url = "sqlite::memory:"

        [provider]
        cache_ttl_seconds = 60

        [auth]
        jwt_secret = "secret"
    "#;

    #[test]
    fn test_parse_config_fills_defaults() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.server.bind_address(), "127.0.0.1:8088");
        assert_eq!(config.server.api_prefix, "/api");
        assert_eq!(config.provider.cache_ttl_seconds, 60);
        assert_eq!(config.provider.request_timeout_seconds, 30);
        assert_eq!(config.provider.page_size, 100);
        assert_eq!(config.provider.max_items, 1000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.max_backoff_ms, 30_000);
        assert!(config.auth.enabled);
        assert!(config.database.is_memory_database());
    }

    #[test]
    fn test_parse_config_rejects_missing_secret() {
        let err = parse_config("[auth]\nenabled = true\n").unwrap_err();
        assert!(err.to_string().contains("JWT secret"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.auth.enabled = false;
        assert!(config.validate().is_ok());

        config.provider.cache_ttl_seconds = 0;
        assert!(config.validate().is_err());

        config.provider.cache_ttl_seconds = 300;
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        config.retry.max_attempts = 3;
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dev_config_file_is_valid() {
        let config = load_config(Some(Path::new("config/config.dev.toml"))).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.issuer.as_deref(), Some("mural-proxy"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("config/does-not-exist.toml"))).unwrap_err();
        assert!(matches!(err, ProxyError::Config { .. }));
    }
}
