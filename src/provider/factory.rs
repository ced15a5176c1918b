//! # Provider 工厂
//!
//! 按租户解析凭证并缓存已初始化的 [`MuralProvider`]。缓存条目在 TTL 内直接复用，
//! 过期后重新读取凭证并整体替换。并发未命中时可能重复构造，最后写入者生效。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::client::{ClientOptions, MuralCredentials, MuralProvider};
use crate::config::ProviderConfig;
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::error::{ProviderError, ProviderResult};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// 默认缓存有效期：5 分钟
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// 默认凭证类型
pub const MURAL_PROVIDER_TYPE: &str = "mural";

#[derive(Debug, Clone)]
struct CacheEntry {
    provider: Arc<MuralProvider>,
    created_at: Instant,
    credential_expiry: Option<DateTime<Utc>>,
}

/// 缓存条目概览（管理接口使用）
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedProviderInfo {
    pub account_identifier: String,
    pub base_url: String,
    pub age_seconds: u64,
    pub stale: bool,
}

/// Provider 工厂
pub struct ProviderFactory {
    store: Arc<dyn CredentialStore>,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
    provider_type: String,
    client_options: ClientOptions,
}

impl ProviderFactory {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            ttl: DEFAULT_CACHE_TTL,
            provider_type: MURAL_PROVIDER_TYPE.to_string(),
            client_options: ClientOptions::default(),
        }
    }

    /// 按 `[provider]` 配置构造
    #[must_use]
    pub fn from_config(store: Arc<dyn CredentialStore>, config: &ProviderConfig) -> Self {
        Self::new(store)
            .with_ttl(config.cache_ttl())
            .with_provider_type(config.provider_type.clone())
            .with_client_options(ClientOptions {
                request_timeout: config.request_timeout(),
                page_size: config.page_size,
            })
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_type = provider_type.into();
        self
    }

    #[must_use]
    pub const fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.client_options = options;
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 解析租户对应的客户端
    pub async fn resolve(&self, account_identifier: &str) -> ProviderResult<Arc<MuralProvider>> {
        if account_identifier.trim().is_empty() {
            return Err(ProviderError::bad_request("accountIdentifier is required"));
        }

        if let Some(provider) = self.cached(account_identifier)? {
            return Ok(provider);
        }

        let record = self
            .store
            .find_one(&self.provider_type, account_identifier)
            .await
            .map_err(|e| {
                ProviderError::Internal(format!(
                    "Failed to load Mural credentials for account {account_identifier}: {e}"
                ))
            })?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "No Mural credentials found for account {account_identifier}"
                ))
            })?;

        let credentials = Self::validate(&record, account_identifier)?;
        let provider = Arc::new(MuralProvider::new(credentials, self.client_options)?);

        self.cache.insert(
            account_identifier.to_string(),
            CacheEntry {
                provider: Arc::clone(&provider),
                created_at: Instant::now(),
                credential_expiry: record.expiry_date,
            },
        );

        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::ProviderFactory,
            "resolve",
            &format!(
                "已为租户初始化 Mural 客户端: account={account_identifier}, base_url={}",
                provider.base_url()
            )
        );

        Ok(provider)
    }

    /// 查询缓存；凭证在缓存期间过期时直接拒绝
    fn cached(&self, account_identifier: &str) -> ProviderResult<Option<Arc<MuralProvider>>> {
        let Some(entry) = self
            .cache
            .get(account_identifier)
            .map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };

        if entry.credential_expiry.is_some_and(|expiry| expiry < Utc::now()) {
            self.cache.remove(account_identifier);
            return Err(expired_error(account_identifier));
        }

        if entry.created_at.elapsed() < self.ttl {
            ldebug!(
                "system",
                LogStage::Cache,
                LogComponent::ProviderFactory,
                "cache_hit",
                &format!("命中客户端缓存: account={account_identifier}")
            );
            return Ok(Some(entry.provider));
        }

        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::ProviderFactory,
            "cache_stale",
            &format!("客户端缓存已过期，重新加载凭证: account={account_identifier}")
        );
        Ok(None)
    }

    fn validate(
        record: &CredentialRecord,
        account_identifier: &str,
    ) -> ProviderResult<MuralCredentials> {
        let fields = &record.credentials;
        let base_url = fields.base_url.as_deref().map(str::trim).unwrap_or_default();
        let api_key = fields.api_key.as_deref().map(str::trim).unwrap_or_default();

        if base_url.is_empty() || api_key.is_empty() {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::ProviderFactory,
                "validate_credentials",
                &format!("凭证缺少 baseUrl 或 apiKey: account={account_identifier}")
            );
            return Err(ProviderError::NotFound(format!(
                "Invalid Mural credentials for account {account_identifier}"
            )));
        }

        if record.is_expired_at(Utc::now()) {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::ProviderFactory,
                "validate_credentials",
                &format!("凭证已过期: account={account_identifier}")
            );
            return Err(expired_error(account_identifier));
        }

        Ok(MuralCredentials {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            transfer_api_key: fields.transfer_api_key.clone(),
        })
    }

    /// 清除指定租户或全部缓存，返回清除的条目数
    pub fn invalidate(&self, account_identifier: Option<&str>) -> usize {
        let removed = match account_identifier {
            Some(key) => usize::from(self.cache.remove(key).is_some()),
            None => {
                let count = self.cache.len();
                self.cache.clear();
                count
            }
        };

        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::ProviderFactory,
            "invalidate",
            &format!(
                "清除客户端缓存: account={}, removed={removed}",
                account_identifier.unwrap_or("*")
            )
        );

        removed
    }

    /// 当前缓存的租户
    #[must_use]
    pub fn cached_accounts(&self) -> Vec<CachedProviderInfo> {
        let mut accounts: Vec<CachedProviderInfo> = self
            .cache
            .iter()
            .map(|entry| {
                let age = entry.created_at.elapsed();
                CachedProviderInfo {
                    account_identifier: entry.key().clone(),
                    base_url: entry.provider.base_url().to_string(),
                    age_seconds: age.as_secs(),
                    stale: age >= self.ttl,
                }
            })
            .collect();
        accounts.sort_by(|a, b| a.account_identifier.cmp(&b.account_identifier));
        accounts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn expired_error(account_identifier: &str) -> ProviderError {
    ProviderError::Forbidden(format!(
        "Mural credentials for account {account_identifier} have expired. Please update your credentials."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use crate::testing::{CredentialFixture, MockCredentialStore, lookup_in};
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    fn factory(store: MockCredentialStore) -> ProviderFactory {
        ProviderFactory::new(Arc::new(store))
    }

    /// 期望被查询 `times` 次、返回给定记录的存储
    fn store_with(records: Vec<CredentialRecord>, times: usize) -> MockCredentialStore {
        let mut store = MockCredentialStore::new();
        store
            .expect_find_one()
            .times(times)
            .returning(lookup_in(records));
        store
    }

    #[tokio::test]
    async fn test_resolve_uses_cache_within_ttl() {
        let factory = factory(store_with(vec![CredentialFixture::new("acme").build()], 1));

        let first = factory.resolve("acme").await.unwrap();
        let second = factory.resolve("acme").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.base_url(), "https://api.example.com");
    }

    #[tokio::test]
    async fn test_resolve_refetches_after_ttl() {
        let factory = factory(store_with(vec![CredentialFixture::new("acme").build()], 2))
            .with_ttl(Duration::from_millis(20));

        let first = factory.resolve("acme").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let second = factory.resolve("acme").await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_credentials_are_forbidden() {
        let expired = CredentialFixture::new("acme")
            .expiry(Utc::now() - ChronoDuration::minutes(5))
            .build();
        let factory = factory(store_with(vec![expired], 2));

        for _ in 0..2 {
            let err = factory.resolve("acme").await.unwrap_err();
            assert!(matches!(err, ProviderError::Forbidden(ref msg) if msg.contains("acme")));
        }
        assert!(factory.is_empty());
    }

    #[tokio::test]
    async fn test_credentials_expiring_while_cached_are_forbidden() {
        let expiring = CredentialFixture::new("acme")
            .expiry(Utc::now() + ChronoDuration::milliseconds(30))
            .build();
        let factory = factory(store_with(vec![expiring], 1));

        factory.resolve("acme").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let err = factory.resolve("acme").await.unwrap_err();
        assert!(matches!(err, ProviderError::Forbidden(_)));
        assert!(factory.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_name_the_tenant() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find_one()
            .withf(|provider_type, account| provider_type == "mural" && account == "globex")
            .times(1)
            .returning(|_, _| Ok(None));

        let err = factory(store).resolve("globex").await.unwrap_err();

        assert_eq!(
            err,
            ProviderError::NotFound("No Mural credentials found for account globex".into())
        );
    }

    #[tokio::test]
    async fn test_incomplete_credentials_are_invalid() {
        let incomplete = CredentialFixture::new("acme").api_key("").build();
        let err = factory(store_with(vec![incomplete], 1))
            .resolve("acme")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProviderError::NotFound("Invalid Mural credentials for account acme".into())
        );
    }

    #[tokio::test]
    async fn test_empty_account_identifier_is_rejected() {
        let mut store = MockCredentialStore::new();
        store.expect_find_one().never();

        let err = factory(store).resolve("  ").await.unwrap_err();

        assert!(matches!(err, ProviderError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_store_failure_is_internal() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find_one()
            .times(1)
            .returning(|_, _| Err(ProxyError::database("connection refused")));

        let err = factory(store).resolve("acme").await.unwrap_err();

        assert!(matches!(err, ProviderError::Internal(_)));
    }

    #[tokio::test]
    async fn test_invalidate_one_and_all() {
        let records = vec![
            CredentialFixture::new("acme").build(),
            CredentialFixture::new("globex").build(),
        ];
        let factory = factory(store_with(records, 3));
        factory.resolve("acme").await.unwrap();
        factory.resolve("globex").await.unwrap();

        assert_eq!(factory.invalidate(Some("acme")), 1);
        assert_eq!(factory.invalidate(Some("acme")), 0);
        assert_eq!(
            factory
                .cached_accounts()
                .into_iter()
                .map(|info| info.account_identifier)
                .collect::<Vec<_>>(),
            vec!["globex".to_string()]
        );

        factory.resolve("acme").await.unwrap();

        assert_eq!(factory.invalidate(None), 2);
        assert!(factory.is_empty());
    }

    #[test]
    fn test_from_config_applies_provider_section() {
        let config = ProviderConfig {
            cache_ttl_seconds: 7,
            ..ProviderConfig::default()
        };
        let factory = ProviderFactory::from_config(Arc::new(MockCredentialStore::new()), &config);
        assert_eq!(factory.ttl(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_concurrent_resolution_of_many_tenants() {
        let accounts = ["acme", "globex", "initech"];
        let records = accounts
            .iter()
            .map(|account| CredentialFixture::new(account).build())
            .collect();
        let mut store = MockCredentialStore::new();
        // 并发未命中可能重复读取存储
        store
            .expect_find_one()
            .times(3..=6)
            .returning(lookup_in(records));
        let factory = factory(store);

        let resolved = futures::future::join_all(
            accounts
                .iter()
                .chain(accounts.iter())
                .map(|account| factory.resolve(account)),
        )
        .await;

        assert!(resolved.iter().all(Result::is_ok));
        assert_eq!(factory.len(), 3);
    }

    #[tokio::test]
    async fn test_separate_factories_do_not_share_cache() {
        let store: Arc<dyn CredentialStore> =
            Arc::new(store_with(vec![CredentialFixture::new("acme").build()], 2));

        ProviderFactory::new(Arc::clone(&store))
            .resolve("acme")
            .await
            .unwrap();
        ProviderFactory::new(store).resolve("acme").await.unwrap();
    }
}
