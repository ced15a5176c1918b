//! # 测试数据 Fixtures

use chrono::{DateTime, Utc};
use entity::integration_credentials::CredentialFields;

use crate::credentials::CredentialRecord;

/// 凭证记录构建器
pub struct CredentialFixture {
    account_identifier: String,
    base_url: String,
    api_key: String,
    transfer_api_key: Option<String>,
    expiry_date: Option<DateTime<Utc>>,
}

impl CredentialFixture {
    /// 默认指向 `https://api.example.com`，`apiKey` 为 `k1`
    #[must_use]
    pub fn new(account_identifier: &str) -> Self {
        Self {
            account_identifier: account_identifier.to_string(),
            base_url: "https://api.example.com".to_string(),
            api_key: "k1".to_string(),
            transfer_api_key: None,
            expiry_date: None,
        }
    }

    #[must_use]
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: &str) -> Self {
        self.api_key = api_key.to_string();
        self
    }

    #[must_use]
    pub fn transfer_api_key(mut self, key: &str) -> Self {
        self.transfer_api_key = Some(key.to_string());
        self
    }

    #[must_use]
    pub const fn expiry(mut self, expiry_date: DateTime<Utc>) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }

    #[must_use]
    pub fn build(self) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord {
            id: 1,
            provider_type: "mural".to_string(),
            account_identifier: self.account_identifier,
            credentials: CredentialFields {
                base_url: Some(self.base_url),
                api_key: Some(self.api_key),
                transfer_api_key: self.transfer_api_key,
                extra: serde_json::Map::new(),
            },
            expiry_date: self.expiry_date,
            version: "1".to_string(),
            automatic_update: false,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}
