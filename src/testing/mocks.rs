//! # 测试 Mock 对象
//!
//! 凭证存储的 Mock 实现，用于 `ProviderFactory` 单元测试

use async_trait::async_trait;
use mockall::mock;

use crate::credentials::{CredentialRecord, CredentialStore};
use crate::error::Result;

/// Mock 凭证存储
mock! {
    pub CredentialStore {}

    #[async_trait]
    impl CredentialStore for CredentialStore {
        async fn find_one(
            &self,
            provider_type: &str,
            account_identifier: &str,
        ) -> Result<Option<CredentialRecord>>;
    }
}

/// 按 (`provider_type`, `account_identifier`) 在给定记录中查找，供 `returning` 使用
pub fn lookup_in(
    records: Vec<CredentialRecord>,
) -> impl Fn(&str, &str) -> Result<Option<CredentialRecord>> + Send + 'static {
    move |provider_type: &str, account_identifier: &str| {
        Ok(records
            .iter()
            .find(|r| r.provider_type == provider_type && r.account_identifier == account_identifier)
            .cloned())
    }
}
