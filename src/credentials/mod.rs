//! # 集成凭证模块
//!
//! 凭证存储的查询接口（供 `ProviderFactory` 使用）以及管理端 CRUD 所需的数据结构

mod store;

pub use store::SeaOrmCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::integration_credentials::{self, CredentialFields};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::lwarn;

/// 凭证存储查询接口
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 按 (`provider_type`, `account_identifier`) 查找唯一凭证
    async fn find_one(
        &self,
        provider_type: &str,
        account_identifier: &str,
    ) -> Result<Option<CredentialRecord>>;
}

/// 凭证记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: i32,
    pub provider_type: String,
    pub account_identifier: String,
    pub credentials: CredentialFields,
    pub expiry_date: Option<DateTime<Utc>>,
    pub version: String,
    pub automatic_update: bool,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// 凭证在给定时间点是否已过期
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < now)
    }
}

impl From<integration_credentials::Model> for CredentialRecord {
    fn from(model: integration_credentials::Model) -> Self {
        // 无法解析的凭证视为空凭证，由调用方按“无效凭证”处理
        let credentials = model.get_credentials().unwrap_or_else(|e| {
            lwarn!(
                "system",
                LogStage::Db,
                LogComponent::Credentials,
                "parse_credentials",
                &format!(
                    "凭证 JSON 解析失败: id={}, account={}, error={e}",
                    model.id, model.account_identifier
                )
            );
            CredentialFields::default()
        });

        Self {
            id: model.id,
            provider_type: model.provider_type,
            account_identifier: model.account_identifier,
            credentials,
            expiry_date: model.expiry_date.map(|d| d.and_utc()),
            version: model.version,
            automatic_update: model.automatic_update,
            created_by: model.created_by,
            updated_by: model.updated_by,
            created_at: model.created_at.and_utc(),
            updated_at: model.updated_at.and_utc(),
        }
    }
}

/// 列表/计数过滤条件
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFilter {
    pub provider_type: Option<String>,
    pub account_identifier: Option<String>,
}

/// 创建凭证请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialRequest {
    #[serde(default = "default_provider_type")]
    pub provider_type: String,
    pub account_identifier: String,
    pub credentials: CredentialFields,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub automatic_update: bool,
}

/// 更新凭证请求
///
/// `expiryDate: null` 清除过期时间；缺省表示不修改
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredentialRequest {
    #[serde(default)]
    pub credentials: Option<CredentialFields>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub expiry_date: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub automatic_update: Option<bool>,
}

fn default_provider_type() -> String {
    "mural".to_string()
}

fn deserialize_some<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// 管理端返回的凭证视图（密钥脱敏）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    pub id: i32,
    pub provider_type: String,
    pub account_identifier: String,
    pub credentials: CredentialFields,
    pub expiry_date: Option<DateTime<Utc>>,
    pub version: String,
    pub automatic_update: bool,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CredentialRecord> for CredentialView {
    fn from(record: CredentialRecord) -> Self {
        let mut credentials = record.credentials;
        credentials.api_key = credentials.api_key.as_deref().map(mask_secret);
        credentials.transfer_api_key = credentials.transfer_api_key.as_deref().map(mask_secret);

        Self {
            id: record.id,
            provider_type: record.provider_type,
            account_identifier: record.account_identifier,
            credentials,
            expiry_date: record.expiry_date,
            version: record.version,
            automatic_update: record.automatic_update,
            created_by: record.created_by,
            updated_by: record.updated_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// 只保留末尾 4 位
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("sk-live-123456"), "****3456");
    }

    #[test]
    fn test_update_request_distinguishes_null_expiry() {
        let cleared: UpdateCredentialRequest =
            serde_json::from_str(r#"{"expiryDate": null}"#).unwrap();
        assert_eq!(cleared.expiry_date, Some(None));

        let untouched: UpdateCredentialRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.expiry_date, None);
    }

    #[test]
    fn test_create_request_defaults_provider_type() {
        let req: CreateCredentialRequest = serde_json::from_str(
            r#"{"accountIdentifier":"acme","credentials":{"baseUrl":"https://x","apiKey":"k"}}"#,
        )
        .unwrap();
        assert_eq!(req.provider_type, "mural");
        assert!(!req.automatic_update);
    }

    #[test]
    fn test_record_expiry() {
        let now = Utc::now();
        let record = CredentialRecord {
            id: 1,
            provider_type: "mural".into(),
            account_identifier: "acme".into(),
            credentials: CredentialFields::default(),
            expiry_date: Some(now - Duration::seconds(1)),
            version: "1".into(),
            automatic_update: false,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        assert!(record.is_expired_at(now));

        let view = CredentialView::from(record);
        assert_eq!(view.account_identifier, "acme");
    }
}
