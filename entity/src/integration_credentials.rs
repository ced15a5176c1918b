//! # 集成凭证实体定义
//!
//! 每个 (`provider_type`, `account_identifier`) 对应一条上游服务凭证记录

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 集成凭证实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "integration_credentials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub provider_type: String,
    pub account_identifier: String,
    /// 凭证内容 JSON 字符串：{ baseUrl, apiKey, transferApiKey?, ... }
    #[sea_orm(column_type = "Text")]
    pub credentials_json: String,
    pub expiry_date: Option<DateTime>,
    pub version: String,
    pub automatic_update: bool,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// 凭证字段
///
/// 已知字段单独解析，其余字段保留在 `extra` 中以兼容不同 provider 的需求。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_api_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Model {
    /// 解析凭证 JSON
    pub fn get_credentials(&self) -> Result<CredentialFields, serde_json::Error> {
        serde_json::from_str(&self.credentials_json)
    }
}
