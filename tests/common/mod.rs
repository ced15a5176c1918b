//! 集成测试共用工具
#![allow(dead_code)]

use entity::integration_credentials::CredentialFields;
use mural_proxy::config::DatabaseConfig;
use mural_proxy::credentials::CreateCredentialRequest;
use mural_proxy::database::{init_database, run_migrations};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// 已完成迁移的内存数据库
pub async fn memory_db() -> Arc<DatabaseConnection> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    let db = init_database(&config).await.expect("数据库连接失败");
    run_migrations(&db).await.expect("数据库迁移失败");
    Arc::new(db)
}

/// Mural 凭证创建请求
pub fn credential_request(account_identifier: &str, base_url: &str) -> CreateCredentialRequest {
    CreateCredentialRequest {
        provider_type: "mural".to_string(),
        account_identifier: account_identifier.to_string(),
        credentials: CredentialFields {
            base_url: Some(base_url.to_string()),
            api_key: Some("k1".to_string()),
            transfer_api_key: None,
            extra: serde_json::Map::new(),
        },
        expiry_date: None,
        version: None,
        automatic_update: false,
    }
}
