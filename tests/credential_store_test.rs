//! # 凭证存储集成测试
//!
//! 内存 SQLite 上的增删改查与查询接口

mod common;

use chrono::{Duration, Utc};
use entity::integration_credentials::CredentialFields;
use mural_proxy::ProxyError;
use mural_proxy::credentials::{
    CredentialFilter, CredentialStore, SeaOrmCredentialStore, UpdateCredentialRequest,
};
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

use common::{credential_request, memory_db};

#[tokio::test]
async fn test_create_and_find_one() {
    let store = SeaOrmCredentialStore::new(memory_db().await);

    let created = store
        .create(
            credential_request("acme", "https://api.mural.test"),
            Some("ops".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(created.created_by.as_deref(), Some("ops"));
    assert_eq!(created.version, "1");

    let found = store.find_one("mural", "acme").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(
        found.credentials.base_url.as_deref(),
        Some("https://api.mural.test")
    );
    assert_eq!(found.credentials.api_key.as_deref(), Some("k1"));

    assert!(store.find_one("mural", "globex").await.unwrap().is_none());
    assert!(store.find_one("stripe", "acme").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_rejects_duplicates_and_blank_accounts() {
    let store = SeaOrmCredentialStore::new(memory_db().await);
    store
        .create(credential_request("acme", "https://a"), None)
        .await
        .unwrap();

    let duplicate = assert_err!(
        store
            .create(credential_request("acme", "https://b"), None)
            .await
    );
    assert!(matches!(duplicate, ProxyError::Validation { .. }));

    let blank = assert_err!(
        store
            .create(credential_request("  ", "https://b"), None)
            .await
    );
    assert!(matches!(blank, ProxyError::Validation { .. }));

    assert_ok!(
        store
            .create(credential_request("globex", "https://b"), None)
            .await
    );
}

#[tokio::test]
async fn test_list_and_count_with_filters() {
    let store = SeaOrmCredentialStore::new(memory_db().await);
    for account in ["acme", "globex", "initech"] {
        store
            .create(credential_request(account, "https://a"), None)
            .await
            .unwrap();
    }

    let all = store.list(&CredentialFilter::default()).await.unwrap();
    assert_eq!(
        all.iter()
            .map(|r| r.account_identifier.as_str())
            .collect::<Vec<_>>(),
        vec!["acme", "globex", "initech"]
    );

    let filter = CredentialFilter {
        provider_type: Some("mural".to_string()),
        account_identifier: Some("globex".to_string()),
    };
    assert_eq!(store.count(&filter).await.unwrap(), 1);
    assert_eq!(store.count(&CredentialFilter::default()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_update_sets_and_clears_expiry() {
    let store = SeaOrmCredentialStore::new(memory_db().await);
    let created = store
        .create(credential_request("acme", "https://a"), None)
        .await
        .unwrap();

    let expiry = Utc::now() - Duration::hours(1);
    let updated = store
        .update(
            created.id,
            UpdateCredentialRequest {
                credentials: Some(CredentialFields {
                    base_url: Some("https://b".to_string()),
                    api_key: Some("k2".to_string()),
                    transfer_api_key: Some("tk".to_string()),
                    extra: serde_json::Map::new(),
                }),
                expiry_date: Some(Some(expiry)),
                version: Some("2".to_string()),
                automatic_update: None,
            },
            Some("admin".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(updated.version, "2");
    assert_eq!(updated.updated_by.as_deref(), Some("admin"));
    assert_eq!(updated.credentials.transfer_api_key.as_deref(), Some("tk"));
    assert!(updated.is_expired_at(Utc::now()));

    let cleared = store
        .update(
            created.id,
            UpdateCredentialRequest {
                expiry_date: Some(None),
                ..UpdateCredentialRequest::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(cleared.expiry_date, None);
    assert_eq!(cleared.credentials.api_key.as_deref(), Some("k2"));
}

#[tokio::test]
async fn test_get_and_delete_missing_rows() {
    let store = SeaOrmCredentialStore::new(memory_db().await);
    let created = store
        .create(credential_request("acme", "https://a"), None)
        .await
        .unwrap();

    let deleted = store.delete(created.id).await.unwrap();
    assert_eq!(deleted.account_identifier, "acme");

    assert!(matches!(
        store.get(created.id).await.unwrap_err(),
        ProxyError::NotFound { .. }
    ));
    assert!(matches!(
        store.delete(created.id).await.unwrap_err(),
        ProxyError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_replace_overwrites_fields_and_keeps_creator() {
    let store = SeaOrmCredentialStore::new(memory_db().await);
    let original = store
        .create(credential_request("acme", "https://a"), Some("ops".to_string()))
        .await
        .unwrap();

    let mut replacement = credential_request("acme-eu", "https://b");
    replacement.version = Some("2".to_string());
    let (previous, replaced) = store
        .replace(original.id, replacement, Some("admin".to_string()))
        .await
        .unwrap();

    assert_eq!(previous, "acme");
    assert_eq!(replaced.id, original.id);
    assert_eq!(replaced.account_identifier, "acme-eu");
    assert_eq!(replaced.version, "2");
    assert_eq!(replaced.created_by.as_deref(), Some("ops"));
    assert_eq!(replaced.updated_by.as_deref(), Some("admin"));
    assert!(store.find_one("mural", "acme").await.unwrap().is_none());
    assert_eq!(
        store
            .find_one("mural", "acme-eu")
            .await
            .unwrap()
            .and_then(|record| record.credentials.base_url),
        Some("https://b".to_string())
    );
}

#[tokio::test]
async fn test_replace_rejects_taken_account_and_unknown_id() {
    let store = SeaOrmCredentialStore::new(memory_db().await);
    let acme = store
        .create(credential_request("acme", "https://a"), None)
        .await
        .unwrap();
    store
        .create(credential_request("globex", "https://b"), None)
        .await
        .unwrap();

    let taken = assert_err!(
        store
            .replace(acme.id, credential_request("globex", "https://c"), None)
            .await
    );
    assert!(matches!(taken, ProxyError::Validation { .. }));

    let missing = assert_err!(
        store
            .replace(999, credential_request("initech", "https://c"), None)
            .await
    );
    assert!(matches!(missing, ProxyError::NotFound { .. }));

    // 保持自身账户标识不算冲突
    assert_ok!(
        store
            .replace(acme.id, credential_request("acme", "https://d"), None)
            .await
    );
}

#[tokio::test]
async fn test_update_all_applies_to_filtered_rows() {
    let store = SeaOrmCredentialStore::new(memory_db().await);
    for account in ["acme", "globex"] {
        store
            .create(credential_request(account, "https://a"), None)
            .await
            .unwrap();
    }
    let mut other = credential_request("acme", "https://s");
    other.provider_type = "stripe".to_string();
    store.create(other, None).await.unwrap();

    let filter = CredentialFilter {
        provider_type: Some("mural".to_string()),
        account_identifier: None,
    };
    let request = UpdateCredentialRequest {
        automatic_update: Some(true),
        ..UpdateCredentialRequest::default()
    };
    let updated = store
        .update_all(&filter, request, Some("ops".to_string()))
        .await
        .unwrap();

    assert_eq!(updated.len(), 2);
    assert!(updated.iter().all(|record| record.automatic_update));
    let untouched = store.find_one("stripe", "acme").await.unwrap().unwrap();
    assert!(!untouched.automatic_update);
}
