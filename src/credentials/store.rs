//! # 基于 sea-orm 的凭证存储

use async_trait::async_trait;
use chrono::Utc;
use entity::integration_credentials::{self, Entity as IntegrationCredentials};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use std::sync::Arc;

use super::{
    CreateCredentialRequest, CredentialFilter, CredentialRecord, CredentialStore,
    UpdateCredentialRequest,
};
use crate::error::{Context, ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};

const RESOURCE: &str = "integration_credential";

/// `integration_credentials` 表上的凭证存储
#[derive(Clone)]
pub struct SeaOrmCredentialStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCredentialStore {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn filtered(filter: &CredentialFilter) -> Select<IntegrationCredentials> {
        let mut query = IntegrationCredentials::find();
        if let Some(provider_type) = &filter.provider_type {
            query = query.filter(integration_credentials::Column::ProviderType.eq(provider_type));
        }
        if let Some(account) = &filter.account_identifier {
            query = query.filter(integration_credentials::Column::AccountIdentifier.eq(account));
        }
        query
    }

    async fn find_model(&self, id: i32) -> Result<integration_credentials::Model> {
        IntegrationCredentials::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ProxyError::not_found(RESOURCE, id.to_string()))
    }

    /// 创建凭证
    pub async fn create(
        &self,
        request: CreateCredentialRequest,
        created_by: Option<String>,
    ) -> Result<CredentialRecord> {
        validate_account_identifier(&request.account_identifier)?;

        if self
            .find_one(&request.provider_type, &request.account_identifier)
            .await?
            .is_some()
        {
            return Err(ProxyError::validation(format!(
                "凭证已存在: provider_type={}, account_identifier={}",
                request.provider_type, request.account_identifier
            )));
        }

        let now = Utc::now().naive_utc();
        let credentials_json =
            serde_json::to_string(&request.credentials).context("Failed to encode credentials")?;

        let model = integration_credentials::ActiveModel {
            provider_type: Set(request.provider_type),
            account_identifier: Set(request.account_identifier),
            credentials_json: Set(credentials_json),
            expiry_date: Set(request.expiry_date.map(|d| d.naive_utc())),
            version: Set(request.version.unwrap_or_else(|| "1".to_string())),
            automatic_update: Set(request.automatic_update),
            created_by: Set(created_by.clone()),
            updated_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Credentials,
            "create",
            &format!(
                "凭证创建成功: id={}, account={}",
                model.id, model.account_identifier
            )
        );

        Ok(model.into())
    }

    /// 列出凭证
    pub async fn list(&self, filter: &CredentialFilter) -> Result<Vec<CredentialRecord>> {
        let rows = Self::filtered(filter)
            .order_by_asc(integration_credentials::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(CredentialRecord::from).collect())
    }

    /// 统计凭证数量
    pub async fn count(&self, filter: &CredentialFilter) -> Result<u64> {
        Ok(Self::filtered(filter).count(self.db.as_ref()).await?)
    }

    /// 按 ID 获取凭证
    pub async fn get(&self, id: i32) -> Result<CredentialRecord> {
        self.find_model(id).await.map(CredentialRecord::from)
    }

    /// 更新凭证
    pub async fn update(
        &self,
        id: i32,
        request: UpdateCredentialRequest,
        updated_by: Option<String>,
    ) -> Result<CredentialRecord> {
        let mut model = self.find_model(id).await?.into_active_model();
        apply_update(&mut model, &request, updated_by)?;

        let updated = model.update(self.db.as_ref()).await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Credentials,
            "update",
            &format!(
                "凭证更新成功: id={}, account={}",
                updated.id, updated.account_identifier
            )
        );

        Ok(updated.into())
    }

    /// 整体替换凭证，保留创建信息
    ///
    /// 返回替换前的账户标识和替换后的记录
    pub async fn replace(
        &self,
        id: i32,
        request: CreateCredentialRequest,
        updated_by: Option<String>,
    ) -> Result<(String, CredentialRecord)> {
        validate_account_identifier(&request.account_identifier)?;

        let existing = self.find_model(id).await?;
        if let Some(other) = self
            .find_one(&request.provider_type, &request.account_identifier)
            .await?
            .filter(|record| record.id != id)
        {
            return Err(ProxyError::validation(format!(
                "凭证已存在: id={}, provider_type={}, account_identifier={}",
                other.id, other.provider_type, other.account_identifier
            )));
        }

        let previous_account = existing.account_identifier.clone();
        let credentials_json =
            serde_json::to_string(&request.credentials).context("Failed to encode credentials")?;

        let mut model = existing.into_active_model();
        model.provider_type = Set(request.provider_type);
        model.account_identifier = Set(request.account_identifier);
        model.credentials_json = Set(credentials_json);
        model.expiry_date = Set(request.expiry_date.map(|d| d.naive_utc()));
        model.version = Set(request.version.unwrap_or_else(|| "1".to_string()));
        model.automatic_update = Set(request.automatic_update);
        model.updated_by = Set(updated_by);
        model.updated_at = Set(Utc::now().naive_utc());

        let replaced = model.update(self.db.as_ref()).await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Credentials,
            "replace",
            &format!(
                "凭证替换成功: id={}, account={} -> {}",
                replaced.id, previous_account, replaced.account_identifier
            )
        );

        Ok((previous_account, replaced.into()))
    }

    /// 批量更新符合过滤条件的凭证，在同一事务中完成
    pub async fn update_all(
        &self,
        filter: &CredentialFilter,
        request: UpdateCredentialRequest,
        updated_by: Option<String>,
    ) -> Result<Vec<CredentialRecord>> {
        let txn = self.db.begin().await?;
        let rows = Self::filtered(filter)
            .order_by_asc(integration_credentials::Column::Id)
            .all(&txn)
            .await?;

        let mut updated = Vec::with_capacity(rows.len());
        for row in rows {
            let mut model = row.into_active_model();
            apply_update(&mut model, &request, updated_by.clone())?;
            updated.push(CredentialRecord::from(model.update(&txn).await?));
        }
        txn.commit().await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Credentials,
            "update_all",
            &format!("批量更新凭证: count={}", updated.len())
        );

        Ok(updated)
    }

    /// 删除凭证，返回被删除的记录
    pub async fn delete(&self, id: i32) -> Result<CredentialRecord> {
        let model = self.find_model(id).await?;
        IntegrationCredentials::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Credentials,
            "delete",
            &format!(
                "凭证删除成功: id={}, account={}",
                model.id, model.account_identifier
            )
        );

        Ok(model.into())
    }
}

fn validate_account_identifier(account_identifier: &str) -> Result<()> {
    if account_identifier.trim().is_empty() {
        return Err(ProxyError::validation_field(
            "accountIdentifier 不能为空",
            "accountIdentifier",
        ));
    }
    Ok(())
}

/// 把部分更新写入 ActiveModel
fn apply_update(
    model: &mut integration_credentials::ActiveModel,
    request: &UpdateCredentialRequest,
    updated_by: Option<String>,
) -> Result<()> {
    if let Some(credentials) = &request.credentials {
        let credentials_json =
            serde_json::to_string(credentials).context("Failed to encode credentials")?;
        model.credentials_json = Set(credentials_json);
    }
    if let Some(expiry_date) = request.expiry_date {
        model.expiry_date = Set(expiry_date.map(|d| d.naive_utc()));
    }
    if let Some(version) = &request.version {
        model.version = Set(version.clone());
    }
    if let Some(automatic_update) = request.automatic_update {
        model.automatic_update = Set(automatic_update);
    }
    model.updated_by = Set(updated_by);
    model.updated_at = Set(Utc::now().naive_utc());
    Ok(())
}

#[async_trait]
impl CredentialStore for SeaOrmCredentialStore {
    async fn find_one(
        &self,
        provider_type: &str,
        account_identifier: &str,
    ) -> Result<Option<CredentialRecord>> {
        ldebug!(
            "system",
            LogStage::Db,
            LogComponent::Credentials,
            "find_one",
            &format!("查询凭证: provider_type={provider_type}, account={account_identifier}")
        );

        let model = IntegrationCredentials::find()
            .filter(integration_credentials::Column::ProviderType.eq(provider_type))
            .filter(integration_credentials::Column::AccountIdentifier.eq(account_identifier))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(CredentialRecord::from))
    }
}
