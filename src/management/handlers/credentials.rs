//! # 集成凭证管理处理器
//!
//! 更新或删除凭证后同步清除该租户的客户端缓存

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::response::Response;
use serde_json::json;

use crate::credentials::{
    CreateCredentialRequest, CredentialFilter, CredentialView, UpdateCredentialRequest,
};
use crate::error::Result;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::management::middleware::{AuthContext, RequestId};
use crate::management::response;
use crate::management::server::AppState;

fn actor(auth: Option<&Extension<AuthContext>>) -> Option<String> {
    auth.map(|Extension(ctx)| ctx.subject.clone())
}

/// 创建凭证
pub async fn create_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    auth: Option<Extension<AuthContext>>,
    Json(request): Json<CreateCredentialRequest>,
) -> Result<Response> {
    let record = state
        .credentials
        .create(request, actor(auth.as_ref()))
        .await?;

    linfo!(
        request_id,
        LogStage::Db,
        LogComponent::Credentials,
        "create_credential",
        &format!(
            "已创建凭证: id={}, account={}",
            record.id, record.account_identifier
        )
    );

    Ok(response::success_with_message(
        CredentialView::from(record),
        "凭证创建成功",
    ))
}

/// 凭证列表
pub async fn list_credentials(
    State(state): State<AppState>,
    Query(filter): Query<CredentialFilter>,
) -> Result<Response> {
    let records = state.credentials.list(&filter).await?;
    let views: Vec<CredentialView> = records.into_iter().map(CredentialView::from).collect();
    Ok(response::success(views))
}

/// 凭证数量
pub async fn count_credentials(
    State(state): State<AppState>,
    Query(filter): Query<CredentialFilter>,
) -> Result<Response> {
    let count = state.credentials.count(&filter).await?;
    Ok(response::success(json!({ "count": count })))
}

/// 凭证详情
pub async fn get_credential(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response> {
    let record = state.credentials.get(id).await?;
    Ok(response::success(CredentialView::from(record)))
}

/// 更新凭证
pub async fn update_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    auth: Option<Extension<AuthContext>>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateCredentialRequest>,
) -> Result<Response> {
    let record = state
        .credentials
        .update(id, request, actor(auth.as_ref()))
        .await?;
    let evicted = state.factory.invalidate(Some(&record.account_identifier));

    linfo!(
        request_id,
        LogStage::Db,
        LogComponent::Credentials,
        "update_credential",
        &format!(
            "已更新凭证: id={id}, account={}, evicted={evicted}",
            record.account_identifier
        )
    );

    Ok(response::success_with_message(
        CredentialView::from(record),
        "凭证更新成功",
    ))
}

/// 整体替换凭证；账户标识变化时新旧租户的缓存都会清除
pub async fn replace_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    auth: Option<Extension<AuthContext>>,
    Path(id): Path<i32>,
    Json(request): Json<CreateCredentialRequest>,
) -> Result<Response> {
    let (previous_account, record) = state
        .credentials
        .replace(id, request, actor(auth.as_ref()))
        .await?;
    let mut evicted = state.factory.invalidate(Some(&previous_account));
    if previous_account != record.account_identifier {
        evicted += state.factory.invalidate(Some(&record.account_identifier));
    }

    linfo!(
        request_id,
        LogStage::Db,
        LogComponent::Credentials,
        "replace_credential",
        &format!(
            "已替换凭证: id={id}, account={}, evicted={evicted}",
            record.account_identifier
        )
    );

    Ok(response::success_with_message(
        CredentialView::from(record),
        "凭证替换成功",
    ))
}

/// 批量更新凭证，返回更新数量
pub async fn update_credentials(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    auth: Option<Extension<AuthContext>>,
    Query(filter): Query<CredentialFilter>,
    Json(request): Json<UpdateCredentialRequest>,
) -> Result<Response> {
    let records = state
        .credentials
        .update_all(&filter, request, actor(auth.as_ref()))
        .await?;
    let evicted: usize = records
        .iter()
        .map(|record| state.factory.invalidate(Some(&record.account_identifier)))
        .sum();

    linfo!(
        request_id,
        LogStage::Db,
        LogComponent::Credentials,
        "update_credentials",
        &format!("已批量更新凭证: count={}, evicted={evicted}", records.len())
    );

    Ok(response::success(json!({ "count": records.len() })))
}

/// 删除凭证
pub async fn delete_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<i32>,
) -> Result<Response> {
    let record = state.credentials.delete(id).await?;
    let evicted = state.factory.invalidate(Some(&record.account_identifier));

    linfo!(
        request_id,
        LogStage::Db,
        LogComponent::Credentials,
        "delete_credential",
        &format!(
            "已删除凭证: id={id}, account={}, evicted={evicted}",
            record.account_identifier
        )
    );

    Ok(response::success_with_message(
        json!({ "id": id, "accountIdentifier": record.account_identifier }),
        "凭证删除成功",
    ))
}
