//! 健康检查处理器

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;

use crate::database::check_database_status;
use crate::lwarn;
use crate::logging::{LogComponent, LogStage};
use crate::management::response;
use crate::management::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub cached_providers: usize,
}

/// 服务健康状态；数据库不可用时返回 503
pub async fn health_check(State(state): State<AppState>) -> Response {
    match check_database_status(&state.db).await {
        Ok(()) => response::success(HealthStatus {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            database: "ok",
            cached_providers: state.factory.len(),
        }),
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Db,
                LogComponent::Handler,
                "health_check",
                &format!("数据库检查失败: {e}")
            );
            response::error(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Database is unavailable",
            )
        }
    }
}
