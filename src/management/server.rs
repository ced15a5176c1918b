//! # 管理服务器
//!
//! Axum HTTP 服务器：Mural 租户路由、凭证管理与客户端缓存管理

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use sea_orm::DatabaseConnection;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::{JwtManager, REQUEST_ID_HEADER, request_id_middleware};
use super::response::RATE_LIMIT_EXCEEDED_HEADER;
use crate::config::{AppConfig, ServerConfig};
use crate::credentials::{CredentialStore, SeaOrmCredentialStore};
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::provider::{ProviderFactory, RetryPolicy};
use crate::{linfo, lwarn};

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub credentials: Arc<SeaOrmCredentialStore>,
    pub factory: Arc<ProviderFactory>,
    pub retry: RetryPolicy,
    /// 认证关闭时为 `None`
    pub jwt: Option<Arc<JwtManager>>,
}

impl AppState {
    /// 按配置组装应用状态
    #[must_use]
    pub fn new(config: AppConfig, db: Arc<DatabaseConnection>) -> Self {
        let credentials = Arc::new(SeaOrmCredentialStore::new(Arc::clone(&db)));
        let store: Arc<dyn CredentialStore> = credentials.clone();
        let factory = Arc::new(ProviderFactory::from_config(store, &config.provider));
        let retry = RetryPolicy::from(&config.retry);
        let jwt = config
            .auth
            .enabled
            .then(|| Arc::new(JwtManager::new(&config.auth)));

        Self {
            config: Arc::new(config),
            db,
            credentials,
            factory,
            retry,
            jwt,
        }
    }

    /// 替换重试策略
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// 管理服务器
pub struct ManagementServer {
    config: ServerConfig,
    router: Router,
}

impl ManagementServer {
    #[must_use]
    pub fn new(state: AppState) -> Self {
        let config = state.config.server.clone();
        let router = build_router(state);
        Self { config, router }
    }

    /// 启动服务器，收到 Ctrl+C 后优雅退出
    pub async fn serve(self) -> Result<()> {
        let bind_address = self.config.bind_address();
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            ProxyError::config_with_source(format!("无效的监听地址 '{bind_address}'"), e)
        })?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            ProxyError::server_init_with_source(format!("无法绑定监听地址 {addr}"), e)
        })?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            &format!(
                "管理服务器已启动: http://{addr}{}",
                self.config.api_prefix
            )
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ProxyError::server_init_with_source("管理服务器运行失败", e))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "server_stop",
            "管理服务器已停止"
        );
        Ok(())
    }
}

/// 构建完整路由：API 前缀、请求 ID、CORS、HTTP trace
pub fn build_router(state: AppState) -> Router {
    let api_prefix = normalize_prefix(&state.config.server.api_prefix);
    let cors = cors_layer(&state.config.server.cors_origins);
    let api_routes = super::routes::create_routes(state);

    let app = if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(&api_prefix, api_routes)
    };

    app.layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("on-behalf-of"),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        // 前端需读取限流倒计时
        .expose_headers([
            header::RETRY_AFTER,
            HeaderName::from_static(RATE_LIMIT_EXCEEDED_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let parsed = origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<std::result::Result<Vec<_>, _>>();

    match parsed {
        Ok(origins) => layer.allow_origin(origins),
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::ServerSetup,
                "cors_config_fail",
                &format!("CORS 源配置无效: {e}，回退为允许任意源")
            );
            layer.allow_origin(Any)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        lwarn!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "signal_fail",
            &format!("监听退出信号失败: {e}")
        );
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/api", "/api")]
    #[case("/api/", "/api")]
    #[case("api", "/api")]
    #[case("/", "")]
    #[case("", "")]
    fn test_normalize_prefix(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_prefix(input), expected);
    }
}
