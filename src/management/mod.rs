//! # 管理API模块
//!
//! 对外的 HTTP 接口：Mural 租户路由、凭证管理、缓存管理与健康检查

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use routes::create_routes;
pub use server::{AppState, ManagementServer, build_router};
