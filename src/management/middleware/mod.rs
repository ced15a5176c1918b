//! # 管理服务器中间件

pub mod auth;
pub mod request_id;

pub use auth::{AuthContext, Claims, JwtManager, auth, extract_bearer_token};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
