//! # API 响应结构
//!
//! 管理接口的标准 JSON 信封，以及 [`ProxyError`] 到 HTTP 响应的转换。
//! Mural 路由直接透传上游 JSON，只有错误走信封格式。

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProxyError};
use crate::logging::{LogComponent, LogStage};
use crate::{lerror, lwarn};

/// 限流标记响应头
pub const RATE_LIMIT_EXCEEDED_HEADER: &str = "x-rate-limit-exceeded";

/// # 标准成功响应
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// # 标准错误信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(code: &str, message: String, details: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: code.to_string(),
                message,
                details,
            },
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            lerror!(
                "system",
                LogStage::ResponseFailure,
                LogComponent::Handler,
                "error_response",
                &format!("请求处理失败: status={status}, error={self}")
            );
        } else {
            lwarn!(
                "system",
                LogStage::ResponseFailure,
                LogComponent::Handler,
                "error_response",
                &format!("请求被拒绝: status={status}, error={self}")
            );
        }

        let details = self
            .as_provider()
            .and_then(ProviderError::details)
            .filter(|details| !details.is_empty())
            .map(<[String]>::to_vec);
        let retry_after = self.as_provider().and_then(ProviderError::retry_after_seconds);

        let body = ErrorResponse::new(self.error_code(), self.to_string(), details);
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let headers = response.headers_mut();
            if let Some(seconds) = retry_after {
                headers.insert(RETRY_AFTER, HeaderValue::from(seconds));
            }
            headers.insert(RATE_LIMIT_EXCEEDED_HEADER, HeaderValue::from_static("true"));
        }

        response
    }
}

impl IntoResponse for ProviderError {
    fn into_response(self) -> Response {
        ProxyError::from(self).into_response()
    }
}

/// # 便捷函数：成功响应
pub fn success<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(SuccessResponse {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

/// # 便捷函数：带消息的成功响应
pub fn success_with_message<T: Serialize>(data: T, message: &str) -> Response {
    (
        StatusCode::OK,
        Json(SuccessResponse {
            success: true,
            data: Some(data),
            message: Some(message.to_string()),
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

/// # 便捷函数：HTTP错误响应
pub fn error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(ErrorResponse::new(code, message.to_string(), None))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limited_carries_retry_headers() {
        let response = ProviderError::rate_limited("slow down", Some(12)).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "12");
        assert_eq!(response.headers()[RATE_LIMIT_EXCEEDED_HEADER], "true");

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
        assert_eq!(body["error"]["message"], "slow down");
    }

    #[tokio::test]
    async fn test_bad_request_includes_details() {
        let err = ProviderError::BadRequest {
            message: "a, b".into(),
            details: vec!["a".into(), "b".into()],
        };
        let response = ProxyError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(RATE_LIMIT_EXCEEDED_HEADER).is_none());

        let body = body_json(response).await;
        assert_eq!(body["error"]["details"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_not_found_envelope_omits_details() {
        let response = ProxyError::not_found("integration_credential", "7").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
        assert!(body["error"].get("details").is_none());
        assert!(body["timestamp"].is_string());
    }
}
