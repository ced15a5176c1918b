//! # 错误处理测试

use crate::error::{Context, DEFAULT_RETRY_AFTER_SECONDS, ErrorKind, ProviderError, ProxyError};
use axum::http::StatusCode;
use rstest::rstest;
use std::error::Error;

#[test]
fn test_config_error_creation() {
    let err = ProxyError::config("测试配置错误");
    assert!(matches!(err, ProxyError::Config { .. }));
    assert_eq!(err.to_string(), "配置错误: 测试配置错误");
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_config_error_with_source() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err = ProxyError::config_with_source("配置文件加载失败", io_err);

    assert!(err.to_string().contains("配置错误: 配置文件加载失败"));
    assert!(err.source().is_some());
}

#[test]
fn test_context_trait_wraps_source() {
    let result: Result<(), std::io::Error> = Err(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "权限不足",
    ));

    let err = result.context("读取配置文件失败").unwrap_err();
    assert!(matches!(err, ProxyError::Internal { .. }));
    assert_eq!(err.to_string(), "内部错误: 读取配置文件失败");
    assert!(err.source().is_some());
}

#[test]
fn test_auto_conversion_from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let proxy_err: ProxyError = io_err.into();
    assert!(matches!(proxy_err, ProxyError::Io { .. }));
}

#[test]
fn test_provider_error_is_transparent() {
    let err: ProxyError = ProviderError::NotFound("No Mural credentials found for account acme".into()).into();
    assert_eq!(err.to_string(), "No Mural credentials found for account acme");
    assert_eq!(err.error_code(), "NOT_FOUND");
    assert!(err.as_provider().is_some());
}

#[rstest]
#[case(ProviderError::bad_request("bad"), StatusCode::BAD_REQUEST, "BAD_REQUEST")]
#[case(ProviderError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED")]
#[case(ProviderError::Forbidden("expired".into()), StatusCode::FORBIDDEN, "FORBIDDEN")]
#[case(ProviderError::NotFound("missing".into()), StatusCode::NOT_FOUND, "NOT_FOUND")]
#[case(ProviderError::rate_limited("slow down", Some(30)), StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED")]
#[case(ProviderError::ServiceUnavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")]
#[case(ProviderError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")]
fn test_provider_error_http_mapping(
    #[case] err: ProviderError,
    #[case] status: StatusCode,
    #[case] code: &str,
) {
    let err = ProxyError::from(err);
    assert_eq!(err.status_code(), status);
    assert_eq!(err.error_code(), code);
}

#[test]
fn test_rate_limited_accessors() {
    let err = ProviderError::rate_limited("Rate limit exceeded", Some(12));
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert!(err.is_rate_limited());
    assert_eq!(err.retry_after_seconds(), Some(12));
    assert_eq!(err.retry_hint(), Some(12));

    let unhinted = ProviderError::rate_limited("Rate limit exceeded", None);
    assert_eq!(unhinted.retry_after_seconds(), Some(DEFAULT_RETRY_AFTER_SECONDS));
    assert_eq!(unhinted.retry_hint(), None);

    let other = ProviderError::Internal("x".into());
    assert_eq!(other.retry_after_seconds(), None);
    assert_eq!(other.retry_hint(), None);
}

#[test]
fn test_bad_request_details() {
    let err = ProviderError::BadRequest {
        message: "a, b".into(),
        details: vec!["a".into(), "b".into()],
    };
    assert_eq!(err.details().map(<[String]>::len), Some(2));
    assert_eq!(ProviderError::bad_request("x").details(), None);
}

#[test]
fn test_admin_errors_status() {
    assert_eq!(
        ProxyError::not_found("integration_credential", "7").status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(ProxyError::auth("缺少令牌").status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        ProxyError::validation_field("不能为空", "accountIdentifier").error_code(),
        "VALIDATION_ERROR"
    );
}
