//! # 上游服务商归一化错误
//!
//! 所有上游失败都会被归类为以下几种错误之一，由调用方（处理器、重试策略）统一消费

use thiserror::Error;

/// 默认的限流重试等待秒数（上游未返回 `retry-after-api` 时使用）
pub const DEFAULT_RETRY_AFTER_SECONDS: u64 = 30;

/// 归一化的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    ServiceUnavailable,
    Internal,
}

impl ErrorKind {
    /// 对外暴露的错误码
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// 服务商错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Vec<String>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ProviderError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn bad_request<T: Into<String>>(message: T) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn rate_limited<T: Into<String>>(message: T, retry_after_seconds: Option<u64>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_seconds,
        }
    }

    /// 限流错误对外给出的等待秒数，上游未提示时为 30 秒
    #[must_use]
    pub const fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
                ..
            } => match retry_after_seconds {
                Some(seconds) => Some(*seconds),
                None => Some(DEFAULT_RETRY_AFTER_SECONDS),
            },
            _ => None,
        }
    }

    /// 上游显式给出的重试提示（`retry-after-api`）
    #[must_use]
    pub const fn retry_hint(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            _ => None,
        }
    }

    /// 400 错误携带的上游明细
    #[must_use]
    pub fn details(&self) -> Option<&[String]> {
        match self {
            Self::BadRequest { details, .. } if !details.is_empty() => Some(details),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
