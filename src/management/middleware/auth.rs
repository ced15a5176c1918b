//! # 认证中间件
//!
//! 校验 `Authorization: Bearer <JWT>`（HS256），并将调用方身份注入请求扩展。
//! 认证关闭时直接放行。

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::request_id::RequestId;
use crate::config::AuthConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::management::server::AppState;
use crate::{ldebug, lwarn};

/// JWT 声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// 已认证的调用方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub subject: String,
}

/// JWT 签发与校验
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtManager {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 30;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    /// 签发访问令牌
    pub fn issue_token(&self, subject: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ProxyError::auth_with_source("Token generation failed", e))
    }

    /// 校验访问令牌
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ProxyError::auth_with_source("Invalid or expired token", e))
    }
}

/// 提取 Bearer 令牌
#[must_use]
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Axum 认证中间件
pub async fn auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(jwt) = state.jwt.as_ref() else {
        return next.run(request).await;
    };

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| "system".to_string(), ToString::to_string);

    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token);

    let Some(token) = token else {
        lwarn!(
            request_id,
            LogStage::Authentication,
            LogComponent::Auth,
            "missing_token",
            &format!("缺少 Bearer 令牌: {}", request.uri().path())
        );
        return ProxyError::auth("Missing bearer token").into_response();
    };

    match jwt.validate_token(token) {
        Ok(claims) => {
            ldebug!(
                request_id,
                LogStage::Authentication,
                LogComponent::Auth,
                "token_valid",
                &format!("认证通过: subject={}", claims.sub)
            );
            request
                .extensions_mut()
                .insert(AuthContext { subject: claims.sub });
            next.run(request).await
        }
        Err(e) => {
            lwarn!(
                request_id,
                LogStage::Authentication,
                LogComponent::Auth,
                "invalid_token",
                &format!("令牌校验失败: {e}")
            );
            e.into_response()
        }
    }
}
