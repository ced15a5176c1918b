//! # 调用方重试策略
//!
//! 只对限流错误重试：优先等待上游给出的 `retry-after-api` 提示，否则使用带抖动的指数退避

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::ProviderResult;
use crate::logging::{LogComponent, LogStage};
use crate::lwarn;

/// 重试策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含首次）
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// 不重试
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// 第 `attempt` 次重试（从 0 开始）前的指数退避时长，不含抖动
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// 第 `attempt` 次重试前的等待时长
    ///
    /// 有上游提示时使用提示值，但不超过 `max_backoff`
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_hint: Option<u64>) -> Duration {
        if let Some(seconds) = retry_hint {
            return Duration::from_secs(seconds).min(self.max_backoff);
        }

        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        };
        self.backoff(attempt) + jitter
    }

    /// 执行操作，限流时按策略重试
    ///
    /// 其他错误或重试次数耗尽时返回最后一次的错误
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut attempt = 0_u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt, err.retry_hint());
                    lwarn!(
                        "system",
                        LogStage::UpstreamRequest,
                        LogComponent::Retry,
                        operation,
                        &format!(
                            "上游限流，{}ms 后进行第 {} 次重试: {err}",
                            delay.as_millis(),
                            attempt + 2
                        )
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    #[rstest]
    #[case(0, 1_000)]
    #[case(1, 2_000)]
    #[case(2, 4_000)]
    #[case(5, 30_000)]
    #[case(40, 30_000)]
    fn test_backoff_doubles_and_caps(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn test_delay_prefers_hint() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(2, Some(7)), Duration::from_secs(7));
    }

    #[test]
    fn test_delay_caps_hint_at_max_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Some(86_400)), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_adds_bounded_jitter() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay_for(0, None);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_secs(2));
        }
    }

    #[tokio::test]
    async fn test_execute_retries_rate_limited_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .execute("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::rate_limited("slow down", Some(0)))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: ProviderResult<()> = fast_policy(3)
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::rate_limited("slow down", None)) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_does_not_retry_other_errors() {
        let calls = AtomicU32::new(0);
        let result: ProviderResult<()> = fast_policy(5)
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::ServiceUnavailable("down".into())) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::ServiceUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    fn no_jitter_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_waits_for_hint() {
        let start = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);
        let result = no_jitter_policy(2)
            .execute("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ProviderError::rate_limited("slow down", Some(5)))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_backs_off_without_hint() {
        let start = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);
        let result = no_jitter_policy(3)
            .execute("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::rate_limited("slow down", None))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        // 1s + 2s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_caps_long_hint() {
        let start = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);
        let result = no_jitter_policy(2)
            .execute("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ProviderError::rate_limited("slow down", Some(86_400)))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30));
        assert!(elapsed < Duration::from_secs(31));
    }
}
