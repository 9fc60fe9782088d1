//! 限流与调用节奏
//!
//! 上游抽取服务有频率限制：同一份文档的调用串行发出，相邻两次调用之间至少间隔
//! `inter_call_delay`；遇到限流信号按指数退避重试，重试不计入修复或抽取预算。

use std::future::Future;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::time::sleep;
use tracing::warn;

use crate::config::Config;
use crate::error::ExtractionError;

/// 限流重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// 第一次重试前的等待
    pub base_delay: Duration,
    /// 单次等待上限
    pub max_delay: Duration,
    /// 最多重试次数
    pub max_retries: usize,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(15),
            max_delay: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

impl RateLimitPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_delay: Duration::from_secs(config.rate_limit_base_delay_secs),
            max_delay: Duration::from_secs(config.rate_limit_max_delay_secs),
            max_retries: config.rate_limit_max_retries,
        }
    }

    /// 不等待的策略，测试用
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_retries,
        }
    }

    /// 第 `attempt` 次重试（从 1 开始）前的等待
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// 服务端给了 retry-after 时取两者较大值，仍受上限约束
    pub fn delay_with_hint(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        let computed = self.delay_for_attempt(attempt);
        match retry_after {
            Some(hint) => hint.max(computed).min(self.max_delay),
            None => computed,
        }
    }

    /// 执行一次调用，限流时退避重试
    ///
    /// 重试用尽后把限流错误转换为 `Fatal`，由调用方按普通失败处理。
    pub async fn call<F, Fut, T>(&self, mut call: F) -> Result<T, ExtractionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExtractionError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(ExtractionError::Retryable {
                    strategy,
                    message,
                    retry_after,
                }) => {
                    if attempt >= self.max_retries {
                        return Err(ExtractionError::fatal(
                            strategy,
                            format!("限流重试 {} 次后仍失败: {}", attempt, message),
                        ));
                    }
                    attempt += 1;
                    let delay = self.delay_with_hint(attempt, retry_after);
                    warn!(
                        "[{}] ⏳ 触发限流，{} 秒后第 {} 次重试",
                        strategy,
                        delay.as_secs(),
                        attempt
                    );
                    sleep(delay).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// 控制同一文档相邻调用之间的最小间隔
///
/// 每份文档一个实例，配额为每 `interval` 一次调用、突发 1 次；间隔为 0 时不限速。
pub struct CallPacer {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl CallPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: Quota::with_period(interval).map(RateLimiter::direct),
        }
    }

    /// 等到可以发出下一次调用
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const STRATEGY: ExtractionStrategy = ExtractionStrategy::WholeDocumentFast;

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(15));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_hint() {
        let policy = RateLimitPolicy::default();
        assert_eq!(
            policy.delay_with_hint(1, Some(Duration::from_secs(40))),
            Duration::from_secs(40)
        );
        assert_eq!(
            policy.delay_with_hint(1, Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_retries_until_success() {
        let calls = AtomicUsize::new(0);
        let policy = RateLimitPolicy::immediate(3);

        let result = tokio_test::block_on(policy.call(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExtractionError::retryable(STRATEGY, "429"))
                } else {
                    Ok("done")
                }
            }
        }));

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhausted_retries_become_fatal() {
        let calls = AtomicUsize::new(0);
        let policy = RateLimitPolicy::immediate(2);

        let result: Result<(), _> = tokio_test::block_on(policy.call(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractionError::retryable(STRATEGY, "429")) }
        }));

        assert!(matches!(result, Err(ExtractionError::Fatal { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_non_retryable_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let policy = RateLimitPolicy::immediate(5);

        let result: Result<(), _> = tokio_test::block_on(policy.call(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractionError::recoverable(STRATEGY, "bad json")) }
        }));

        assert!(matches!(result, Err(ExtractionError::Recoverable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pacer_first_call_does_not_wait() {
        let pacer = CallPacer::new(Duration::from_secs(3600));
        let started = Instant::now();
        pacer.wait().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_pacer_spaces_consecutive_calls() {
        let pacer = CallPacer::new(Duration::from_millis(200));
        let started = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let pacer = CallPacer::new(Duration::ZERO);
        let started = Instant::now();
        for _ in 0..20 {
            pacer.wait().await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
