//! 有界重试 + 指数退避
//!
//! 第 k 次尝试失败后等待 `2^k × backoff_unit` 再发起第 k+1 次，
//! 最后一次失败后不再等待。每个逻辑调用都有独立的重试预算。

use crate::config::Config;
use crate::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（至少 1 次）
    pub max_attempts: u32,
    /// 退避时间单位
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_retries, config.backoff_unit())
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待时间
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_unit.saturating_mul(factor)
    }

    /// 执行 `call`，失败时按策略重试
    ///
    /// # 参数
    /// - `operation`: 操作名（仅用于日志和错误信息）
    /// - `call`: 每次尝试都会重新调用，生成新的 future
    ///
    /// # 返回
    /// 首次成功的结果；全部失败时返回 `ApiError::RetriesExhausted`，携带最后一次的错误
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} 第 {} 次尝试成功", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} 失败 (尝试 {}/{}): {}，{:?} 后重试...",
                        operation, attempt, max_attempts, e, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("{} 失败，已尝试 {} 次: {}", operation, attempt, e);
                    return Err(ApiError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: Box::new(e),
                    });
                }
            }
        }
    }
}
