//! 事实写入的重试策略
//!
//! 只用于事实表写入；维度创建依靠唯一约束仲裁，从不重试。

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use sea_orm::error::RuntimeErr;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

/// 可重试的数据库错误码
///
/// MySQL 1213/1205（死锁、锁等待超时），PostgreSQL 40001/40P01
/// （序列化失败、死锁），SQLite 5/6（BUSY、LOCKED）。
const TRANSIENT_CODES: &[&str] = &["1213", "1205", "40001", "40P01", "5", "6"];

const TRANSIENT_MESSAGES: &[&str] = &[
    "deadlock",
    "lock wait timeout",
    "database is locked",
    "serialization failure",
];

/// 判断数据库错误是否是瞬时错误
pub fn is_retryable_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(runtime_err) | DbErr::Query(runtime_err) => is_transient(runtime_err),
        _ => false,
    }
}

fn is_transient(err: &RuntimeErr) -> bool {
    let message = match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            if let Some(code) = sqlx_err.as_database_error().and_then(|db_err| db_err.code()) {
                return TRANSIENT_CODES.contains(&code.as_ref());
            }
            sqlx_err.to_string()
        }
        RuntimeErr::Internal(msg) => msg.clone(),
        #[allow(unreachable_patterns)]
        _ => return false,
    };

    let message = message.to_lowercase();
    TRANSIENT_MESSAGES.iter().any(|m| message.contains(m))
}

/// 重试配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl From<&DatabaseConfig> for RetryConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }
}

impl RetryConfig {
    /// 第 `attempt` 次重试前的等待时间：指数退避，封顶后再加 0-25% 抖动
    fn backoff(&self, attempt: u32) -> Duration {
        use rand::RngExt;
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay_ms);
        let jitter = rand::rng().random_range(0..=capped / 4);
        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// 对瞬时错误做指数退避重试
///
/// `operation` 每次调用都必须构造一次全新的写入。
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = operation_name, attempt, "write succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < config.max_retries && is_retryable_error(&e) => {
                attempt += 1;
                let delay = config.backoff(attempt);
                warn!(
                    "Write '{}' failed (attempt {}/{}): {}; retrying in {} ms",
                    operation_name,
                    attempt,
                    config.max_retries + 1,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 5,
            max_delay_ms: 20,
        }
    }

    #[test]
    fn test_pool_and_connection_errors_are_transient() {
        assert!(is_retryable_error(&DbErr::ConnectionAcquire(
            sea_orm::error::ConnAcquireErr::Timeout
        )));
        assert!(is_retryable_error(&DbErr::Conn(RuntimeErr::Internal(
            "connection reset".to_string()
        ))));
    }

    #[test]
    fn test_lock_messages_are_transient() {
        for msg in ["database is locked", "Deadlock found", "Lock wait timeout exceeded"] {
            let err = DbErr::Exec(RuntimeErr::Internal(msg.to_string()));
            assert!(is_retryable_error(&err), "{msg} should be retried");
        }
    }

    #[test]
    fn test_conflicts_and_missing_rows_are_final() {
        // ON CONFLICT DO NOTHING 的冲突结果不是瞬时错误
        assert!(!is_retryable_error(&DbErr::RecordNotInserted));
        assert!(!is_retryable_error(&DbErr::RecordNotFound("requests".into())));
        assert!(!is_retryable_error(&DbErr::Exec(RuntimeErr::Internal(
            "UNIQUE constraint failed: urls.value_hash".to_string()
        ))));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig::default();
        let first = config.backoff(1).as_millis() as u64;
        assert!((100..=125).contains(&first));
        let third = config.backoff(3).as_millis() as u64;
        assert!((400..=500).contains(&third));
        let capped = config.backoff(12).as_millis() as u64;
        assert!((2000..=2500).contains(&capped));
    }

    #[test]
    fn test_from_database_config() {
        let db = DatabaseConfig {
            retry_count: 5,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 80,
            ..Default::default()
        };
        let config = RetryConfig::from(&db);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_delay_ms, 80);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("insert_request", fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(DbErr::ConnectionAcquire(
                        sea_orm::error::ConnAcquireErr::Timeout,
                    ))
                } else {
                    Ok(11_i64)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 11);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result = with_retry("insert_performance_entries", fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<u64, _>(DbErr::Exec(RuntimeErr::Internal(
                    "database is locked".to_string(),
                )))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_final_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result = with_retry("insert_request", fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i64, _>(DbErr::RecordNotInserted) }
        })
        .await;

        assert!(matches!(result, Err(DbErr::RecordNotInserted)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
