//! Configuration types.

use std::time::Duration;

use chrono::NaiveTime;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine name for identification.
    pub name: String,
    /// Retry policy applied to campaign jobs submitted by the scheduler.
    pub job_retry: RetryConfig,
    /// Time-of-day used when a recurring schedule omits an explicit send time.
    pub default_send_time: NaiveTime,
    /// Weekday used when a weekly schedule omits explicit weekdays.
    pub default_weekly_day: chrono::Weekday,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "mailflow".to_string(),
            job_retry: RetryConfig::default(),
            default_send_time: crate::campaign::DEFAULT_SEND_TIME,
            default_weekly_day: crate::campaign::DEFAULT_WEEKLY_DAY,
        }
    }
}

/// Bounded-retry configuration for queued jobs.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of delivery attempts per job.
    pub max_attempts: u32,
    /// Base delay for exponential backoff (doubles per attempt).
    pub backoff_base: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}
