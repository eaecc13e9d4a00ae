//! Retry configuration and conditions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{HttpClientError, Response};

/// Decides whether a finished attempt should be retried.
///
/// `response` is `None` when the attempt failed before a status line was
/// received.
pub trait RetryCondition: Send + Sync {
    /// Check if the request should be retried.
    fn should_retry(&self, response: Option<&Response>, error: Option<&HttpClientError>) -> bool;
}

impl<F> RetryCondition for F
where
    F: Fn(Option<&Response>, Option<&HttpClientError>) -> bool + Send + Sync,
{
    fn should_retry(&self, response: Option<&Response>, error: Option<&HttpClientError>) -> bool {
        self(response, error)
    }
}

/// Retries on any error, on 5xx, and on 429.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryCondition;

impl RetryCondition for DefaultRetryCondition {
    fn should_retry(&self, response: Option<&Response>, error: Option<&HttpClientError>) -> bool {
        if error.is_some() {
            return true;
        }
        response.is_some_and(|r| {
            let status = r.status().as_u16();
            status >= 500 || status == 429
        })
    }
}

/// Retry configuration.
///
/// `count` is the number of additional attempts after the first one; the
/// interval between attempts is fixed.
#[derive(Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first.
    pub count: u32,
    /// Delay between attempts.
    pub interval: Duration,
    /// Retry condition.
    pub condition: Arc<dyn RetryCondition>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            count: 0,
            interval: Duration::from_secs(1),
            condition: Arc::new(DefaultRetryCondition),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with the default condition.
    pub fn new(count: u32, interval: Duration) -> Self {
        Self {
            count,
            interval,
            ..Default::default()
        }
    }

    /// Create a retry config with no delay between attempts.
    pub fn immediate(count: u32) -> Self {
        Self::new(count, Duration::ZERO)
    }

    /// Replace the retry condition.
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(Option<&Response>, Option<&HttpClientError>) -> bool + Send + Sync + 'static,
    {
        self.condition = Arc::new(condition);
        self
    }

    /// Total attempt budget for one call.
    pub fn max_attempts(&self) -> u32 {
        self.count.saturating_add(1)
    }

    /// Check whether an attempt's outcome calls for another attempt.
    pub fn should_retry(&self, response: Option<&Response>, error: Option<&HttpClientError>) -> bool {
        self.condition.should_retry(response, error)
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("count", &self.count)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
