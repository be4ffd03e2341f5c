//! Request pacing for live fetches
//!
//! Accuracy runs pause after every live fetch so the recipe site never sees
//! more than one request per interval from us. Fetches must stay sequential;
//! parallelizing them needs a new rate limit, not a shorter delay.

use std::time::Duration;

/// Default pause after each live fetch
pub const DEFAULT_FETCH_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    delay: Duration,
}

impl PacingPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// No pause (tests)
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Pause for `secs` seconds; negative or non-finite values mean no pause
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self::new(Duration::from_secs_f64(secs))
        } else {
            Self::none()
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the pause following one fetch
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tracing::debug!("Pacing: waiting {:?}", self.delay);
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_DELAY)
    }
}
