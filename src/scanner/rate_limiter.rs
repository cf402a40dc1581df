//! Probe rate limiting.
//!
//! A token bucket shared by every probe of a run, so the total probe rate
//! against a network stays under a fixed ceiling no matter how many targets
//! run in parallel.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// A cloneable handle to a shared probes-per-second limiter.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` probes per second.
    ///
    /// Returns `None` for a rate of 0, meaning unlimited.
    pub fn per_second(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        Some(Self {
            limiter: Arc::new(GovLimiter::direct(Quota::per_second(rate))),
        })
    }

    /// Wait until a probe may be sent.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_is_unlimited() {
        assert!(RateLimiter::per_second(0).is_none());
        assert!(RateLimiter::per_second(10).is_some());
    }

    #[tokio::test]
    async fn test_wait_completes_with_high_rate() {
        let limiter = RateLimiter::per_second(1000).unwrap();
        limiter.wait().await;
        limiter.clone().wait().await;
    }

    #[tokio::test]
    async fn test_clones_share_the_bucket() {
        let limiter = RateLimiter::per_second(1).unwrap();
        let other = limiter.clone();
        assert!(limiter.limiter.check().is_ok());
        assert!(other.limiter.check().is_err());
    }
}
