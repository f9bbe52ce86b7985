//! Outbound request pacing around governor.
//!
//! Holder enumeration issues one RPC call per page per mint, which adds up
//! quickly once a few hundred mints are tracked. Every call waits for a
//! permit here so the provider's quota is respected.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::{debug, instrument};

/// Direct (unkeyed) limiter shared by all calls of one client.
pub struct RequestLimiter {
    limiter: DefaultDirectRateLimiter,
    requests_per_second: u32,
}

impl RequestLimiter {
    /// Create a limiter allowing `requests_per_second` calls, with bursts of
    /// the same size. Zero is treated as one.
    pub fn new(requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            requests_per_second: rate.get(),
        }
    }

    /// Wait until a request may be sent.
    #[instrument(skip(self))]
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!("Rate limit of {}/s reached, waiting for permit", self.requests_per_second);
            self.limiter.until_ready().await;
        }
    }

    /// Take a permit without waiting. Returns false when the quota is exhausted.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}
