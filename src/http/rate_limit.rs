//! Rate limiting implementation
//!
//! Helix meters requests in points per minute per client; this is a
//! token bucket over that budget using the governor crate.

use governor::{DefaultDirectRateLimiter, Quota};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Default Helix bucket size
pub const HELIX_POINTS_PER_MINUTE: u32 = 800;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Points refilled per minute
    #[serde(default = "default_points")]
    pub points_per_minute: u32,
    /// Maximum points available at once
    #[serde(default = "default_points")]
    pub burst: u32,
}

fn default_points() -> u32 {
    HELIX_POINTS_PER_MINUTE
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            points_per_minute: HELIX_POINTS_PER_MINUTE,
            burst: HELIX_POINTS_PER_MINUTE,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(points_per_minute: u32, burst: u32) -> Self {
        Self {
            points_per_minute,
            burst,
        }
    }
}

/// Token bucket rate limiter shared by clones of one client
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<DefaultDirectRateLimiter>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let per_minute = NonZeroU32::new(config.points_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            bucket: Arc::new(DefaultDirectRateLimiter::direct(quota)),
        }
    }

    /// Wait until one point is available
    pub async fn acquire(&self) {
        self.bucket.until_ready().await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
