//! HTTP gateway module
//!
//! The [`Gateway`] trait is the single seam between the engines in this crate
//! and the remote API. [`HttpClient`] is the production implementation.
//!
//! # Features
//!
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Rate Limiting**: Token bucket over the Helix points budget using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Scope Checks**: Requests needing a scope the token lacks fail before sending

mod client;
mod gateway;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use gateway::{Gateway, GatewayRequest};
pub use rate_limit::{RateLimiter, RateLimiterConfig, HELIX_POINTS_PER_MINUTE};

#[cfg(test)]
pub(crate) mod stub;
