//! CLI module
//!
//! Command-line interface over [`HelixClient`](crate::api::HelixClient).
//!
//! # Commands
//!
//! - `fetch` - Walk every page of a collection and print its items
//! - `identity` - Print a subscription identity without touching the network
//! - `subscriptions` - List remote EventSub subscriptions
//! - `serve` - Register configured subscriptions and run the webhook receiver

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
