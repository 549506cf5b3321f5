//! CLI commands and argument parsing

use crate::eventsub::SubscriptionKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Helix client development kit CLI
#[derive(Parser, Debug)]
#[command(name = "helix-cdk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML)
    #[arg(short = 'C', long, global = true, default_value = "helix.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every page of a Helix collection
    Fetch {
        /// Collection path relative to the base URL (e.g. `users/follows`)
        #[arg(long)]
        path: String,

        /// Query parameter, repeatable
        #[arg(short, long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,

        /// OAuth scope the collection requires
        #[arg(long)]
        scope: Option<String>,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Print the canonical identity of a subscription (no network)
    Identity {
        /// Subscription kind, by name (`stream_online`) or type (`stream.online`)
        #[arg(short, long)]
        kind: SubscriptionKind,

        /// Condition parameter, repeatable
        #[arg(short, long = "param", value_parser = parse_key_value)]
        param: Vec<(String, String)>,
    },

    /// List EventSub subscriptions known to the server
    Subscriptions {
        /// Only subscriptions with this status (e.g. `enabled`)
        #[arg(long)]
        status: Option<String>,

        /// Only subscriptions of this type (e.g. `stream.online`)
        #[arg(long = "type")]
        type_name: Option<String>,
    },

    /// Register configured subscriptions and run the webhook receiver
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one item per line)
    Json,
    /// Human-readable output
    Pretty,
}

/// Parse a `key=value` argument
pub(crate) fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
