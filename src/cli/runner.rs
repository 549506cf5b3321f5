//! CLI runner - executes commands

use crate::api::{HelixClient, SubscriptionFilter};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{load_config, ClientConfig};
use crate::error::{Error, Result};
use crate::eventsub::{webhook, Event, EventHandler, SubscriptionDescriptor};
use crate::types::JsonValue;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Fetch {
                path,
                query,
                scope,
                max_pages,
            } => self.fetch(path, query, scope.as_deref(), *max_pages).await,
            Commands::Identity { kind, param } => {
                let descriptor = SubscriptionDescriptor::new(*kind, param.clone())?;
                println!("{}", descriptor.identity());
                Ok(())
            }
            Commands::Subscriptions { status, type_name } => {
                let filter = SubscriptionFilter {
                    status: status.clone(),
                    type_name: type_name.clone(),
                    user_id: None,
                };
                self.subscriptions(&filter).await
            }
            Commands::Serve { bind } => self.serve(bind.as_deref()).await,
        }
    }

    fn load_config(&self) -> Result<ClientConfig> {
        load_config(&self.cli.config)
    }

    fn client(&self) -> Result<(ClientConfig, HelixClient)> {
        let config = self.load_config()?;
        let client = HelixClient::from_config(&config)?;
        Ok((config, client))
    }

    async fn fetch(
        &self,
        path: &str,
        query: &[(String, String)],
        scope: Option<&str>,
        max_pages: Option<usize>,
    ) -> Result<()> {
        let (_, client) = self.client()?;

        let mut request = client.page_request(path);
        for (key, value) in query {
            request = request.query(key, value);
        }
        if let Some(scope) = scope {
            request = request.scope(scope);
        }
        if let Some(max_pages) = max_pages {
            request = request.max_pages(max_pages);
        }

        let start = Instant::now();
        let collection = client.fetch_all::<JsonValue>(&request).await?;
        let fetched = collection.len();
        let pages = collection.pages;
        let total = collection.total;

        for item in collection.into_values() {
            self.output(&item);
        }

        match total {
            Some(total) => eprintln!("{fetched} of {total} items in {pages} page(s)"),
            None => eprintln!("{fetched} items in {pages} page(s)"),
        }
        info!(
            path,
            fetched,
            pages,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetch complete"
        );
        Ok(())
    }

    async fn subscriptions(&self, filter: &SubscriptionFilter) -> Result<()> {
        let (_, client) = self.client()?;
        let collection = client.eventsub_subscriptions(filter).await?;
        let listed = collection.len();
        let total = collection.total;

        for remote in collection.into_values() {
            self.output(&remote);
        }

        match total {
            Some(total) => eprintln!("{listed} listed, {total} total"),
            None => eprintln!("{listed} listed"),
        }
        Ok(())
    }

    async fn serve(&self, bind_override: Option<&str>) -> Result<()> {
        let (config, client) = self.client()?;
        let eventsub = config
            .eventsub
            .as_ref()
            .ok_or_else(|| Error::missing_field("eventsub"))?;
        let secret = eventsub.transport.secret().ok_or_else(|| {
            Error::config("serve requires the webhook transport (eventsub.transport.method)")
        })?;

        let manager = Arc::clone(client.subscriptions()?);
        let router = webhook::router(Arc::clone(&manager), secret, &eventsub.webhook);
        let bind = bind_override.unwrap_or(&eventsub.webhook.bind).to_string();

        // The callback must be reachable before registration triggers the challenge.
        let server = tokio::spawn(async move { webhook::serve(router, &bind).await });

        let handler: EventHandler = Arc::new(log_event);
        for descriptor in eventsub.descriptors()? {
            let identity = descriptor.identity().to_string();
            match manager.register(descriptor, Arc::clone(&handler)).await {
                Ok(instance) => info!(
                    identity = %identity,
                    state = %instance.state,
                    "Subscription registered"
                ),
                Err(e) => error!(identity = %identity, error = %e, "Subscription failed"),
            }
        }

        let served = server
            .await
            .map_err(|e| Error::Other(format!("webhook server task failed: {e}")))?;

        for (identity, revocation) in manager.unsubscribe_all().await {
            info!(identity = %identity, ?revocation, "Unsubscribed");
        }
        served
    }

    fn output<T: Serialize>(&self, value: &T) {
        let rendered = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value),
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
        };
        match rendered {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Failed to serialize output"),
        }
    }
}

fn log_event(event: &Event) {
    info!(
        kind = %event.kind(),
        broadcaster = event.broadcaster_user_id(),
        event = %serde_json::to_string(event).unwrap_or_default(),
        "EventSub event"
    );
}
