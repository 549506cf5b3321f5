//! Cursor traversal over the gateway
//!
//! Gateway failures propagate unchanged; nothing here retries.

use super::types::{Collection, PageRequest, Paginator};
use crate::decode::{decode_entities, Entity, JsonPageDecoder, Page, PageDecoder};
use crate::error::{Error, Result};
use crate::http::Gateway;
use futures::Stream;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Walks cursor-paginated collections through a [`Gateway`]
#[derive(Clone)]
pub struct CollectionTraversal {
    gateway: Arc<dyn Gateway>,
    decoder: Arc<dyn PageDecoder>,
}

impl CollectionTraversal {
    /// Create a traversal using the default Helix page layout
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            decoder: Arc::new(JsonPageDecoder::new()),
        }
    }

    /// Use a different page decoder
    #[must_use]
    pub fn with_decoder(mut self, decoder: impl PageDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// The gateway pages are fetched through
    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// Fetch and decode the raw page after `cursor`
    pub async fn fetch_page(&self, request: &PageRequest, cursor: Option<&str>) -> Result<Page> {
        let body = self
            .gateway
            .call(
                request.method,
                &request.path,
                request.to_gateway_request(cursor),
            )
            .await?;
        self.decoder.decode_page(&body)
    }

    /// Fetch every page and concatenate the items in arrival order
    ///
    /// Stops after the first page without a cursor or without items. If pages
    /// disagree on the total, the last reported value is returned.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        request: &PageRequest,
    ) -> Result<Collection<T>> {
        let mut paginator = Paginator::new();
        let mut items = Vec::new();

        while !paginator.done {
            if request
                .max_pages
                .is_some_and(|max| paginator.pages_fetched >= max)
            {
                debug!(path = %request.path, pages = paginator.pages_fetched, "Page cap reached");
                break;
            }
            items.extend(self.fetch_next(&mut paginator, request).await?);
        }

        debug!(
            path = %request.path,
            items = items.len(),
            pages = paginator.pages_fetched,
            total = ?paginator.total,
            "Collection fetched"
        );

        Ok(Collection {
            items,
            total: paginator.total,
            pages: paginator.pages_fetched,
        })
    }

    /// Fetch the next page for `paginator`
    ///
    /// Returns an empty list without touching the gateway once the paginator
    /// is done. On error the paginator is left unchanged.
    pub async fn fetch_next<T: DeserializeOwned>(
        &self,
        paginator: &mut Paginator,
        request: &PageRequest,
    ) -> Result<Vec<Entity<T>>> {
        if paginator.done {
            return Ok(Vec::new());
        }

        let Page {
            items,
            cursor,
            total,
        } = self
            .fetch_page(request, paginator.last_cursor.as_deref())
            .await?;

        let page = Page {
            items: decode_entities(items, &self.gateway)?,
            cursor,
            total,
        };
        paginator.advance(&page);

        debug!(
            path = %request.path,
            page = paginator.pages_fetched,
            items = page.len(),
            done = paginator.done,
            "Fetched page"
        );

        Ok(page.items)
    }

    /// Stream items one at a time, fetching pages lazily
    ///
    /// Dropping the stream abandons the traversal at the current page.
    pub fn stream<T>(&self, request: PageRequest) -> impl Stream<Item = Result<Entity<T>>> + Send
    where
        T: DeserializeOwned + Send + 'static,
    {
        let state = (self.clone(), request, Paginator::new(), VecDeque::new());

        futures::stream::try_unfold(
            state,
            |(traversal, request, mut paginator, mut buffer)| async move {
                loop {
                    if let Some(item) = buffer.pop_front() {
                        return Ok(Some((item, (traversal, request, paginator, buffer))));
                    }
                    if paginator.done {
                        return Ok(None);
                    }
                    match traversal.fetch_next::<T>(&mut paginator, &request).await {
                        Ok(page) => buffer.extend(page),
                        Err(e) => return Err::<_, Error>(e),
                    }
                }
            },
        )
    }
}

impl std::fmt::Debug for CollectionTraversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionTraversal").finish_non_exhaustive()
    }
}
