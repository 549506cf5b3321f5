//! Pagination types
//!
//! Request description, cursor state and the materialised collection.

use crate::decode::{Entity, Page};
use crate::http::GatewayRequest;
use crate::types::{JsonValue, Method, QueryPairs};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Describes a paginated endpoint query
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    /// HTTP method (GET for nearly every Helix collection)
    pub method: Method,
    /// Endpoint path relative to the API base
    pub path: String,
    /// Fixed query parameters sent with every page
    pub query: QueryPairs,
    /// Permission scope the endpoint requires
    pub scope: Option<String>,
    /// Request body, for collections fetched by POST
    pub body: Option<JsonValue>,
    /// Query parameter carrying the cursor (e.g., "after")
    pub cursor_param: String,
    /// Query parameter carrying the page size (e.g., "first")
    pub page_size_param: String,
    /// Items requested per page
    pub page_size: Option<u32>,
    /// Stop `fetch_all` after this many pages
    pub max_pages: Option<usize>,
}

impl PageRequest {
    /// Create a request for `path` using `method`
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            scope: None,
            body: None,
            cursor_param: "after".to_string(),
            page_size_param: "first".to_string(),
            page_size: None,
            max_pages: None,
        }
    }

    /// Create a GET request for `path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Append a fixed query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a fixed query parameter when a value is present
    #[must_use]
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Require a permission scope
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the request body
    #[must_use]
    pub fn body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Change the cursor query parameter
    #[must_use]
    pub fn cursor_param(mut self, param: impl Into<String>) -> Self {
        self.cursor_param = param.into();
        self
    }

    /// Request a page size
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Cap the number of pages `fetch_all` will request
    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = Some(pages);
        self
    }

    /// Build the gateway request for the page after `cursor`
    pub fn to_gateway_request(&self, cursor: Option<&str>) -> GatewayRequest {
        let mut request = GatewayRequest::new()
            .queries(self.query.iter().cloned())
            .query_opt(
                self.page_size_param.as_str(),
                self.page_size.map(|s| s.to_string()),
            )
            .query_opt(self.cursor_param.as_str(), cursor)
            .scope_opt(self.scope.as_deref());
        request.body.clone_from(&self.body);
        request
    }
}

/// Cursor state for page-at-a-time traversal
///
/// Owned by one caller; advancing the same paginator from two tasks is not
/// supported. Create one paginator per concurrent traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginator {
    /// Cursor returned by the most recent page
    pub last_cursor: Option<String>,
    /// No further pages will be requested
    pub done: bool,
    /// Running count of items observed
    pub current_count: u64,
    /// Last collection total the server reported
    pub total: Option<u64>,
    /// Pages fetched so far
    pub pages_fetched: usize,
}

impl Paginator {
    /// Create a fresh paginator positioned before the first page
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously saved cursor
    pub fn resume(cursor: impl Into<String>) -> Self {
        Self {
            last_cursor: Some(cursor.into()),
            ..Self::default()
        }
    }

    /// Mark traversal as finished
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Record one successfully fetched page
    ///
    /// The count is informational; [`Page::is_last`] decides when traversal
    /// ends. A total that differs from an earlier page replaces it.
    pub fn advance<T>(&mut self, page: &Page<T>) {
        self.pages_fetched += 1;
        self.current_count += page.len() as u64;

        if let Some(total) = page.total {
            if let Some(previous) = self.total.filter(|&p| p != total) {
                warn!(
                    previous,
                    total,
                    page = self.pages_fetched,
                    "Server total changed between pages; keeping the latest"
                );
            }
            self.total = Some(total);
        }

        match &page.cursor {
            Some(cursor) if !page.is_last() => self.last_cursor = Some(cursor.clone()),
            _ => self.mark_done(),
        }
    }
}

/// A fully materialised collection
#[derive(Debug, Clone)]
pub struct Collection<T> {
    /// Items from every page, in arrival order
    pub items: Vec<Entity<T>>,
    /// Server-reported total, if any page carried one
    pub total: Option<u64>,
    /// Pages fetched
    pub pages: usize,
}

impl<T> Collection<T> {
    /// Number of items collected
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items were collected
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over collected entities
    pub fn iter(&self) -> std::slice::Iter<'_, Entity<T>> {
        self.items.iter()
    }

    /// Drop gateway references and keep the values
    pub fn into_values(self) -> Vec<T> {
        self.items.into_iter().map(Entity::into_inner).collect()
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = Entity<T>;
    type IntoIter = std::vec::IntoIter<Entity<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
