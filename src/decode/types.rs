//! Decoder types and traits
//!
//! Defines the page abstraction shared by the decoder and the traversal engine.

use crate::error::Result;
use crate::types::JsonValue;

/// One page of a cursor-paginated collection
///
/// `total`, when reported, counts the whole collection rather than this page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T = JsonValue> {
    /// Items in server order
    pub items: Vec<T>,
    /// Continuation cursor; absent on the last page
    pub cursor: Option<String>,
    /// Server-reported collection size
    pub total: Option<u64>,
}

impl<T> Page<T> {
    /// Create a page with no cursor and no total
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: None,
            total: None,
        }
    }

    /// Set the continuation cursor
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Set the reported total
    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Whether traversal ends with this page
    ///
    /// A page with a cursor but no items also ends traversal.
    pub fn is_last(&self) -> bool {
        self.cursor.is_none() || self.items.is_empty()
    }

    /// Number of items on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether this page has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Where the decoder finds each part of a page response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDecoderConfig {
    /// Dot path to the items array
    pub items_path: String,
    /// Dot path to the continuation cursor
    pub cursor_path: String,
    /// Dot path to the collection total, for total-aware endpoints
    pub total_path: Option<String>,
}

impl Default for PageDecoderConfig {
    fn default() -> Self {
        Self {
            items_path: "data".to_string(),
            cursor_path: "pagination.cursor".to_string(),
            total_path: Some("total".to_string()),
        }
    }
}

impl PageDecoderConfig {
    /// Set the items path
    #[must_use]
    pub fn with_items_path(mut self, path: impl Into<String>) -> Self {
        self.items_path = path.into();
        self
    }

    /// Set the cursor path
    #[must_use]
    pub fn with_cursor_path(mut self, path: impl Into<String>) -> Self {
        self.cursor_path = path.into();
        self
    }

    /// Set or clear the total path
    #[must_use]
    pub fn with_total_path(mut self, path: Option<&str>) -> Self {
        self.total_path = path.map(str::to_string);
        self
    }
}

/// Trait for decoding one raw page response
pub trait PageDecoder: Send + Sync {
    /// Split a response body into raw items, cursor and total
    fn decode_page(&self, body: &JsonValue) -> Result<Page>;
}
