//! Pagination module
//!
//! # Overview
//!
//! Cursor traversal of paginated collections. Two modes:
//! - `fetch_all` materialises the whole collection (plus any server total)
//! - `fetch_next` advances a caller-owned [`Paginator`] one page at a time
//!
//! Traversal ends on the first page that has no cursor or no items.

mod traversal;
mod types;

pub use traversal::CollectionTraversal;
pub use types::{Collection, PageRequest, Paginator};
