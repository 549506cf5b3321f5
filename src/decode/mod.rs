//! Result page decoder module
//!
//! # Overview
//!
//! Turns one raw page response into raw items, an opaque continuation cursor
//! and (for total-aware endpoints) a collection total, then decodes items
//! into typed [`Entity`] values.

mod decoders;
mod entity;
mod types;

pub use decoders::{extract_path, JsonPageDecoder};
pub use entity::{decode_entities, Entity};
pub use types::{Page, PageDecoder, PageDecoderConfig};
