//! Decoder implementations

use super::types::{Page, PageDecoder, PageDecoderConfig};
use crate::error::{Error, Result};
use crate::types::JsonValue;

// ============================================================================
// JSON Page Decoder
// ============================================================================

/// Decodes Helix-style `{"data": [...], "pagination": {"cursor": ...}}` pages
#[derive(Debug, Clone, Default)]
pub struct JsonPageDecoder {
    config: PageDecoderConfig,
}

impl JsonPageDecoder {
    /// Create a decoder with the default Helix paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with custom paths
    pub fn with_config(config: PageDecoderConfig) -> Self {
        Self { config }
    }

    /// Get the decoder configuration
    pub fn config(&self) -> &PageDecoderConfig {
        &self.config
    }
}

impl PageDecoder for JsonPageDecoder {
    fn decode_page(&self, body: &JsonValue) -> Result<Page> {
        let items = match extract_path(body, &self.config.items_path) {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(items)) => items.clone(),
            Some(other) => {
                return Err(Error::RecordExtraction {
                    path: self.config.items_path.clone(),
                    message: format!("expected an array, found {}", type_name(other)),
                })
            }
        };

        let cursor = match extract_path(body, &self.config.cursor_path) {
            Some(JsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        let total = match &self.config.total_path {
            Some(path) => extract_path(body, path).and_then(parse_total),
            None => None,
        };

        Ok(Page {
            items,
            cursor,
            total,
        })
    }
}

/// Follow a dot path (`pagination.cursor`) through nested objects
pub fn extract_path<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, part| match current {
        JsonValue::Object(map) => map.get(part),
        JsonValue::Array(arr) => part.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    })
}

fn parse_total(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
