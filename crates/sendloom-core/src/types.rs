//! Shared data types: contacts and delivery requests.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One contact: the normalized recipient phone plus the full field map from
/// the source row, in source column order. Immutable after construction.
///
/// Fields are kept as an ordered list rather than a fixed struct because
/// template placeholders are user-defined and open-ended; lookups are linear
/// over a handful of columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// International format: leading `+`, digits only.
    pub phone: String,
    fields: Vec<(String, String)>,
}

impl Contact {
    pub fn new(phone: String, fields: Vec<(String, String)>) -> Self {
        Self { phone, fields }
    }

    /// Case-insensitive field lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Fields in source column order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Display name for logs: a `name` column if present, else the phone.
    pub fn display_name(&self) -> &str {
        self.get("name").filter(|v| !v.is_empty()).unwrap_or(&self.phone)
    }
}

/// A row excluded before orchestration, reported separately from run stats.
#[derive(Debug, Clone)]
pub struct InvalidContact {
    /// 1-based row number in the source file (excluding the header).
    pub row: usize,
    pub reason: String,
}

/// Everything the transport needs for one delivery.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub recipient: String,
    /// May be empty for image-only sends.
    pub message: String,
    pub image: Option<PathBuf>,
    pub caption: Option<String>,
}
