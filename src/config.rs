//! Configuration for building and searching indexes.
//!
//! Every field has a default, so a configuration file only needs to name
//! what it changes:
//!
//! ```json
//! {
//!   "index": { "page_size_bytes": 4096 },
//!   "storage": { "type": "http", "base_url": "http://localhost:8000" }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunedexError};
use crate::index::page::page_size_in_words;
use crate::storage::StorageConfig;

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE_BYTES: usize = 32 * 1024;

/// Index type holding title text terms.
pub const TITLE_INDEX: &str = "title";

/// Index type holding melody terms over the whole tune.
pub const MELODY_INDEX: &str = "melody";

/// Index type holding melody terms over the opening bars only.
pub const MELODY_INCIPIT_INDEX: &str = "melodyIncipit";

/// Configuration for index writing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Page size in bytes; must be a positive multiple of 4.
    pub page_size_bytes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            page_size_bytes: DEFAULT_PAGE_SIZE_BYTES,
        }
    }
}

impl IndexConfig {
    /// Check the page size.
    pub fn validate(&self) -> Result<()> {
        page_size_in_words(self.page_size_bytes).map(|_| ())
    }
}

/// Configuration for the search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size the indexes were built with.
    pub page_size_bytes: usize,

    /// Index types to open.
    pub index_types: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            page_size_bytes: DEFAULT_PAGE_SIZE_BYTES,
            index_types: vec![
                TITLE_INDEX.to_string(),
                MELODY_INDEX.to_string(),
                MELODY_INCIPIT_INDEX.to_string(),
            ],
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        page_size_in_words(self.page_size_bytes)?;
        if self.index_types.is_empty() {
            return Err(TunedexError::invalid_config(
                "at least one index type is required",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TunedexConfig {
    pub index: IndexConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
}

impl TunedexConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: TunedexConfig = serde_json::from_str(&content).map_err(|e| {
            TunedexError::invalid_config(format!(
                "Failed to parse config {}: {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.index.validate()?;
        self.search.validate()
    }
}
