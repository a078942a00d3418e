//! Storage driver abstraction for index pages and page tables.
//!
//! Index data is addressed by index type and page number and laid out the
//! same way on every backend:
//!
//! ```text
//! index/<type>/page-<n>
//! index/<type>/page-table
//! ```
//!
//! The write half ([`PageWriteDriver`]) and read half ([`PageReadDriver`]) are
//! separate traits so a backend may implement only one of them; the HTTP
//! driver, for instance, is read-only. Every read driver keeps its own
//! request and byte counters, exposed as an [`IoStats`] snapshot.
//!
//! # Example
//!
//! ```
//! use tunedex::storage::memory::MemoryDriver;
//! use tunedex::storage::{PageReadDriver, PageWriteDriver};
//!
//! # async fn example() -> tunedex::error::Result<()> {
//! let driver = MemoryDriver::new();
//! driver.write_page("title", 0, &[1, 0, 0, 0]).await?;
//!
//! let words = driver.read_page("title", 0).await?;
//! assert_eq!(words, vec![1]);
//! assert_eq!(driver.stats().requests, 1);
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;
use std::ops::Add;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunedexError};
use crate::index::page::Page;
use crate::index::page_table::PageTableEntry;

pub mod file;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;

/// Relative location of a page.
pub fn page_path(index_type: &str, page_number: u32) -> String {
    format!("index/{index_type}/page-{page_number}")
}

/// Relative location of a page table.
pub fn page_table_path(index_type: &str) -> String {
    format!("index/{index_type}/page-table")
}

/// Persists pages and page tables.
///
/// Writes overwrite any previous content at the same location, so re-running
/// a build replaces the old bytes.
#[async_trait]
pub trait PageWriteDriver: Send + Sync + Debug {
    /// Persist one page.
    async fn write_page(&self, index_type: &str, page_number: u32, bytes: &[u8]) -> Result<()>;

    /// Persist the serialized page table.
    async fn write_page_table(&self, index_type: &str, bytes: &[u8]) -> Result<()>;
}

/// Fetches pages and page tables.
///
/// A missing resource is reported as [`TunedexError::NotFound`]; drivers
/// never substitute empty data.
#[async_trait]
pub trait PageReadDriver: Send + Sync + Debug {
    /// Fetch the full content of one page.
    async fn read_page(&self, index_type: &str, page_number: u32) -> Result<Page>;

    /// Fetch and decode the page table.
    async fn read_page_table(&self, index_type: &str) -> Result<Vec<PageTableEntry>>;

    /// Cumulative number of successful fetches.
    fn requests(&self) -> u64;

    /// Cumulative number of bytes fetched.
    fn bytes(&self) -> u64;

    /// Snapshot both counters.
    fn stats(&self) -> IoStats {
        IoStats {
            requests: self.requests(),
            bytes: self.bytes(),
        }
    }
}

/// A point-in-time view of a driver's I/O counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoStats {
    pub requests: u64,
    pub bytes: u64,
}

impl IoStats {
    /// Counters accumulated since `before` was taken.
    pub fn delta(&self, before: &IoStats) -> IoStats {
        IoStats {
            requests: self.requests.saturating_sub(before.requests),
            bytes: self.bytes.saturating_sub(before.bytes),
        }
    }
}

impl Add for IoStats {
    type Output = IoStats;

    fn add(self, other: IoStats) -> IoStats {
        IoStats {
            requests: self.requests + other.requests,
            bytes: self.bytes + other.bytes,
        }
    }
}

/// Request and byte counters owned by one driver instance.
#[derive(Debug, Default)]
pub struct IoCounters {
    requests: AtomicU64,
    bytes: AtomicU64,
}

impl IoCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful fetch of `bytes` bytes.
    pub fn record(&self, bytes: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem rooted at a database directory.
    File(file::FileDriverConfig),

    /// Read-only access over HTTP.
    Http(HttpDriverConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File(file::FileDriverConfig::new(PathBuf::from(".")))
    }
}

/// Configuration for the HTTP read driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDriverConfig {
    /// Base URL; pages are fetched from `<base_url>/index/...`.
    pub base_url: String,

    /// Per-request timeout in seconds. `None` waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl HttpDriverConfig {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        HttpDriverConfig {
            base_url: base_url.into(),
            timeout_secs: None,
        }
    }
}

/// Builds drivers from a [`StorageConfig`].
pub struct StorageFactory;

impl StorageFactory {
    /// Create a read driver for the configured backend.
    pub fn create_reader(config: &StorageConfig) -> Result<Arc<dyn PageReadDriver>> {
        match config {
            StorageConfig::File(file_config) => {
                Ok(Arc::new(file::FileDriver::new(file_config.clone())))
            }
            #[cfg(feature = "http")]
            StorageConfig::Http(http_config) => {
                Ok(Arc::new(http::HttpDriver::new(http_config.clone())?))
            }
            #[cfg(not(feature = "http"))]
            StorageConfig::Http(_) => Err(TunedexError::invalid_config(
                "HTTP storage requires the `http` feature",
            )),
        }
    }

    /// Create a write driver for the configured backend.
    pub fn create_writer(config: &StorageConfig) -> Result<Arc<dyn PageWriteDriver>> {
        match config {
            StorageConfig::File(file_config) => {
                Ok(Arc::new(file::FileDriver::new(file_config.clone())))
            }
            StorageConfig::Http(http_config) => Err(TunedexError::invalid_config(format!(
                "HTTP storage at {} is read-only",
                http_config.base_url
            ))),
        }
    }
}
