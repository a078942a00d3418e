//! # Tunedex
//!
//! Paged inverted indexes over a tune collection.
//!
//! ## Features
//!
//! - Compact binary pages of ascending term records plus a sparse page table
//! - Term lookup that fetches only the pages it needs
//! - Interchangeable storage drivers: local files, HTTP, memory
//! - Match-count scoring merged across title and melody indexes
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tunedex::index::{IndexWriter, Occurrence, TermOccurrences};
//! use tunedex::search::{IndexSearchQuery, SearchService};
//! use tunedex::storage::memory::MemoryDriver;
//!
//! # async fn example() -> tunedex::error::Result<()> {
//! let driver = MemoryDriver::new();
//!
//! let mut terms = TermOccurrences::default();
//! terms.insert(42, vec![Occurrence::new(5, 0)?, Occurrence::new(9, 0)?]);
//! IndexWriter::new("title", Arc::new(driver.share()), 1024)?
//!     .write(&terms)
//!     .await?;
//!
//! let service = SearchService::open(Arc::new(driver), &["title"], 1024).await?;
//! let result = service
//!     .search(&[IndexSearchQuery::new("title", vec![42])])
//!     .await?;
//! assert_eq!(result.hits.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod search;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
