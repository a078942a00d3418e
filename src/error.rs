//! Error types for the Tunedex library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`TunedexError`] enum. Absence of a stored resource ([`TunedexError::NotFound`])
//! is kept apart from damaged data ([`TunedexError::Corrupt`]) so callers can
//! tell "no data" from "data loss".
//!
//! # Examples
//!
//! ```
//! use tunedex::error::{TunedexError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(TunedexError::invalid_config("page size must be a multiple of 4"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

use crate::index::term::Term;

/// The main error type for Tunedex operations.
#[derive(Error, Debug)]
pub enum TunedexError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A page or page table does not exist in the backing store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored bytes do not match the expected layout.
    #[error("Corrupt index data: {0}")]
    Corrupt(String),

    /// Invalid configuration (page size, storage settings).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Terms handed to the writer were not strictly ascending.
    #[error("Term {term} is not greater than previously written term {previous}")]
    NonMonotonicTerm { previous: Term, term: Term },

    /// A search query named an index type that the service does not hold.
    #[error("Unknown index type: {0}")]
    UnknownIndexType(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with TunedexError.
pub type Result<T> = std::result::Result<T, TunedexError>;

impl TunedexError {
    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        TunedexError::NotFound(msg.into())
    }

    /// Create a new corrupt data error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        TunedexError::Corrupt(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        TunedexError::InvalidConfig(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        TunedexError::Storage(msg.into())
    }

    /// Create a new HTTP error.
    pub fn http<S: Into<String>>(msg: S) -> Self {
        TunedexError::Http(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TunedexError::InvalidArgument(msg.into())
    }

    /// Whether this error reports a missing resource rather than a failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            TunedexError::NotFound(_) => true,
            TunedexError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Map an I/O error on `resource`, keeping `NotFound` distinguishable.
    pub(crate) fn from_io(resource: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            TunedexError::NotFound(resource.to_string())
        } else {
            TunedexError::Io(err)
        }
    }
}
