//! Paged inverted index.
//!
//! An index is a sequence of fixed-size pages holding ascending term records,
//! plus a sparse page table mapping each page to the first term whose record
//! starts there.

pub mod page;
pub mod page_table;
pub mod reader;
pub mod term;
pub mod writer;

// Re-export commonly used types
pub use page_table::PageTableEntry;
pub use reader::{IndexReader, PageCursor};
pub use term::{DocId, Occurrence, Position, SENTINEL_TERM, Term, TermEntries};
pub use writer::{IndexWriter, TermOccurrences, WriteSummary};
