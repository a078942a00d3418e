//! The page table: a sparse directory of `(page number, first term)` pairs.
//!
//! Stored as repeated little-endian `u64` pairs. One entry exists for every
//! page in which at least one term record starts, ordered by page number
//! and therefore by term.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunedexError};
use crate::index::term::Term;

const ENTRY_BYTES: usize = 16;

/// One directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTableEntry {
    pub page_number: u64,
    pub first_term: Term,
}

impl PageTableEntry {
    pub fn new(page_number: u64, first_term: Term) -> Self {
        PageTableEntry {
            page_number,
            first_term,
        }
    }
}

/// Serialize a page table.
pub fn encode_page_table(entries: &[PageTableEntry]) -> Vec<u8> {
    let mut bytes = vec![0u8; entries.len() * ENTRY_BYTES];
    for (entry, chunk) in entries.iter().zip(bytes.chunks_exact_mut(ENTRY_BYTES)) {
        LittleEndian::write_u64(&mut chunk[..8], entry.page_number);
        LittleEndian::write_u64(&mut chunk[8..], entry.first_term);
    }
    bytes
}

/// Deserialize a page table.
pub fn decode_page_table(bytes: &[u8]) -> Result<Vec<PageTableEntry>> {
    if bytes.len() % ENTRY_BYTES != 0 {
        return Err(TunedexError::corrupt(format!(
            "page table length {} is not a multiple of {ENTRY_BYTES}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(ENTRY_BYTES)
        .map(|chunk| {
            PageTableEntry::new(
                LittleEndian::read_u64(&chunk[..8]),
                LittleEndian::read_u64(&chunk[8..]),
            )
        })
        .collect())
}

/// Position of the last entry whose first term is `<= term`.
///
/// Returns `None` when `term` sorts before every page.
pub fn index_for_term(entries: &[PageTableEntry], term: Term) -> Option<usize> {
    entries
        .partition_point(|entry| entry.first_term <= term)
        .checked_sub(1)
}

/// Find the last entry whose first term is `<= term`.
pub fn entry_for_term(entries: &[PageTableEntry], term: Term) -> Option<PageTableEntry> {
    index_for_term(entries, term).map(|i| entries[i])
}
