//! Term and occurrence value types, and the tagged word encoding shared by
//! the index writer and reader.
//!
//! An occurrence is packed into a single 32-bit word:
//!
//! ```text
//!  31        24 23                         0
//! +------------+----------------------------+
//! |  position  |           doc id           |
//! +------------+----------------------------+
//! ```
//!
//! A term record in the page stream is `[term_hi, term_lo, occ.., 0]`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunedexError};

/// A 64-bit opaque term value.
pub type Term = u64;

/// Document identifier, limited to 24 bits.
pub type DocId = u32;

/// Position of a term in a document, limited to 8 bits.
pub type Position = u8;

/// Reserved term marking the end of an index stream.
pub const SENTINEL_TERM: Term = u64::MAX;

/// Largest representable document id.
pub const MAX_DOC_ID: DocId = 0x00FF_FFFF;

/// Size of one occurrence word in bytes.
pub const BYTES_PER_WORD: usize = 4;

/// Word that terminates every term record.
pub const RECORD_TERMINATOR: u32 = 0;

/// Fill pattern for the unused tail of a page.
pub const PAGE_FILL: u32 = u32::MAX;

const DOC_ID_MASK: u32 = 0x00FF_FFFF;
const POSITION_SHIFT: u32 = 24;

/// A (document, position) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Occurrence {
    /// Document the term appears in.
    pub doc_id: DocId,
    /// Position of the term inside the document.
    pub position: Position,
}

impl Occurrence {
    /// Create an occurrence, rejecting document ids wider than 24 bits.
    pub fn new(doc_id: DocId, position: Position) -> Result<Self> {
        if doc_id > MAX_DOC_ID {
            return Err(TunedexError::invalid_argument(format!(
                "doc id {doc_id} exceeds 24 bits"
            )));
        }
        Ok(Occurrence { doc_id, position })
    }

    /// Create an occurrence from an unbounded position, saturating at 255.
    pub fn with_saturating_position(doc_id: DocId, position: usize) -> Result<Self> {
        Self::new(doc_id, saturate_position(position))
    }

    /// Pack into a single tagged word.
    pub fn encode(self) -> u32 {
        (self.doc_id & DOC_ID_MASK) | ((self.position as u32) << POSITION_SHIFT)
    }

    /// Unpack a tagged word.
    pub fn decode(word: u32) -> Self {
        Occurrence {
            doc_id: word & DOC_ID_MASK,
            position: (word >> POSITION_SHIFT) as Position,
        }
    }
}

/// Clamp a position into the 8-bit range.
pub fn saturate_position(position: usize) -> Position {
    position.min(Position::MAX as usize) as Position
}

/// Split a term into its (high, low) words.
pub fn split_term(term: Term) -> (u32, u32) {
    ((term >> 32) as u32, term as u32)
}

/// Join (high, low) words into a term.
pub fn join_term(high: u32, low: u32) -> Term {
    ((high as u64) << 32) | low as u64
}

/// A term together with its occurrence list, as yielded by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntries {
    pub term: Term,
    pub occurrences: Vec<Occurrence>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let occurrence = Occurrence::new(12345, 7).unwrap();
        assert_eq!(occurrence.encode(), 12345 | (7 << 24));
    }

    #[test]
    fn test_decode_reverses_encode_at_bounds() {
        for doc_id in [0, 1, 12345, MAX_DOC_ID - 1, MAX_DOC_ID] {
            for position in [0u8, 1, 127, 128, 254, 255] {
                let occurrence = Occurrence::new(doc_id, position).unwrap();
                assert_eq!(Occurrence::decode(occurrence.encode()), occurrence);
            }
        }
    }

    #[test]
    fn test_doc_id_out_of_range() {
        assert!(Occurrence::new(MAX_DOC_ID + 1, 0).is_err());
    }

    #[test]
    fn test_position_saturates() {
        assert_eq!(saturate_position(3), 3);
        assert_eq!(saturate_position(255), 255);
        assert_eq!(saturate_position(10_000), 255);

        let occurrence = Occurrence::with_saturating_position(9, 300).unwrap();
        assert_eq!(occurrence.position, 255);
    }

    #[test]
    fn test_term_halves() {
        let term = 0x0123_4567_89AB_CDEF;
        let (high, low) = split_term(term);
        assert_eq!(high, 0x0123_4567);
        assert_eq!(low, 0x89AB_CDEF);
        assert_eq!(join_term(high, low), term);

        assert_eq!(split_term(SENTINEL_TERM), (u32::MAX, u32::MAX));
    }
}
