//! Page byte layout: a flat run of little-endian 32-bit words.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, TunedexError};
use crate::index::term::BYTES_PER_WORD;

/// The words of one fetched page.
pub type Page = Vec<u32>;

/// Serialize page words to bytes.
pub fn encode_page(words: &[u32]) -> Vec<u8> {
    let mut bytes = vec![0u8; words.len() * BYTES_PER_WORD];
    LittleEndian::write_u32_into(words, &mut bytes);
    bytes
}

/// Deserialize page bytes to words.
pub fn decode_page(bytes: &[u8]) -> Result<Page> {
    if bytes.len() % BYTES_PER_WORD != 0 {
        return Err(TunedexError::corrupt(format!(
            "page length {} is not a multiple of {BYTES_PER_WORD}",
            bytes.len()
        )));
    }
    let mut words = vec![0u32; bytes.len() / BYTES_PER_WORD];
    LittleEndian::read_u32_into(bytes, &mut words);
    Ok(words)
}

/// Validate a page size in bytes and convert it to words.
pub fn page_size_in_words(page_size_bytes: usize) -> Result<usize> {
    if page_size_bytes == 0 || page_size_bytes % BYTES_PER_WORD != 0 {
        return Err(TunedexError::invalid_config(format!(
            "page size {page_size_bytes} must be a positive multiple of {BYTES_PER_WORD} bytes"
        )));
    }
    Ok(page_size_bytes / BYTES_PER_WORD)
}
