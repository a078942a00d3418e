//! Term extraction for titles and melodies.
//!
//! Extraction is deterministic: the same input always yields the same terms,
//! so the functions here serve both index builds and queries.

pub mod melody;
pub mod text;

pub use melody::{extract_melody_terms, extract_melody_terms_with_positions, incipit};
pub use text::{extract_text_terms, tokenize_words};
