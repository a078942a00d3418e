//! Title text terms.
//!
//! Text is split on Unicode word boundaries (UAX #29), lowercased, lightly
//! stemmed and deduplicated. Each remaining token becomes one term holding
//! its first nine characters as 7-bit codes.
//!
//! ```
//! use tunedex::analysis::text::{extract_text_terms, tokenize_words};
//!
//! assert_eq!(tokenize_words("The Kesh Jig"), vec!["kesh", "jig"]);
//!
//! let terms = extract_text_terms(&["The Kesh Jig", "Kesh"]);
//! assert_eq!(terms.len(), 2);
//! assert_eq!(terms[1].1, 1);
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::index::term::{Position, Term, saturate_position};

/// Words dropped entirely.
const STOP_WORDS: &[&str] = &["the", "is", "it"];

/// Suffixes stripped in this order; each applies if still present.
const SUFFIXES: &[&str] = &["s", "ed", "ing", "ly", "es"];

/// Tokens with letters shorter than this are dropped.
const MIN_WORD_CHARS: usize = 3;

/// Characters packed into one term.
const CHARS_PER_TERM: usize = 9;

const BITS_PER_CHAR: usize = 7;

/// Split text into normalized, deduplicated tokens in first-seen order.
pub fn tokenize_words(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    for word in text.unicode_words() {
        let word = word.to_lowercase();

        // Short numbers are kept; they are useful in titles.
        if word.chars().count() < MIN_WORD_CHARS && word.chars().any(char::is_alphabetic) {
            continue;
        }
        if STOP_WORDS.contains(&word.as_str()) {
            continue;
        }

        let mut stem = word.as_str();
        for suffix in SUFFIXES {
            if let Some(stripped) = stem.strip_suffix(suffix) {
                stem = stripped;
            }
        }
        if stem.is_empty() {
            continue;
        }

        if !tokens.iter().any(|t| t == stem) {
            tokens.push(stem.to_string());
        }
    }

    tokens
}

/// Pack the leading characters of a token into a term.
pub fn token_term(token: &str) -> Term {
    token
        .chars()
        .take(CHARS_PER_TERM)
        .enumerate()
        .fold(0, |term, (i, c)| {
            term | (((c as u32 & 0x7F) as Term) << (i * BITS_PER_CHAR))
        })
}

/// Extract `(term, position)` pairs from one or more strings.
///
/// The inputs are joined before tokenizing, so alternative spellings of the
/// same title share one set of deduplicated tokens.
pub fn extract_text_terms<S: AsRef<str>>(inputs: &[S]) -> Vec<(Term, Position)> {
    let combined = inputs
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(" ");

    tokenize_words(&combined)
        .iter()
        .enumerate()
        .map(|(i, token)| (token_term(token), saturate_position(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize_words("The Banks of the Lee"),
            vec!["bank", "lee"]
        );
        assert_eq!(tokenize_words("Drowsy Maggie"), vec!["drowsy", "maggie"]);
        // Suffixes are stripped in sequence.
        assert_eq!(tokenize_words("dancing"), vec!["danc"]);
        assert_eq!(tokenize_words("Jigs, reels; hornpipes!"), vec!["jig", "reel", "hornpipe"]);
    }

    #[test]
    fn test_short_words_and_numbers() {
        assert_eq!(tokenize_words("an ox in 42"), vec!["42"]);
        assert!(tokenize_words("ing").is_empty());
    }

    #[test]
    fn test_dedup_keeps_first() {
        assert_eq!(tokenize_words("Reel reels REEL"), vec!["reel"]);
    }

    #[test]
    fn test_token_term_packing() {
        assert_eq!(token_term("a"), 0x61);
        assert_eq!(token_term("ab"), 0x61 | (0x62 << 7));
        // Only the first nine characters count.
        assert_eq!(token_term("abcdefghij"), token_term("abcdefghi"));
        assert_ne!(token_term("abcdefghi"), token_term("abcdefgh"));
    }

    #[test]
    fn test_extract_positions() {
        let terms = extract_text_terms(&["Kesh Jig", "The Kesh"]);
        assert_eq!(
            terms,
            vec![(token_term("kesh"), 0), (token_term("jig"), 1)]
        );
        assert!(extract_text_terms::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_position_saturates() {
        let text: Vec<String> = (0..300).map(|i| format!("word{i}")).collect();
        let terms = extract_text_terms(&text);
        assert_eq!(terms.len(), 300);
        assert_eq!(terms[299].1, 255);
    }
}
