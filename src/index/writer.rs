//! Index writer: packs an ascending stream of term records into fixed-size
//! pages and builds the page table alongside.
//!
//! Pages are filled strictly in ascending term order. The writer rolls to a
//! new page word by word, so a term record may straddle a page boundary; a
//! record whose occurrence list is larger than a page simply spans several.
//! The stream ends with the two-word sentinel term and no terminator.

use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunedexError};
use crate::index::page::{encode_page, page_size_in_words};
use crate::index::page_table::{PageTableEntry, encode_page_table};
use crate::index::term::{
    Occurrence, PAGE_FILL, RECORD_TERMINATOR, SENTINEL_TERM, Term, split_term,
};
use crate::storage::PageWriteDriver;

/// Unordered mapping from term to its occurrence list.
pub type TermOccurrences = AHashMap<Term, Vec<Occurrence>>;

/// Counts reported once a write pass is finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub terms_written: u64,
    pub occurrences_written: u64,
    pub pages_written: u64,
    /// Terms dropped because they collide with the sentinel.
    pub skipped_terms: u64,
    /// Occurrences dropped because they encode to the record terminator.
    pub skipped_occurrences: u64,
}

impl WriteSummary {
    /// Whether any input was dropped during the pass.
    pub fn is_lossless(&self) -> bool {
        self.skipped_terms == 0 && self.skipped_occurrences == 0
    }
}

/// Writes one index type in a single pass.
///
/// ```
/// use std::sync::Arc;
/// use tunedex::index::term::Occurrence;
/// use tunedex::index::writer::IndexWriter;
/// use tunedex::storage::memory::MemoryDriver;
///
/// # async fn example() -> tunedex::error::Result<()> {
/// let driver = Arc::new(MemoryDriver::new());
/// let mut writer = IndexWriter::new("title", driver, 1024)?;
/// writer.write_for_term(42, &[Occurrence::new(7, 0)?]).await?;
/// let summary = writer.finish().await?;
/// assert_eq!(summary.terms_written, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IndexWriter {
    index_type: String,
    driver: Arc<dyn PageWriteDriver>,
    /// Capacity of a page in words.
    page_size: usize,
    page_number: u32,
    /// Next free word in `buffer`.
    cursor: usize,
    buffer: Vec<u32>,
    page_table: Vec<PageTableEntry>,
    last_term: Option<Term>,
    /// Whether a term record has started in the current page.
    term_started: bool,
    summary: WriteSummary,
}

impl IndexWriter {
    /// Create a writer. `page_size_bytes` must be a positive multiple of 4.
    pub fn new<S: Into<String>>(
        index_type: S,
        driver: Arc<dyn PageWriteDriver>,
        page_size_bytes: usize,
    ) -> Result<Self> {
        let page_size = page_size_in_words(page_size_bytes)?;
        Ok(IndexWriter {
            index_type: index_type.into(),
            driver,
            page_size,
            page_number: 0,
            cursor: 0,
            buffer: vec![PAGE_FILL; page_size],
            page_table: Vec::new(),
            last_term: None,
            term_started: false,
            summary: WriteSummary::default(),
        })
    }

    pub fn index_type(&self) -> &str {
        &self.index_type
    }

    /// The page table built so far.
    pub fn page_table(&self) -> &[PageTableEntry] {
        &self.page_table
    }

    /// Write a whole mapping in ascending term order and finish the index.
    pub async fn write(mut self, term_occurrences: &TermOccurrences) -> Result<WriteSummary> {
        let mut records: Vec<(Term, &[Occurrence])> = term_occurrences
            .iter()
            .map(|(term, list)| (*term, list.as_slice()))
            .collect();
        records.sort_unstable_by_key(|(term, _)| *term);

        info!(
            "Write index {} with {} terms, page size {} bytes",
            self.index_type,
            records.len(),
            self.page_size * 4
        );

        for (term, occurrences) in records {
            self.write_for_term(term, occurrences).await?;
        }

        self.finish().await
    }

    /// Append the record for one term.
    ///
    /// Terms must arrive strictly ascending; a regression is an error and
    /// nothing is written. The sentinel term is skipped with a warning.
    pub async fn write_for_term(&mut self, term: Term, occurrences: &[Occurrence]) -> Result<()> {
        if term == SENTINEL_TERM {
            warn!(
                "Skipping term {term:#x} in index {}: it collides with the end-of-index sentinel",
                self.index_type
            );
            self.summary.skipped_terms += 1;
            return Ok(());
        }

        if let Some(previous) = self.last_term {
            if term <= previous {
                return Err(TunedexError::NonMonotonicTerm { previous, term });
            }
        }

        // The record starts on whichever page receives its first word.
        self.roll_if_full().await?;
        if !self.term_started {
            self.page_table
                .push(PageTableEntry::new(self.page_number as u64, term));
            self.term_started = true;
        }

        let (high, low) = split_term(term);
        self.write_word(high).await?;
        self.write_word(low).await?;

        for occurrence in occurrences {
            let word = occurrence.encode();
            if word == RECORD_TERMINATOR {
                warn!(
                    "Skipping occurrence {occurrence:?} of term {term} in index {}: it encodes to the record terminator",
                    self.index_type
                );
                self.summary.skipped_occurrences += 1;
                continue;
            }
            self.write_word(word).await?;
            self.summary.occurrences_written += 1;
        }

        self.write_word(RECORD_TERMINATOR).await?;

        self.last_term = Some(term);
        self.summary.terms_written += 1;
        Ok(())
    }

    /// Write the sentinel, flush the last page and persist the page table.
    pub async fn finish(mut self) -> Result<WriteSummary> {
        let (high, low) = split_term(SENTINEL_TERM);
        self.write_word(high).await?;
        self.write_word(low).await?;
        self.flush_page().await?;

        let table = encode_page_table(&self.page_table);
        self.driver
            .write_page_table(&self.index_type, &table)
            .await?;

        info!(
            "Finished index {}: {} terms, {} occurrences, {} pages, {} page table entries",
            self.index_type,
            self.summary.terms_written,
            self.summary.occurrences_written,
            self.summary.pages_written,
            self.page_table.len()
        );
        if !self.summary.is_lossless() {
            warn!(
                "Index {} dropped {} terms and {} occurrences",
                self.index_type, self.summary.skipped_terms, self.summary.skipped_occurrences
            );
        }

        Ok(self.summary)
    }

    async fn write_word(&mut self, word: u32) -> Result<()> {
        self.roll_if_full().await?;
        self.buffer[self.cursor] = word;
        self.cursor += 1;
        Ok(())
    }

    async fn roll_if_full(&mut self) -> Result<()> {
        if self.cursor < self.page_size {
            return Ok(());
        }
        self.flush_page().await?;
        self.page_number += 1;
        self.term_started = false;
        self.cursor = 0;
        self.buffer.fill(PAGE_FILL);
        Ok(())
    }

    async fn flush_page(&mut self) -> Result<()> {
        debug!(
            "Flush page {} of index {} ({} of {} words used)",
            self.page_number, self.index_type, self.cursor, self.page_size
        );
        self.driver
            .write_page(&self.index_type, self.page_number, &encode_page(&self.buffer))
            .await?;
        self.summary.pages_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::page::decode_page;
    use crate::index::page_table::decode_page_table;
    use crate::storage::memory::MemoryDriver;

    fn occurrences(docs: &[u32]) -> Vec<Occurrence> {
        docs.iter().map(|&d| Occurrence::new(d, 1).unwrap()).collect()
    }

    fn page_words(driver: &MemoryDriver, name: &str) -> Vec<u32> {
        decode_page(&driver.get(name).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_page_size_must_be_word_aligned() {
        let driver = Arc::new(MemoryDriver::new());
        assert!(IndexWriter::new("title", driver.clone(), 0).is_err());
        assert!(IndexWriter::new("title", driver.clone(), 30).is_err());
        assert!(IndexWriter::new("title", driver, 32).is_ok());
    }

    #[tokio::test]
    async fn test_record_layout() {
        let driver = Arc::new(MemoryDriver::new());
        let mut writer = IndexWriter::new("title", driver.clone(), 64).unwrap();
        writer
            .write_for_term(0x1_0000_0002, &[Occurrence::new(5, 3).unwrap()])
            .await
            .unwrap();
        let summary = writer.finish().await.unwrap();

        let words = page_words(&driver, "index/title/page-0");
        assert_eq!(words.len(), 16);
        assert_eq!(
            &words[..6],
            &[1, 2, 5 | (3 << 24), 0, u32::MAX, u32::MAX]
        );
        // Unused tail keeps the fill pattern.
        assert!(words[6..].iter().all(|&w| w == PAGE_FILL));

        assert_eq!(summary.terms_written, 1);
        assert_eq!(summary.pages_written, 1);

        let table = decode_page_table(&driver.get("index/title/page-table").unwrap()).unwrap();
        assert_eq!(table, vec![PageTableEntry::new(0, 0x1_0000_0002)]);
    }

    #[tokio::test]
    async fn test_monotonicity() {
        let driver = Arc::new(MemoryDriver::new());
        let mut writer = IndexWriter::new("title", driver, 64).unwrap();

        writer.write_for_term(10, &occurrences(&[1])).await.unwrap();
        writer.write_for_term(11, &occurrences(&[1])).await.unwrap();

        let err = writer.write_for_term(11, &occurrences(&[2])).await.unwrap_err();
        assert!(matches!(
            err,
            TunedexError::NonMonotonicTerm {
                previous: 11,
                term: 11
            }
        ));
        let err = writer.write_for_term(3, &occurrences(&[2])).await.unwrap_err();
        assert!(matches!(err, TunedexError::NonMonotonicTerm { .. }));

        writer.write_for_term(12, &occurrences(&[2])).await.unwrap();
    }

    #[tokio::test]
    async fn test_sentinel_term_is_skipped() {
        let driver = Arc::new(MemoryDriver::new());
        let mut writer = IndexWriter::new("title", driver.clone(), 64).unwrap();

        writer.write_for_term(5, &occurrences(&[1])).await.unwrap();
        writer
            .write_for_term(SENTINEL_TERM, &occurrences(&[2]))
            .await
            .unwrap();
        let summary = writer.finish().await.unwrap();

        assert_eq!(summary.terms_written, 1);
        assert_eq!(summary.skipped_terms, 1);
        assert!(!summary.is_lossless());

        let words = page_words(&driver, "index/title/page-0");
        assert_eq!(&words[..6], &[0, 5, 1 | (1 << 24), 0, u32::MAX, u32::MAX]);
    }

    #[tokio::test]
    async fn test_zero_occurrence_is_skipped() {
        let driver = Arc::new(MemoryDriver::new());
        let mut writer = IndexWriter::new("title", driver.clone(), 64).unwrap();

        let list = vec![Occurrence::new(0, 0).unwrap(), Occurrence::new(0, 1).unwrap()];
        writer.write_for_term(5, &list).await.unwrap();
        let summary = writer.finish().await.unwrap();

        assert_eq!(summary.skipped_occurrences, 1);
        assert_eq!(summary.occurrences_written, 1);
        let words = page_words(&driver, "index/title/page-0");
        assert_eq!(&words[..4], &[0, 5, 1 << 24, 0]);
    }

    #[tokio::test]
    async fn test_rollover_and_page_table() {
        let driver = Arc::new(MemoryDriver::new());
        // Four words per page.
        let mut writer = IndexWriter::new("melody", driver.clone(), 16).unwrap();

        // Each record is 2 + 1 + 1 = 4 words: exactly one per page.
        writer.write_for_term(100, &occurrences(&[1])).await.unwrap();
        writer.write_for_term(200, &occurrences(&[2])).await.unwrap();
        // Six words: starts on page 2 and straddles into page 3.
        writer.write_for_term(300, &occurrences(&[3, 4, 5])).await.unwrap();
        // Starts mid page 3.
        writer.write_for_term(400, &occurrences(&[6])).await.unwrap();
        let summary = writer.finish().await.unwrap();

        let table = decode_page_table(&driver.get("index/melody/page-table").unwrap()).unwrap();
        assert_eq!(
            table,
            vec![
                PageTableEntry::new(0, 100),
                PageTableEntry::new(1, 200),
                PageTableEntry::new(2, 300),
                PageTableEntry::new(3, 400),
            ]
        );
        assert_eq!(page_words(&driver, "index/melody/page-2"), vec![0, 300, 3 | (1 << 24), 4 | (1 << 24)]);
        assert_eq!(page_words(&driver, "index/melody/page-3"), vec![5 | (1 << 24), 0, 0, 400]);
        assert_eq!(
            page_words(&driver, "index/melody/page-4"),
            vec![6 | (1 << 24), 0, u32::MAX, u32::MAX]
        );
        assert_eq!(summary.pages_written, 5);
    }

    #[tokio::test]
    async fn test_page_without_record_start_has_no_entry() {
        let driver = Arc::new(MemoryDriver::new());
        let mut writer = IndexWriter::new("melody", driver.clone(), 8).unwrap();

        // 2 + 5 + 1 = 8 words over two-word pages: pages 0..=3, only page 0 starts a record.
        writer
            .write_for_term(7, &occurrences(&[1, 2, 3, 4, 5]))
            .await
            .unwrap();
        writer.write_for_term(8, &occurrences(&[6])).await.unwrap();
        writer.finish().await.unwrap();

        let table = decode_page_table(&driver.get("index/melody/page-table").unwrap()).unwrap();
        assert_eq!(
            table,
            vec![PageTableEntry::new(0, 7), PageTableEntry::new(4, 8)]
        );
    }

    #[tokio::test]
    async fn test_write_sorts_terms() {
        let driver = Arc::new(MemoryDriver::new());
        let writer = IndexWriter::new("title", driver.clone(), 1024).unwrap();

        let mut input = TermOccurrences::default();
        input.insert(30, occurrences(&[3]));
        input.insert(10, occurrences(&[1]));
        input.insert(20, occurrences(&[2]));

        let summary = writer.write(&input).await.unwrap();
        assert_eq!(summary.terms_written, 3);

        let words = page_words(&driver, "index/title/page-0");
        assert_eq!(&words[..4], &[0, 10, 1 | (1 << 24), 0]);
        assert_eq!(&words[4..8], &[0, 20, 2 | (1 << 24), 0]);
        assert_eq!(&words[8..12], &[0, 30, 3 | (1 << 24), 0]);
    }
}
