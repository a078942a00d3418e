//! Index reader: resolves terms through the page table and scans pages.
//!
//! Pages form one virtual word address space: address `a` lives on page
//! `a / page_size` at offset `a % page_size`. A [`PageCursor`] walks that
//! space and fetches pages on demand, so records that straddle page
//! boundaries are read transparently.
//!
//! A page may open with the tail of an earlier record, and those words can
//! look like a record start. The first record of a page is therefore found
//! by skipping whole records forward from a known boundary: address 0, or
//! the first record of an earlier page that was already located.
//!
//! The reader memoizes the page table, every fetched page and every located
//! first record. Concurrent lookups that need the same page share one fetch.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use futures::Stream;
use futures::stream;
use log::debug;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::error::{Result, TunedexError};
use crate::index::page::{Page, page_size_in_words};
use crate::index::page_table::{PageTableEntry, entry_for_term, index_for_term};
use crate::index::term::{
    Occurrence, RECORD_TERMINATOR, SENTINEL_TERM, Term, TermEntries, join_term,
};
use crate::storage::PageReadDriver;

/// Absolute word address in an index.
pub type Address = u64;

/// Read access to one index type.
#[derive(Debug)]
pub struct IndexReader {
    index_type: String,
    driver: Arc<dyn PageReadDriver>,
    /// Page size in words.
    page_size: usize,
    page_table: OnceCell<Arc<Vec<PageTableEntry>>>,
    pages: Mutex<AHashMap<u32, Arc<OnceCell<Arc<Page>>>>>,
    /// Address of the first record of each located page table entry.
    record_starts: Mutex<BTreeMap<usize, Address>>,
}

impl IndexReader {
    /// Create a reader without touching storage.
    ///
    /// The page table is fetched on first use; [`open`](Self::open) fetches
    /// it up front.
    pub fn new<S: Into<String>>(
        index_type: S,
        driver: Arc<dyn PageReadDriver>,
        page_size_bytes: usize,
    ) -> Result<Self> {
        Ok(IndexReader {
            index_type: index_type.into(),
            driver,
            page_size: page_size_in_words(page_size_bytes)?,
            page_table: OnceCell::new(),
            pages: Mutex::new(AHashMap::new()),
            record_starts: Mutex::new(BTreeMap::new()),
        })
    }

    /// Create a reader and load its page table up front.
    pub async fn open<S: Into<String>>(
        index_type: S,
        driver: Arc<dyn PageReadDriver>,
        page_size_bytes: usize,
    ) -> Result<Self> {
        let reader = Self::new(index_type, driver, page_size_bytes)?;
        reader.page_table().await?;
        Ok(reader)
    }

    pub fn index_type(&self) -> &str {
        &self.index_type
    }

    /// Page size in words.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn driver(&self) -> &Arc<dyn PageReadDriver> {
        &self.driver
    }

    /// The page table, fetched at most once.
    pub async fn page_table(&self) -> Result<Arc<Vec<PageTableEntry>>> {
        self.page_table
            .get_or_try_init(|| async {
                let entries = self.driver.read_page_table(&self.index_type).await?;
                debug!(
                    "Loaded page table of {} with {} entries",
                    self.index_type,
                    entries.len()
                );
                Ok::<_, TunedexError>(Arc::new(entries))
            })
            .await
            .cloned()
    }

    /// The page table entry of the page that may hold `term`.
    pub async fn entry_for_term(&self, term: Term) -> Result<Option<PageTableEntry>> {
        Ok(entry_for_term(&self.page_table().await?, term))
    }

    /// The page that may hold `term`, or `None` if it sorts before every page.
    pub async fn page_id_for_term(&self, term: Term) -> Result<Option<u32>> {
        self.entry_for_term(term)
            .await?
            .map(|entry| page_number(&entry))
            .transpose()
    }

    /// Fetch a page, sharing in-flight and completed fetches.
    pub async fn page(&self, page_id: u32) -> Result<Arc<Page>> {
        let cell = Arc::clone(self.pages.lock().entry(page_id).or_default());
        cell.get_or_try_init(|| async {
            let page = self.driver.read_page(&self.index_type, page_id).await?;
            debug!(
                "Fetched page {page_id} of {} ({} words)",
                self.index_type,
                page.len()
            );
            Ok::<_, TunedexError>(Arc::new(page))
        })
        .await
        .cloned()
    }

    /// Number of pages held in the cache.
    pub fn cached_pages(&self) -> usize {
        self.pages
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// A cursor positioned before any page is fetched.
    pub fn cursor(&self) -> PageCursor<'_> {
        PageCursor {
            reader: self,
            address: 0,
            page_id: 0,
            offset: 0,
            page: None,
        }
    }

    /// Address of the first record that starts in the page of page table
    /// entry `index`.
    pub async fn record_start(&self, index: usize) -> Result<Address> {
        let table = self.page_table().await?;
        if index >= table.len() {
            return Err(TunedexError::invalid_argument(format!(
                "page table of {} has {} entries, no entry {index}",
                self.index_type,
                table.len()
            )));
        }

        let known = self
            .record_starts
            .lock()
            .range(..=index)
            .next_back()
            .map(|(&located, &address)| (located, address));
        let (mut next, address) = match known {
            Some((located, address)) if located == index => return Ok(address),
            Some((located, address)) => (located + 1, address),
            None => (0, 0),
        };

        let mut cursor = self.cursor();
        cursor.jump(address).await?;
        while next <= index {
            cursor.seek_first_record(&table[next]).await?;
            self.record_starts.lock().insert(next, cursor.address());
            next += 1;
        }
        debug!(
            "Located first record of page {} of {} at address {}",
            table[index].page_number,
            self.index_type,
            cursor.address()
        );
        Ok(cursor.address())
    }

    /// Scan the whole index from address 0.
    pub async fn scan_all(&self) -> Result<impl Stream<Item = Result<TermEntries>> + '_> {
        let mut cursor = self.cursor();
        cursor.jump(0).await?;
        Ok(cursor.scan())
    }

    /// Look up the occurrence list of `term`.
    ///
    /// Returns `Ok(None)` when the term is not in the index. Storage
    /// failures and damaged pages are errors.
    pub async fn fetch_term_entries(&self, term: Term) -> Result<Option<Vec<Occurrence>>> {
        let table = self.page_table().await?;
        let Some(index) = index_for_term(&table, term) else {
            return Ok(None);
        };

        let start = self.record_start(index).await?;
        let mut cursor = self.cursor();
        cursor.jump(start).await?;

        loop {
            let found = cursor.read_term().await?;
            if found == SENTINEL_TERM || found > term {
                return Ok(None);
            }
            if found == term {
                return cursor.read_entry_list().await.map(Some);
            }
            cursor.find_next_term().await?;
        }
    }
}

fn page_number(entry: &PageTableEntry) -> Result<u32> {
    u32::try_from(entry.page_number).map_err(|_| {
        TunedexError::corrupt(format!("page number {} out of range", entry.page_number))
    })
}

/// A read position in an index's virtual word space.
#[derive(Debug)]
pub struct PageCursor<'a> {
    reader: &'a IndexReader,
    address: Address,
    page_id: u32,
    offset: usize,
    page: Option<Arc<Page>>,
}

impl<'a> PageCursor<'a> {
    /// Current absolute word address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Move to `address`, fetching its page if needed.
    pub async fn jump(&mut self, address: Address) -> Result<()> {
        let page_size = self.reader.page_size as u64;
        let page_id = u32::try_from(address / page_size).map_err(|_| {
            TunedexError::corrupt(format!("address {address} is beyond the last page"))
        })?;

        if self.page.is_none() || page_id != self.page_id {
            self.page = Some(self.reader.page(page_id).await?);
            self.page_id = page_id;
        }
        self.address = address;
        self.offset = (address % page_size) as usize;
        Ok(())
    }

    /// Read one word and advance.
    pub async fn read_u32(&mut self) -> Result<u32> {
        if self.page.is_none() || self.offset >= self.reader.page_size {
            self.jump(self.address).await?;
        }

        let word = self
            .page
            .as_ref()
            .and_then(|page| page.get(self.offset).copied())
            .ok_or_else(|| {
                TunedexError::corrupt(format!(
                    "read past end of page {} of index {}",
                    self.page_id, self.reader.index_type
                ))
            })?;

        self.address += 1;
        self.offset += 1;
        Ok(word)
    }

    /// Read a two-word term, high half first.
    pub async fn read_term(&mut self) -> Result<Term> {
        let high = self.read_u32().await?;
        let low = self.read_u32().await?;
        Ok(join_term(high, low))
    }

    /// Advance past the next record terminator.
    pub async fn find_next_term(&mut self) -> Result<()> {
        while self.read_u32().await? != RECORD_TERMINATOR {}
        Ok(())
    }

    /// Read tagged occurrences up to and including the terminator.
    pub async fn read_entry_list(&mut self) -> Result<Vec<Occurrence>> {
        let mut occurrences = Vec::new();
        loop {
            let word = self.read_u32().await?;
            if word == RECORD_TERMINATOR {
                return Ok(occurrences);
            }
            occurrences.push(Occurrence::decode(word));
        }
    }

    /// Read the record at the cursor; `None` at the sentinel.
    pub async fn next_entry(&mut self) -> Result<Option<TermEntries>> {
        let term = self.read_term().await?;
        if term == SENTINEL_TERM {
            return Ok(None);
        }
        let occurrences = self.read_entry_list().await?;
        Ok(Some(TermEntries { term, occurrences }))
    }

    /// Skip whole records until one starts in `entry`'s page and leave the
    /// cursor on it.
    ///
    /// The cursor must sit on a record boundary at or before that page. The
    /// located record must carry the page table's first term.
    pub async fn seek_first_record(&mut self, entry: &PageTableEntry) -> Result<()> {
        let page_size = self.reader.page_size as Address;
        let start = page_number(entry)? as Address * page_size;

        loop {
            let record = self.address;
            let term = self.read_term().await?;
            if record >= start {
                if term != entry.first_term || record >= start + page_size {
                    return Err(TunedexError::corrupt(format!(
                        "page {} of index {} should start term {} but term {term} starts at address {record}",
                        entry.page_number, self.reader.index_type, entry.first_term
                    )));
                }
                return self.jump(record).await;
            }
            if term == SENTINEL_TERM {
                return Err(TunedexError::corrupt(format!(
                    "index {} ends before page {}",
                    self.reader.index_type, entry.page_number
                )));
            }
            self.find_next_term().await?;
        }
    }

    /// Stream records from the cursor until the sentinel.
    ///
    /// The cursor must sit on a record boundary (address 0, a position from
    /// [`IndexReader::record_start`], or just after a complete record). A
    /// clean end at the sentinel closes the stream; a fault yields one `Err`
    /// and then closes it.
    pub fn scan(self) -> impl Stream<Item = Result<TermEntries>> + 'a {
        stream::unfold(Some(self), |state| async move {
            let mut cursor = state?;
            match cursor.next_entry().await {
                Ok(Some(entries)) => Some((Ok(entries), Some(cursor))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer::{IndexWriter, TermOccurrences};
    use crate::storage::PageWriteDriver;
    use crate::storage::memory::MemoryDriver;
    use futures::TryStreamExt;

    fn occurrences(docs: &[u32]) -> Vec<Occurrence> {
        docs.iter()
            .enumerate()
            .map(|(i, &d)| Occurrence::new(d, i as u8).unwrap())
            .collect()
    }

    async fn build(page_size_bytes: usize, input: &TermOccurrences) -> MemoryDriver {
        let driver = MemoryDriver::new();
        let writer = IndexWriter::new("title", Arc::new(driver.share()), page_size_bytes).unwrap();
        writer.write(input).await.unwrap();
        driver
    }

    fn sample() -> TermOccurrences {
        let mut input = TermOccurrences::default();
        input.insert(100, occurrences(&[1, 2]));
        input.insert(200, occurrences(&[3]));
        input.insert(300, occurrences(&[4, 5, 6, 7, 8]));
        input.insert(400, occurrences(&[9]));
        input.insert(0x7_0000_0000, occurrences(&[10, 11]));
        input
    }

    #[tokio::test]
    async fn test_invalid_page_size() {
        let driver = Arc::new(MemoryDriver::new());
        assert!(IndexReader::new("title", driver.clone(), 0).is_err());
        assert!(IndexReader::new("title", driver, 6).is_err());
    }

    #[tokio::test]
    async fn test_scan_all_in_order() {
        let input = sample();
        let driver = build(20, &input).await;
        let reader = IndexReader::new("title", Arc::new(driver), 20).unwrap();

        let scanned: Vec<TermEntries> = reader.scan_all().await.unwrap().try_collect().await.unwrap();
        let terms: Vec<Term> = scanned.iter().map(|e| e.term).collect();
        assert_eq!(terms, vec![100, 200, 300, 400, 0x7_0000_0000]);
        for entries in scanned {
            assert_eq!(input.get(&entries.term), Some(&entries.occurrences));
        }
    }

    #[tokio::test]
    async fn test_fetch_straddling_records() {
        let input = sample();
        // Five words per page forces most records across a boundary.
        let driver = build(20, &input).await;
        let reader = IndexReader::new("title", Arc::new(driver), 20).unwrap();

        for (term, expected) in &input {
            let found = reader.fetch_term_entries(*term).await.unwrap();
            assert_eq!(found.as_ref(), Some(expected), "term {term}");
        }
        assert_eq!(reader.fetch_term_entries(50).await.unwrap(), None);
        assert_eq!(reader.fetch_term_entries(250).await.unwrap(), None);
        assert_eq!(reader.fetch_term_entries(u64::MAX - 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_page_id_for_term() {
        let driver = build(20, &sample()).await;
        let reader = IndexReader::new("title", Arc::new(driver), 20).unwrap();
        let table = reader.page_table().await.unwrap();

        assert_eq!(reader.page_id_for_term(99).await.unwrap(), None);
        for entry in table.iter() {
            assert_eq!(
                reader.page_id_for_term(entry.first_term).await.unwrap(),
                Some(entry.page_number as u32)
            );
        }
        let last = table.last().unwrap();
        assert_eq!(
            reader.page_id_for_term(u64::MAX).await.unwrap(),
            Some(last.page_number as u32)
        );
    }

    #[tokio::test]
    async fn test_page_table_fetched_once() {
        let driver = Arc::new(build(64, &sample()).await);
        let reader = IndexReader::open("title", driver.clone(), 64).await.unwrap();
        assert_eq!(driver.requests(), 1);

        reader.page_id_for_term(100).await.unwrap();
        reader.page_id_for_term(400).await.unwrap();
        assert_eq!(driver.requests(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_page_fetch() {
        let driver = Arc::new(build(4096, &sample()).await);
        let reader = IndexReader::open("title", driver.clone(), 4096).await.unwrap();

        let (a, b) = tokio::join!(
            reader.fetch_term_entries(100),
            reader.fetch_term_entries(300)
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());

        // One page table fetch plus one page fetch.
        assert_eq!(driver.requests(), 2);
        assert_eq!(reader.cached_pages(), 1);
    }

    #[tokio::test]
    async fn test_missing_page_table_is_not_found() {
        let reader = IndexReader::new("title", Arc::new(MemoryDriver::new()), 64).unwrap();
        let err = reader.fetch_term_entries(1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_page_surfaces_error() {
        let driver = build(20, &sample()).await;
        let name = crate::storage::page_path("title", 2);
        assert!(driver.remove(&name));
        let reader = IndexReader::new("title", Arc::new(driver), 20).unwrap();

        let results: Vec<Result<TermEntries>> =
            futures::StreamExt::collect(reader.scan_all().await.unwrap()).await;
        let last = results.last().unwrap();
        assert!(last.as_ref().unwrap_err().is_not_found());
        assert!(results[..results.len() - 1].iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_truncated_page_is_corrupt() {
        let driver = MemoryDriver::new();
        // A record with no terminator and no sentinel, on a page shorter than configured.
        driver.write_page("title", 0, &crate::index::page::encode_page(&[0, 5, 9])).await.unwrap();

        let reader = IndexReader::new("title", Arc::new(driver), 64).unwrap();
        let mut cursor = reader.cursor();
        cursor.jump(0).await.unwrap();
        let err = cursor.next_entry().await.unwrap_err();
        assert!(matches!(err, TunedexError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_find_next_term_resyncs() {
        let driver = build(4096, &sample()).await;
        let reader = IndexReader::new("title", Arc::new(driver), 4096).unwrap();

        let mut cursor = reader.cursor();
        // Land inside the first record ([0, 100, occ, occ, 0]).
        cursor.jump(3).await.unwrap();
        cursor.find_next_term().await.unwrap();
        assert_eq!(cursor.address(), 5);

        let entries = cursor.next_entry().await.unwrap().unwrap();
        assert_eq!(entries.term, 200);
    }

    #[tokio::test]
    async fn test_page_opening_with_record_lookalike() {
        // Term 1 straddles into page 1, which then opens with the occurrence
        // words 5 and 6: the two halves of the page's real first term.
        let lookalike: Term = (5 << 32) | 6;
        let docs = [100, 101, 102, 103, 104, 105, 5, 6, 107, 108];
        let mut input = TermOccurrences::default();
        input.insert(1, docs.iter().map(|&d| Occurrence::new(d, 0).unwrap()).collect());
        input.insert(lookalike, vec![Occurrence::new(200, 0).unwrap()]);

        let driver = build(32, &input).await;
        let reader = IndexReader::new("title", Arc::new(driver), 32).unwrap();

        let table = reader.page_table().await.unwrap();
        assert_eq!(
            *table,
            vec![PageTableEntry::new(0, 1), PageTableEntry::new(1, lookalike)]
        );
        assert_eq!(reader.page(1).await.unwrap()[..2].to_vec(), vec![5, 6]);

        assert_eq!(
            reader.fetch_term_entries(lookalike).await.unwrap(),
            Some(vec![Occurrence::new(200, 0).unwrap()])
        );
        // 2 term words, 10 occurrences and a terminator precede it.
        assert_eq!(reader.record_start(1).await.unwrap(), 13);
        assert_eq!(reader.fetch_term_entries(1).await.unwrap().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_record_starts_are_memoized() {
        let input = sample();
        let driver = Arc::new(build(20, &input).await);
        let reader = IndexReader::open("title", driver.clone(), 20).await.unwrap();

        let last = reader.page_table().await.unwrap().len() - 1;
        let address = reader.record_start(last).await.unwrap();
        let requests = driver.requests();

        assert_eq!(reader.record_start(last).await.unwrap(), address);
        for index in 0..last {
            assert!(reader.record_start(index).await.unwrap() < address);
        }
        assert_eq!(driver.requests(), requests);
        assert!(reader.record_start(last + 1).await.is_err());
    }

    #[tokio::test]
    async fn test_page_table_mismatch_is_corrupt() {
        let driver = build(64, &sample()).await;
        driver
            .write_page_table(
                "title",
                &crate::index::page_table::encode_page_table(&[PageTableEntry::new(0, 150)]),
            )
            .await
            .unwrap();

        let reader = IndexReader::new("title", Arc::new(driver), 64).unwrap();
        let err = reader.fetch_term_entries(200).await.unwrap_err();
        assert!(matches!(err, TunedexError::Corrupt(_)));
    }
}
