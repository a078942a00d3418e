//! Search service: resolves per-index term queries and merges the matches
//! into one ranked list.
//!
//! Every occurrence of a query term adds one to its document's score. Scores
//! accumulate over all terms and all queries of a batch, so a document that
//! matches in several index types ranks above one that matches in a single
//! type.

use std::sync::Arc;

use ahash::AHashMap;
use futures::future::try_join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{Result, TunedexError};
use crate::index::reader::IndexReader;
use crate::index::term::{DocId, Term};
use crate::storage::{IoStats, PageReadDriver};

/// Terms to look up in one index type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSearchQuery {
    pub index_type: String,
    pub terms: Vec<Term>,
}

impl IndexSearchQuery {
    pub fn new<S: Into<String>>(index_type: S, terms: Vec<Term>) -> Self {
        IndexSearchQuery {
            index_type: index_type.into(),
            terms,
        }
    }
}

/// A scored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: u32,
}

/// Ranked hits and the I/O spent producing them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Hits by descending score, then ascending doc id.
    pub hits: Vec<SearchHit>,
    /// Storage requests issued during the call.
    pub requests: u64,
    /// Bytes fetched during the call.
    pub bytes: u64,
}

impl SearchResult {
    /// The best `limit` hits.
    pub fn top(&self, limit: usize) -> &[SearchHit] {
        &self.hits[..limit.min(self.hits.len())]
    }
}

/// Holds one reader per index type.
#[derive(Debug)]
pub struct SearchService {
    readers: AHashMap<String, IndexReader>,
    /// Distinct drivers behind the readers, for cost accounting.
    drivers: Vec<Arc<dyn PageReadDriver>>,
}

impl SearchService {
    /// Create a service with a reader per index type over one driver.
    ///
    /// Page tables load on first use; [`open`](Self::open) loads them here.
    pub fn new<S: AsRef<str>>(
        driver: Arc<dyn PageReadDriver>,
        index_types: &[S],
        page_size_bytes: usize,
    ) -> Result<Self> {
        let readers = index_types
            .iter()
            .map(|index_type| {
                IndexReader::new(index_type.as_ref(), Arc::clone(&driver), page_size_bytes)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_readers(readers))
    }

    /// Create a service and load every page table up front.
    pub async fn open<S: AsRef<str>>(
        driver: Arc<dyn PageReadDriver>,
        index_types: &[S],
        page_size_bytes: usize,
    ) -> Result<Self> {
        let service = Self::new(driver, index_types, page_size_bytes)?;
        service.warm_up().await?;
        Ok(service)
    }

    /// Create a service from configuration and load every page table.
    pub async fn from_config(
        config: &SearchConfig,
        driver: Arc<dyn PageReadDriver>,
    ) -> Result<Self> {
        config.validate()?;
        Self::open(driver, config.index_types.as_slice(), config.page_size_bytes).await
    }

    /// Create a service from readers that may use different drivers.
    ///
    /// A later reader replaces an earlier one of the same index type.
    pub fn from_readers(readers: Vec<IndexReader>) -> Self {
        let mut drivers: Vec<Arc<dyn PageReadDriver>> = Vec::new();
        let mut by_type = AHashMap::new();
        for reader in readers {
            let driver = reader.driver();
            if !drivers.iter().any(|known| same_driver(known, driver)) {
                drivers.push(Arc::clone(driver));
            }
            by_type.insert(reader.index_type().to_string(), reader);
        }
        SearchService {
            readers: by_type,
            drivers,
        }
    }

    /// Configured index types, sorted.
    pub fn index_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.readers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn reader(&self, index_type: &str) -> Option<&IndexReader> {
        self.readers.get(index_type)
    }

    /// Load every page table concurrently.
    pub async fn warm_up(&self) -> Result<()> {
        try_join_all(self.readers.values().map(|reader| reader.page_table())).await?;
        Ok(())
    }

    /// Cumulative counters summed over the distinct drivers.
    pub fn io_stats(&self) -> IoStats {
        self.drivers
            .iter()
            .fold(IoStats::default(), |total, driver| total + driver.stats())
    }

    /// Run a batch of queries and rank the matching documents.
    ///
    /// An unknown index type fails the whole batch before any lookup.
    pub async fn search(&self, queries: &[IndexSearchQuery]) -> Result<SearchResult> {
        let before = self.io_stats();

        let mut lookups = Vec::new();
        for query in queries {
            let reader = self
                .readers
                .get(&query.index_type)
                .ok_or_else(|| TunedexError::UnknownIndexType(query.index_type.clone()))?;

            let mut terms = query.terms.clone();
            terms.sort_unstable();
            lookups.extend(terms.into_iter().map(|term| (reader, term)));
        }

        let matches = try_join_all(
            lookups
                .iter()
                .map(|(reader, term)| reader.fetch_term_entries(*term)),
        )
        .await?;

        let mut scores: AHashMap<DocId, u32> = AHashMap::new();
        for occurrences in matches.into_iter().flatten() {
            for occurrence in occurrences {
                *scores.entry(occurrence.doc_id).or_insert(0) += 1;
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .map(|(doc_id, score)| SearchHit { doc_id, score })
            .collect();
        hits.sort_unstable_by(|a, b| b.score.cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));

        let cost = self.io_stats().delta(&before);
        debug!("Resolved {} term lookups", lookups.len());
        info!(
            "Search over {} queries matched {} documents ({} requests, {} bytes)",
            queries.len(),
            hits.len(),
            cost.requests,
            cost.bytes
        );

        Ok(SearchResult {
            hits,
            requests: cost.requests,
            bytes: cost.bytes,
        })
    }
}

fn same_driver(a: &Arc<dyn PageReadDriver>, b: &Arc<dyn PageReadDriver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
