//! Offline build pipeline.
//!
//! Tune records are read from JSON Lines, turned into per-document terms for
//! each index type, inverted into per-term occurrence lists and written out
//! through an [`IndexWriter`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{extract_melody_terms_with_positions, extract_text_terms, incipit};
use crate::config::{IndexConfig, MELODY_INCIPIT_INDEX, MELODY_INDEX, TITLE_INDEX};
use crate::error::{Result, TunedexError};
use crate::index::term::{DocId, Occurrence, Position, Term};
use crate::index::writer::{IndexWriter, TermOccurrences, WriteSummary};
use crate::storage::PageWriteDriver;

/// One tune as read from the input collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneRecord {
    pub id: DocId,
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub melody_pitches: Vec<i32>,
}

/// Iterator over JSONL tune records. Blank lines are skipped.
pub struct TuneRecordIterator<R> {
    reader: R,
    line_number: usize,
}

impl<R: BufRead> TuneRecordIterator<R> {
    pub fn new(reader: R) -> Self {
        TuneRecordIterator {
            reader,
            line_number: 0,
        }
    }
}

impl TuneRecordIterator<BufReader<File>> {
    /// Open a JSONL file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| TunedexError::from_io(&path.display().to_string(), e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for TuneRecordIterator<R> {
    type Item = Result<TuneRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            self.line_number += 1;
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(line).map_err(|e| {
                        TunedexError::invalid_argument(format!(
                            "Failed to parse tune record on line {}: {e}",
                            self.line_number
                        ))
                    }));
                }
                Err(e) => return Some(Err(TunedexError::Io(e))),
            }
        }
    }
}

/// Read every record of a JSONL file.
pub fn load_tune_records<P: AsRef<Path>>(path: P) -> Result<Vec<TuneRecord>> {
    TuneRecordIterator::open(path)?.collect()
}

/// Per-document terms for one index type, keyed by ascending doc id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocTermOccurrences {
    pub index_type: String,
    pub docs: BTreeMap<DocId, Vec<(Term, Position)>>,
}

impl DocTermOccurrences {
    pub fn new<S: Into<String>>(index_type: S) -> Self {
        DocTermOccurrences {
            index_type: index_type.into(),
            docs: BTreeMap::new(),
        }
    }

    /// Set the terms of a document. Documents without terms are not stored.
    pub fn insert(&mut self, doc_id: DocId, terms: Vec<(Term, Position)>) {
        if terms.is_empty() {
            return;
        }
        if self.docs.insert(doc_id, terms).is_some() {
            warn!(
                "Document {doc_id} appears more than once in index {}; keeping the last",
                self.index_type
            );
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Turn per-document terms into per-term occurrence lists.
///
/// Each list is in ascending doc id order, and within a document in the
/// order its terms were extracted.
pub fn invert(doc_terms: &DocTermOccurrences) -> Result<TermOccurrences> {
    let mut result = TermOccurrences::default();
    for (&doc_id, terms) in &doc_terms.docs {
        for &(term, position) in terms {
            result
                .entry(term)
                .or_default()
                .push(Occurrence::new(doc_id, position)?);
        }
    }
    Ok(result)
}

/// Builds the title, melody and melody incipit indexes.
#[derive(Debug)]
pub struct IndexBuilder {
    driver: Arc<dyn PageWriteDriver>,
    config: IndexConfig,
}

impl IndexBuilder {
    pub fn new(driver: Arc<dyn PageWriteDriver>, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(IndexBuilder { driver, config })
    }

    /// Extract the terms of every index type from the records.
    pub fn extract(&self, records: &[TuneRecord]) -> Vec<DocTermOccurrences> {
        let extracted: Vec<_> = records
            .par_iter()
            .map(|record| {
                (
                    record.id,
                    extract_text_terms(&record.titles),
                    extract_melody_terms_with_positions(&record.melody_pitches),
                    extract_melody_terms_with_positions(incipit(&record.melody_pitches)),
                )
            })
            .collect();

        let mut title = DocTermOccurrences::new(TITLE_INDEX);
        let mut melody = DocTermOccurrences::new(MELODY_INDEX);
        let mut melody_incipit = DocTermOccurrences::new(MELODY_INCIPIT_INDEX);
        for (doc_id, title_terms, melody_terms, incipit_terms) in extracted {
            title.insert(doc_id, title_terms);
            melody.insert(doc_id, melody_terms);
            melody_incipit.insert(doc_id, incipit_terms);
        }

        vec![title, melody, melody_incipit]
    }

    /// Invert and write one index type.
    pub async fn write_index(&self, doc_terms: &DocTermOccurrences) -> Result<WriteSummary> {
        let term_occurrences = invert(doc_terms)?;
        info!(
            "Index {}: {} documents, {} distinct terms",
            doc_terms.index_type,
            doc_terms.len(),
            term_occurrences.len()
        );

        let writer = IndexWriter::new(
            doc_terms.index_type.clone(),
            Arc::clone(&self.driver),
            self.config.page_size_bytes,
        )?;
        writer.write(&term_occurrences).await
    }

    /// Build every index type from the records.
    pub async fn build(&self, records: &[TuneRecord]) -> Result<BTreeMap<String, WriteSummary>> {
        info!("Building indexes from {} tune records", records.len());

        let mut summaries = BTreeMap::new();
        for doc_terms in self.extract(records) {
            let summary = self.write_index(&doc_terms).await?;
            summaries.insert(doc_terms.index_type, summary);
        }
        Ok(summaries)
    }
}
