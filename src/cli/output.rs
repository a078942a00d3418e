//! Output formatting for CLI commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, TunedexArgs};
use crate::error::Result;
use crate::index::page_table::PageTableEntry;
use crate::index::term::Term;
use crate::index::writer::WriteSummary;
use crate::search::SearchHit;

/// Results that know how to print themselves for people.
pub trait HumanOutput {
    fn print_human(&self);
}

/// Result structure for an index build.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildReport {
    pub db: String,
    pub records: usize,
    pub page_size_bytes: usize,
    pub summaries: BTreeMap<String, WriteSummary>,
    pub duration_ms: u64,
}

/// Result structure for search operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchReport {
    pub hits: Vec<SearchHit>,
    pub total_hits: usize,
    pub requests: u64,
    pub bytes: u64,
    pub duration_ms: u64,
}

/// One scanned term.
#[derive(Debug, Serialize, Deserialize)]
pub struct DumpedTerm {
    pub term: Term,
    pub occurrences: usize,
}

/// Result structure for an index scan.
#[derive(Debug, Serialize, Deserialize)]
pub struct DumpReport {
    pub index_type: String,
    pub terms: Vec<DumpedTerm>,
    /// Whether the scan reached the end-of-index sentinel.
    pub complete: bool,
    /// The fault that stopped the scan early, if any.
    pub error: Option<String>,
    pub requests: u64,
    pub bytes: u64,
}

/// Result structure for a page table listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct InspectReport {
    pub index_type: String,
    pub entries: Vec<PageTableEntry>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize + HumanOutput>(
    message: &str,
    result: &T,
    args: &TunedexArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
                println!();
            }
            result.print_human();
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &TunedexArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

impl HumanOutput for BuildReport {
    fn print_human(&self) {
        println!("Build Summary:");
        println!("══════════════");
        println!("Database: {}", self.db);
        println!("Tune records: {}", self.records);
        println!("Page size: {}", format_bytes(self.page_size_bytes as u64));
        for (index_type, summary) in &self.summaries {
            println!();
            println!("Index: {index_type}");
            println!("  Terms: {}", summary.terms_written);
            println!("  Occurrences: {}", summary.occurrences_written);
            println!("  Pages: {}", summary.pages_written);
            if !summary.is_lossless() {
                println!(
                    "  Skipped: {} terms, {} occurrences",
                    summary.skipped_terms, summary.skipped_occurrences
                );
            }
        }
        println!();
        println!("Build time: {}ms", self.duration_ms);
    }
}

impl HumanOutput for SearchReport {
    fn print_human(&self) {
        println!("Search Results:");
        println!("═══════════════");
        for (i, hit) in self.hits.iter().enumerate() {
            println!("{:>4}. doc {} (score {})", i + 1, hit.doc_id, hit.score);
        }
        println!();
        println!("Showing {} of {} hits", self.hits.len(), self.total_hits);
        println!(
            "Cost: {} requests, {}",
            self.requests,
            format_bytes(self.bytes)
        );
        println!("Search time: {}ms", self.duration_ms);
    }
}

impl HumanOutput for DumpReport {
    fn print_human(&self) {
        println!("Index: {}", self.index_type);
        println!("───────────────");
        for term in &self.terms {
            println!("{:#018x}  {} occurrences", term.term, term.occurrences);
        }
        println!();
        println!("Terms scanned: {}", self.terms.len());
        match (&self.error, self.complete) {
            (Some(error), _) => println!("Scan stopped early: {error}"),
            (None, true) => println!("Scan reached end of index"),
            (None, false) => println!("Scan stopped at limit"),
        }
        println!(
            "Cost: {} requests, {}",
            self.requests,
            format_bytes(self.bytes)
        );
    }
}

impl HumanOutput for InspectReport {
    fn print_human(&self) {
        println!("Page table of {}:", self.index_type);
        println!("{:>8}  first term", "page");
        for entry in &self.entries {
            println!("{:>8}  {:#018x}", entry.page_number, entry.first_term);
        }
        println!();
        println!("Entries: {}", self.entries.len());
    }
}

/// Format bytes in human-readable format.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}
