//! Command implementations for the Tunedex CLI.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use log::info;

use crate::analysis::{extract_melody_terms, extract_text_terms};
use crate::build::{IndexBuilder, load_tune_records};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{IndexConfig, MELODY_INCIPIT_INDEX, TITLE_INDEX, TunedexConfig};
use crate::error::{Result, TunedexError};
use crate::index::reader::IndexReader;
use crate::search::{IndexSearchQuery, SearchService};
use crate::storage::file::FileDriverConfig;
use crate::storage::{HttpDriverConfig, PageReadDriver, StorageConfig, StorageFactory};

/// Execute a CLI command.
pub async fn execute_command(args: TunedexArgs) -> Result<()> {
    let config = load_config(&args)?;
    match &args.command {
        Command::Index(index_args) => build_indexes(index_args.clone(), &config, &args).await,
        Command::Search(search_args) => search(search_args.clone(), &config, &args).await,
        Command::Dump(dump_args) => dump_index(dump_args.clone(), &config, &args).await,
        Command::Inspect(inspect_args) => {
            inspect_index(inspect_args.clone(), &config, &args).await
        }
    }
}

fn load_config(args: &TunedexArgs) -> Result<TunedexConfig> {
    match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            TunedexConfig::from_file(path)
        }
        None => Ok(TunedexConfig::default()),
    }
}

/// Command line source flags take precedence over the configured storage.
fn storage_config(source: &SourceArgs, config: &TunedexConfig) -> StorageConfig {
    match (&source.db, &source.url) {
        (Some(db), _) => StorageConfig::File(FileDriverConfig::new(db)),
        (None, Some(url)) => {
            let timeout_secs = match &config.storage {
                StorageConfig::Http(http) => http.timeout_secs,
                _ => None,
            };
            StorageConfig::Http(HttpDriverConfig {
                base_url: url.clone(),
                timeout_secs,
            })
        }
        (None, None) => config.storage.clone(),
    }
}

/// Build every index type from a JSONL file.
async fn build_indexes(
    args: IndexArgs,
    config: &TunedexConfig,
    cli_args: &TunedexArgs,
) -> Result<()> {
    let start_time = Instant::now();
    let page_size_bytes = args.page_size.unwrap_or(config.index.page_size_bytes);

    let records = load_tune_records(&args.input)?;
    if cli_args.verbosity() > 1 {
        println!(
            "Read {} tune records from {}",
            records.len(),
            args.input.display()
        );
    }

    let driver = StorageFactory::create_writer(&StorageConfig::File(FileDriverConfig::new(
        &args.db,
    )))?;
    let builder = IndexBuilder::new(driver, IndexConfig { page_size_bytes })?;
    let summaries = builder.build(&records).await?;

    let report = BuildReport {
        db: args.db.display().to_string(),
        records: records.len(),
        page_size_bytes,
        summaries,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };
    output_result("Indexes built", &report, cli_args)
}

/// Build the query batch for the given title and melody.
pub fn build_queries(title: Option<&str>, melody: Option<&[i32]>) -> Vec<IndexSearchQuery> {
    let mut queries = Vec::new();
    if let Some(title) = title {
        let terms = extract_text_terms(&[title])
            .into_iter()
            .map(|(term, _)| term)
            .collect();
        queries.push(IndexSearchQuery::new(TITLE_INDEX, terms));
    }
    if let Some(melody) = melody {
        queries.push(IndexSearchQuery::new(
            MELODY_INCIPIT_INDEX,
            extract_melody_terms(melody),
        ));
    }
    queries
}

/// Search by title and/or melody.
async fn search(args: SearchArgs, config: &TunedexConfig, cli_args: &TunedexArgs) -> Result<()> {
    let queries = build_queries(args.title.as_deref(), args.melody.as_deref());
    if queries.is_empty() {
        return Err(TunedexError::invalid_argument(
            "Supply --title and/or --melody",
        ));
    }
    if cli_args.verbosity() > 1 {
        for query in &queries {
            println!("{}: {} terms", query.index_type, query.terms.len());
        }
    }

    let start_time = Instant::now();
    let page_size_bytes = args.page_size.unwrap_or(config.search.page_size_bytes);
    let driver = StorageFactory::create_reader(&storage_config(&args.source, config))?;

    let index_types: Vec<&str> = queries.iter().map(|q| q.index_type.as_str()).collect();
    let service = SearchService::open(driver, index_types.as_slice(), page_size_bytes).await?;
    let result = service.search(&queries).await?;

    let report = SearchReport {
        hits: result.top(args.limit).to_vec(),
        total_hits: result.hits.len(),
        requests: result.requests,
        bytes: result.bytes,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };
    output_result("Search complete", &report, cli_args)
}

/// Scan an index from its first record.
async fn dump_index(args: DumpArgs, config: &TunedexConfig, cli_args: &TunedexArgs) -> Result<()> {
    let page_size_bytes = args.page_size.unwrap_or(config.search.page_size_bytes);
    let driver = StorageFactory::create_reader(&storage_config(&args.source, config))?;
    let before = driver.stats();

    let reader = IndexReader::new(args.index_type.clone(), Arc::clone(&driver), page_size_bytes)?;
    let stream = reader.scan_all().await?;
    let mut stream = std::pin::pin!(stream);

    let mut terms = Vec::new();
    let mut complete = false;
    let mut error = None;
    loop {
        if args.limit.is_some_and(|limit| terms.len() >= limit) {
            break;
        }
        match stream.next().await {
            Some(Ok(entries)) => terms.push(DumpedTerm {
                term: entries.term,
                occurrences: entries.occurrences.len(),
            }),
            Some(Err(e)) => {
                error = Some(e.to_string());
                break;
            }
            None => {
                complete = true;
                break;
            }
        }
    }

    let cost = driver.stats().delta(&before);
    let report = DumpReport {
        index_type: args.index_type,
        terms,
        complete,
        error,
        requests: cost.requests,
        bytes: cost.bytes,
    };
    output_result("Index scan", &report, cli_args)
}

/// Print the page table of an index.
async fn inspect_index(
    args: InspectArgs,
    config: &TunedexConfig,
    cli_args: &TunedexArgs,
) -> Result<()> {
    let driver: Arc<dyn PageReadDriver> =
        StorageFactory::create_reader(&storage_config(&args.source, config))?;
    let page_size_bytes = args.page_size.unwrap_or(config.search.page_size_bytes);
    let reader = IndexReader::new(args.index_type.clone(), driver, page_size_bytes)?;
    let entries = reader.page_table().await?;

    let report = InspectReport {
        index_type: args.index_type,
        entries: entries.to_vec(),
    };
    output_result("Page table", &report, cli_args)
}
