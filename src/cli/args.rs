//! Command line argument parsing for the Tunedex CLI using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tunedex - paged inverted indexes over a tune collection
#[derive(Parser, Debug, Clone)]
#[command(name = "tunedex")]
#[command(about = "Build and search paged inverted indexes over a tune collection")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct TunedexArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "TUNEDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl TunedexArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build the title, melody and melody incipit indexes from a JSONL file
    Index(IndexArgs),

    /// Search by title text and/or melody
    Search(SearchArgs),

    /// Scan one index from the start and list its terms
    Dump(DumpArgs),

    /// Print the page table of one index
    Inspect(InspectArgs),
}

/// Where to read indexes from.
#[derive(Args, Debug, Clone)]
#[group(required = false, multiple = false)]
pub struct SourceArgs {
    /// Database root directory
    #[arg(long, value_name = "DB_PATH")]
    pub db: Option<PathBuf>,

    /// Base URL serving the database layout over HTTP
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

/// Arguments for building indexes
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// Database root directory
    #[arg(long, value_name = "DB_PATH")]
    pub db: PathBuf,

    /// Tune records, one JSON object per line
    #[arg(short, long, value_name = "INPUT_FILE")]
    pub input: PathBuf,

    /// Page size in bytes (multiple of 4)
    #[arg(long)]
    pub page_size: Option<usize>,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Title text to search for
    #[arg(long)]
    pub title: Option<String>,

    /// Melody as comma separated pitches, matched against incipits
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub melody: Option<Vec<i32>>,

    /// Maximum number of results to show
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Page size in bytes the indexes were built with
    #[arg(long)]
    pub page_size: Option<usize>,
}

/// Arguments for dumping an index
#[derive(Parser, Debug, Clone)]
pub struct DumpArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Index type to scan
    #[arg(short = 't', long, default_value = "title")]
    pub index_type: String,

    /// Stop after this many terms
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Page size in bytes the index was built with
    #[arg(long)]
    pub page_size: Option<usize>,
}

/// Arguments for inspecting a page table
#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Index type to inspect
    #[arg(short = 't', long, default_value = "title")]
    pub index_type: String,

    /// Page size in bytes the index was built with
    #[arg(long)]
    pub page_size: Option<usize>,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
