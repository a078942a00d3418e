//! HTTP page driver.
//!
//! Fetches the same byte layouts as [`FileDriver`](crate::storage::file::FileDriver)
//! from `GET <base>/index/<type>/page-<n>` and `GET <base>/index/<type>/page-table`.
//! Requires the `http` feature.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};

use crate::error::{Result, TunedexError};
use crate::index::page::{Page, decode_page};
use crate::index::page_table::{PageTableEntry, decode_page_table};
use crate::storage::{HttpDriverConfig, IoCounters, PageReadDriver, page_path, page_table_path};

/// Read-only driver over HTTP.
pub struct HttpDriver {
    /// HTTP client shared by all requests.
    client: Client,
    /// Base URL without a trailing slash.
    base_url: String,
    counters: IoCounters,
}

impl std::fmt::Debug for HttpDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDriver")
            .field("base_url", &self.base_url)
            .field("requests", &self.counters.requests())
            .finish()
    }
}

impl HttpDriver {
    pub fn new(config: HttpDriverConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| TunedexError::http(format!("Failed to build HTTP client: {e}")))?;

        Ok(HttpDriver {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            counters: IoCounters::new(),
        })
    }

    /// Full URL of a relative resource name.
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.url_for(name);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TunedexError::http(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TunedexError::not_found(url));
        }
        if !status.is_success() {
            return Err(TunedexError::http(format!("GET {url} returned {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TunedexError::http(format!("Failed to read body of {url}: {e}")))?;
        self.counters.record(bytes.len());
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PageReadDriver for HttpDriver {
    async fn read_page(&self, index_type: &str, page_number: u32) -> Result<Page> {
        decode_page(&self.fetch(&page_path(index_type, page_number)).await?)
    }

    async fn read_page_table(&self, index_type: &str) -> Result<Vec<PageTableEntry>> {
        decode_page_table(&self.fetch(&page_table_path(index_type)).await?)
    }

    fn requests(&self) -> u64 {
        self.counters.requests()
    }

    fn bytes(&self) -> u64 {
        self.counters.bytes()
    }
}
