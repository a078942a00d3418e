//! In-memory page driver for testing and benchmarking.

use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, TunedexError};
use crate::index::page::{Page, decode_page};
use crate::index::page_table::{PageTableEntry, decode_page_table};
use crate::storage::{
    IoCounters, PageReadDriver, PageWriteDriver, page_path, page_table_path,
};

/// An in-memory page driver.
///
/// Drivers created with [`MemoryDriver::share`] see the same files, so a
/// writer and a reader can work on one index. Counters are per instance.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    files: Arc<Mutex<AHashMap<String, Box<[u8]>>>>,
    counters: IoCounters,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new driver over the same files, with fresh counters.
    pub fn share(&self) -> Self {
        MemoryDriver {
            files: Arc::clone(&self.files),
            counters: IoCounters::new(),
        }
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Names of all stored files, sorted.
    pub fn list_files(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Raw bytes of a stored file.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).map(|data| data.to_vec())
    }

    /// Remove a stored file.
    pub fn remove(&self, name: &str) -> bool {
        self.files.lock().remove(name).is_some()
    }

    fn put(&self, name: String, bytes: &[u8]) {
        self.files.lock().insert(name, bytes.into());
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(name)
            .ok_or_else(|| TunedexError::not_found(name))?;
        self.counters.record(bytes.len());
        Ok(bytes)
    }
}

#[async_trait]
impl PageWriteDriver for MemoryDriver {
    async fn write_page(&self, index_type: &str, page_number: u32, bytes: &[u8]) -> Result<()> {
        self.put(page_path(index_type, page_number), bytes);
        Ok(())
    }

    async fn write_page_table(&self, index_type: &str, bytes: &[u8]) -> Result<()> {
        self.put(page_table_path(index_type), bytes);
        Ok(())
    }
}

#[async_trait]
impl PageReadDriver for MemoryDriver {
    async fn read_page(&self, index_type: &str, page_number: u32) -> Result<Page> {
        decode_page(&self.fetch(&page_path(index_type, page_number))?)
    }

    async fn read_page_table(&self, index_type: &str) -> Result<Vec<PageTableEntry>> {
        decode_page_table(&self.fetch(&page_table_path(index_type))?)
    }

    fn requests(&self) -> u64 {
        self.counters.requests()
    }

    fn bytes(&self) -> u64 {
        self.counters.bytes()
    }
}
