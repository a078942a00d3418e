//! File-based page driver.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunedexError};
use crate::index::page::{Page, decode_page};
use crate::index::page_table::{PageTableEntry, decode_page_table};
use crate::storage::{
    IoCounters, PageReadDriver, PageWriteDriver, page_path, page_table_path,
};

/// Configuration for file-based storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDriverConfig {
    /// Database root; index files live under `<root>/index/<type>/`.
    pub root: PathBuf,
}

impl FileDriverConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        FileDriverConfig {
            root: root.as_ref().to_path_buf(),
        }
    }
}

/// Reads and writes index pages on the local filesystem.
#[derive(Debug)]
pub struct FileDriver {
    /// The database root directory.
    root: PathBuf,
    /// Fetch counters.
    counters: IoCounters,
}

impl FileDriver {
    pub fn new(config: FileDriverConfig) -> Self {
        FileDriver {
            root: config.root,
            counters: IoCounters::new(),
        }
    }

    /// Convenience constructor from a root path.
    pub fn open<P: AsRef<Path>>(root: P) -> Self {
        Self::new(FileDriverConfig::new(root))
    }

    /// Get the database root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TunedexError::storage(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        debug!("Write {} ({} bytes)", path.display(), bytes.len());
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| TunedexError::from_io(name, e))?;
        self.counters.record(bytes.len());
        Ok(bytes)
    }
}

#[async_trait]
impl PageWriteDriver for FileDriver {
    async fn write_page(&self, index_type: &str, page_number: u32, bytes: &[u8]) -> Result<()> {
        self.write_file(&page_path(index_type, page_number), bytes).await
    }

    async fn write_page_table(&self, index_type: &str, bytes: &[u8]) -> Result<()> {
        self.write_file(&page_table_path(index_type), bytes).await
    }
}

#[async_trait]
impl PageReadDriver for FileDriver {
    async fn read_page(&self, index_type: &str, page_number: u32) -> Result<Page> {
        let bytes = self.read_file(&page_path(index_type, page_number)).await?;
        decode_page(&bytes)
    }

    async fn read_page_table(&self, index_type: &str) -> Result<Vec<PageTableEntry>> {
        let bytes = self.read_file(&page_table_path(index_type)).await?;
        decode_page_table(&bytes)
    }

    fn requests(&self) -> u64 {
        self.counters.requests()
    }

    fn bytes(&self) -> u64 {
        self.counters.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::page::encode_page;
    use crate::index::page_table::encode_page_table;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_layout() {
        let temp_dir = TempDir::new().unwrap();
        let driver = FileDriver::open(temp_dir.path());

        driver
            .write_page("title", 3, &encode_page(&[7, 0]))
            .await
            .unwrap();
        driver
            .write_page_table("title", &encode_page_table(&[PageTableEntry::new(3, 7)]))
            .await
            .unwrap();

        assert!(temp_dir.path().join("index/title/page-3").is_file());
        assert!(temp_dir.path().join("index/title/page-table").is_file());

        assert_eq!(driver.read_page("title", 3).await.unwrap(), vec![7, 0]);
        assert_eq!(
            driver.read_page_table("title").await.unwrap(),
            vec![PageTableEntry::new(3, 7)]
        );
        assert_eq!(driver.requests(), 2);
        assert_eq!(driver.bytes(), 8 + 16);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let driver = FileDriver::open(temp_dir.path());

        driver.write_page("melody", 0, &encode_page(&[1, 2])).await.unwrap();
        driver.write_page("melody", 0, &encode_page(&[3])).await.unwrap();

        assert_eq!(driver.read_page("melody", 0).await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_missing_page_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let driver = FileDriver::open(temp_dir.path());

        let err = driver.read_page("title", 0).await.unwrap_err();
        assert!(err.is_not_found());
        let err = driver.read_page_table("title").await.unwrap_err();
        assert!(err.is_not_found());

        // Failed fetches are not counted.
        assert_eq!(driver.requests(), 0);
    }
}
