use super::TextSource;
use crate::error::helpers::fetch_io_error;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Reads a document from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl FileSource {
    /// Read `path`, reporting errors against the original `location` string
    pub async fn fetch_path(&self, location: &str, path: &Path) -> Result<Vec<u8>> {
        fs::read(path)
            .await
            .map_err(|e| fetch_io_error(location, e))
    }
}

#[async_trait]
impl TextSource for FileSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        self.fetch_path(location, Path::new(location)).await
    }
}

/// Reads a document from standard input until EOF
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinSource;

#[async_trait]
impl TextSource for StdinSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| fetch_io_error(location, e))?;
        Ok(buffer)
    }
}
