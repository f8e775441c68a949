//! Text sources
//!
//! A [`TextSource`] resolves an opaque location string to raw bytes. Decoding
//! is left to the tokenizer stage so encoding problems surface there.

use crate::error::{ErrorCode, Result, WordTallyError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub mod file;
pub mod http;

pub use file::{FileSource, StdinSource};
pub use http::HttpSource;

/// Location that selects standard input
pub const STDIN_LOCATION: &str = "-";

#[async_trait]
pub trait TextSource: Send + Sync {
    /// Fetch the raw bytes behind `location`
    async fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

/// Where a location string points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLocation {
    Http(Url),
    File(PathBuf),
    Stdin,
}

/// Classify a location: `-` is stdin, `http(s)://` and `file://` URLs by scheme,
/// anything else is a filesystem path.
pub fn resolve_location(location: &str) -> Result<ResolvedLocation> {
    if location == STDIN_LOCATION {
        return Ok(ResolvedLocation::Stdin);
    }

    match Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(ResolvedLocation::Http(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(ResolvedLocation::File)
            .map_err(|_| {
                WordTallyError::fetch(location, "file URL does not name a local path")
            }),
        _ => Ok(ResolvedLocation::File(PathBuf::from(location))),
    }
}

/// Dispatches to HTTP, file or stdin depending on the location
pub struct LocationSource {
    http: HttpSource,
    file: FileSource,
    stdin: StdinSource,
}

impl LocationSource {
    pub fn new(http_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new(http_timeout)?,
            file: FileSource,
            stdin: StdinSource,
        })
    }
}

#[async_trait]
impl TextSource for LocationSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let resolved = resolve_location(location)?;
        debug!("Resolved {} to {:?}", location, resolved);
        match resolved {
            ResolvedLocation::Http(url) => self.http.fetch(url.as_str()).await,
            ResolvedLocation::File(path) => self.file.fetch_path(location, &path).await,
            ResolvedLocation::Stdin => self.stdin.fetch(location).await,
        }
    }
}

/// In-memory documents keyed by location
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: HashMap<String, Vec<u8>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, location: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_bytes(location, text.into().into_bytes())
    }

    pub fn with_bytes(mut self, location: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.documents.insert(location.into(), bytes);
        self
    }
}

#[async_trait]
impl TextSource for StaticSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        self.documents.get(location).cloned().ok_or_else(|| {
            WordTallyError::fetch_with_code(
                ErrorCode::FETCH_NOT_FOUND,
                location,
                "no document registered for this location",
            )
        })
    }
}
