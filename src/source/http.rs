use super::TextSource;
use crate::error::{ErrorCode, Result, WordTallyError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Downloads a document over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wordtally/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WordTallyError::config("failed to build HTTP client").with_source(e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TextSource for HttpSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        info!("Downloading text from {}", location);

        let response = self.client.get(location).send().await.map_err(|e| {
            WordTallyError::fetch_with_code(ErrorCode::FETCH_NETWORK, location, e.to_string())
                .with_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WordTallyError::fetch_with_code(
                ErrorCode::FETCH_HTTP_STATUS,
                location,
                format!("server answered {}", status),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            WordTallyError::fetch_with_code(ErrorCode::FETCH_NETWORK, location, e.to_string())
                .with_source(e)
        })?;
        debug!("Downloaded {} bytes from {}", body.len(), location);
        Ok(body.to_vec())
    }
}
