//! Sound asset loading.
//!
//! A location is either an `http(s)://` URL, fetched with `reqwest`, or a
//! local file path.

use std::time::Duration;

use ::async_trait::async_trait;
use tracing::debug;

use crate::error::{AudioError, AudioResult};

/// Fetch timeout for remote assets.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of raw sound asset bytes.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn fetch(&self, location: &str) -> AudioResult<Vec<u8>>;
}

/// Loads from local files or over HTTP.
#[derive(Debug, Clone)]
pub struct DefaultAssetLoader {
    client: reqwest::Client,
}

impl DefaultAssetLoader {
    pub fn new() -> AudioResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AudioError::Unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Use an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_http(&self, url: &str) -> AudioResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AudioError::fetch(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AudioError::fetch(url, format!("HTTP {status}")));
        }
        let bytes = response.bytes().await.map_err(|e| AudioError::fetch(url, e))?;
        Ok(bytes.to_vec())
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[async_trait]
impl AssetLoader for DefaultAssetLoader {
    async fn fetch(&self, location: &str) -> AudioResult<Vec<u8>> {
        let bytes = if is_remote(location) {
            self.fetch_http(location).await?
        } else {
            tokio::fs::read(location)
                .await
                .map_err(|e| AudioError::fetch(location, e))?
        };
        debug!(location, bytes = bytes.len(), "sound asset loaded");
        Ok(bytes)
    }
}
