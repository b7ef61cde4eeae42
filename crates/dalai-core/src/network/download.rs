//! Streaming file downloads.
//!
//! Provides:
//! - A fixed user agent on every request
//! - Streaming to a temp file, then an atomic rename into place
//! - Periodic progress logging for large weight files

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;
use reqwest::{header, Client};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::NetworkConfig;
use crate::{DalaiError, Result};

/// Something that can place the body of a URL at a local path.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` to `destination`, returning the number of bytes written.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64>;
}

/// HTTP downloader for weight and tokenizer files.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Create a downloader sending the default user agent.
    pub fn new() -> Result<Self> {
        Self::with_user_agent(NetworkConfig::USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        Self::build(user_agent, true)
    }

    /// Downloader that ignores proxy environment variables.
    #[cfg(test)]
    fn for_loopback() -> Result<Self> {
        Self::build(NetworkConfig::USER_AGENT, false)
    }

    fn build(user_agent: &str, system_proxy: bool) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(user_agent).map_err(|e| DalaiError::Config {
            message: format!("invalid user agent '{user_agent}': {e}"),
        })?;
        headers.insert(header::USER_AGENT, value);

        // No overall timeout: weight shards run to tens of gigabytes.
        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT);
        if !system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| DalaiError::Network {
                message: format!("Failed to create HTTP client: {e}"),
                source: Some(e),
            })?;
        Ok(Self { client })
    }

    async fn download_to(&self, url: &str, temp_path: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await.map_err(|e| DalaiError::Network {
            message: format!("GET {url} failed: {e}"),
            source: Some(e),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DalaiError::DownloadFailed {
                url: url.to_string(),
                message: format!("server responded with status {status}"),
            });
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| DalaiError::io("creating temp file", temp_path, e))?;

        let mut written: u64 = 0;
        let mut last_report = Instant::now();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DalaiError::Network {
                message: format!("Error reading download stream from {url}: {e}"),
                source: Some(e),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DalaiError::io("writing temp file", temp_path, e))?;
            written += chunk.len() as u64;

            if last_report.elapsed() >= NetworkConfig::DOWNLOAD_PROGRESS_INTERVAL {
                match total {
                    Some(total) if total > 0 => info!(
                        "{}: {}/{} bytes ({:.1}%)",
                        url,
                        written,
                        total,
                        written as f64 / total as f64 * 100.0
                    ),
                    _ => info!("{}: {} bytes", url, written),
                }
                last_report = Instant::now();
            }
        }

        file.flush()
            .await
            .map_err(|e| DalaiError::io("flushing temp file", temp_path, e))?;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl Fetcher for Downloader {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DalaiError::io("creating download directory", parent, e))?;
        }

        let temp_path = temp_path_for(destination);
        debug!("Downloading {} to {}", url, temp_path.display());

        match self.download_to(url, &temp_path).await {
            Ok(bytes) => {
                tokio::fs::rename(&temp_path, destination).await.map_err(|e| {
                    DalaiError::io("moving download into place", destination, e)
                })?;
                info!("Downloaded {} bytes to {}", bytes, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }
}

/// `{destination}.part`
fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(NetworkConfig::DOWNLOAD_TEMP_SUFFIX);
    PathBuf::from(name)
}
