//! HTTP boundary of the fetcher
//!
//! The fetcher only needs two GETs returning raw bodies. Keeping them behind a
//! trait lets tests drive the orchestration without a network.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;

use crate::config::FetcherConfig;
use crate::error::{bytes_with_limit, check_response};
use crate::Result;

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET the manifest JSON body. Non-2xx statuses are errors.
    async fn fetch_manifest(&self, url: &str) -> Result<Bytes>;

    /// GET an encoded sprite sheet. Non-2xx statuses are errors.
    async fn fetch_sprite(&self, url: &str) -> Result<Bytes>;
}

/// reqwest-backed transport with separate clients, since sprite sheets get a
/// longer timeout than manifests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    manifest_client: Client,
    sprite_client: Client,
    max_response_bytes: usize,
}

impl HttpTransport {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            manifest_client: build_client(config.manifest_timeout())?,
            sprite_client: build_client(config.sprite_timeout())?,
            max_response_bytes: config.max_response_bytes,
        })
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(Into::into)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_manifest(&self, url: &str) -> Result<Bytes> {
        tracing::debug!(url = %url, "Fetching sprite manifest");

        let response = self
            .manifest_client
            .get(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"))
            .send()
            .await?;

        tracing::debug!(url = %url, status = %response.status(), "Sprite manifest response");
        let response = check_response(response)?;
        bytes_with_limit(response, self.max_response_bytes).await
    }

    async fn fetch_sprite(&self, url: &str) -> Result<Bytes> {
        tracing::debug!(url = %url, "Fetching sprite sheet");

        let response = self.sprite_client.get(url).send().await?;

        tracing::debug!(url = %url, status = %response.status(), "Sprite sheet response");
        let response = check_response(response)?;
        bytes_with_limit(response, self.max_response_bytes).await
    }
}
