//! Single-slot image downloader backed by an [`ImageCache`]

use super::store::{ImageCache, ImageStore};
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Image bytes returned by [`ImageDownloader::fetch`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedImage {
    /// Encoded image data as served
    pub bytes: Vec<u8>,
    /// Whether the bytes came from the cache
    pub cached: bool,
}

/// Downloads one image at a time, consulting the cache first
///
/// Typically one downloader exists per displayed image (a grid cell, an
/// avatar view), so a new fetch while one is running is dropped rather than
/// queued. Several downloaders can share one [`ImageCache`].
pub struct ImageDownloader {
    client: reqwest::Client,
    cache: Arc<ImageCache>,
    timeout: Duration,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl ImageDownloader {
    /// Create a downloader using `client` and `cache`
    pub fn new(client: reqwest::Client, cache: Arc<ImageCache>, timeout: Duration) -> Self {
        Self {
            client,
            cache,
            timeout,
            in_flight: Mutex::new(None),
        }
    }

    /// Cache consulted before and filled after each download
    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Whether a fetch is running
    pub fn is_fetching(&self) -> bool {
        self.slot().is_some()
    }

    /// Fetch the image at `url`
    ///
    /// Returns `Ok(None)` without doing anything if another fetch of this
    /// downloader is running. Only successful responses are cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if [`ImageDownloader::cancel`] was called
    /// during the fetch, including while the cache was being read, otherwise the transport and status errors of a page
    /// request.
    pub async fn fetch(&self, url: &Url) -> Result<Option<FetchedImage>> {
        let token = {
            let mut slot = self.slot();
            if slot.is_some() {
                tracing::trace!(url = %url, "Image fetch dropped, another fetch is running");
                return Ok(None);
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        let _slot = SlotGuard(&self.in_flight);

        let cached = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            cached = self.cache.get(url.as_str()) => cached,
        };
        if let Some(bytes) = cached {
            tracing::trace!(url = %url, bytes = bytes.len(), "Image cache hit");
            return Ok(Some(FetchedImage {
                bytes,
                cached: true,
            }));
        }

        let bytes = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            result = self.download(url) => result?,
        };

        if let Err(e) = self.cache.put(url.as_str(), &bytes).await {
            tracing::warn!(url = %url, error = %e, "Failed to cache image");
        }

        Ok(Some(FetchedImage {
            bytes,
            cached: false,
        }))
    }

    /// Cancel the running fetch, if any
    pub fn cancel(&self) {
        if let Some(token) = self.slot().as_ref() {
            token.cancel();
        }
    }

    async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Image request failed");
            return Err(Error::from_status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Image downloaded");
        Ok(bytes.to_vec())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frees the in-flight slot however the fetch ends
struct SlotGuard<'a>(&'a Mutex<Option<CancellationToken>>);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
