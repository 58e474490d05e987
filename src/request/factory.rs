//! Builds paged requests so that providers never construct them directly.

use super::paged::{Endpoint, PagedRequest};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{PageCursor, SourceKind};
use std::time::Duration;
use url::Url;

/// Stateless builder of [`PagedRequest`]s
///
/// Holds the API base URL, access key and timeout passed in at construction.
#[derive(Clone, Debug)]
pub struct RequestFactory {
    base_url: Url,
    access_key: String,
    timeout: Duration,
}

impl RequestFactory {
    /// Create a factory from API settings
    ///
    /// A trailing `/` is added to the base URL so that its path is kept as a
    /// prefix of every endpoint path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL cannot be parsed or cannot
    /// serve as a base.
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let mut base_url = Url::parse(&api.base_url).map_err(|e| {
            Error::config("api.base_url", format!("invalid base URL: {}", e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(
                "api.base_url",
                format!("'{}' cannot be used as a base URL", api.base_url),
            ));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            access_key: api.access_key.clone(),
            timeout: api.timeout,
        })
    }

    /// Base URL all endpoints are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the request for `source` at `cursor`
    pub fn request(&self, source: SourceKind, cursor: PageCursor) -> PagedRequest {
        PagedRequest::new(
            &self.base_url,
            &self.access_key,
            self.timeout,
            Endpoint::for_source(source),
            cursor,
        )
    }
}
