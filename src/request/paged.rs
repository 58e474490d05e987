//! Paged requests against the photo collection endpoints.

use super::{HttpRequest, RawResponse, RequestHandle};
use crate::error::{Error, Result};
use crate::models::{PhotoRecord, decode_photos};
use crate::types::{PageCursor, SourceKind};
use std::time::Duration;
use url::Url;

/// Collection endpoint and the query parameters specific to it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET photos/?order_by=popular`
    Trending,
    /// `GET photos/random?count={per_page}`
    Random,
}

impl Endpoint {
    /// Endpoint serving the given source
    pub fn for_source(source: SourceKind) -> Self {
        match source {
            SourceKind::Trending => Endpoint::Trending,
            SourceKind::Random => Endpoint::Random,
        }
    }

    /// Source this endpoint serves
    pub fn source(&self) -> SourceKind {
        match self {
            Endpoint::Trending => SourceKind::Trending,
            Endpoint::Random => SourceKind::Random,
        }
    }

    /// Path relative to the API base URL
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Trending => "photos/",
            Endpoint::Random => "photos/random",
        }
    }

    /// Full query for a cursor, endpoint-specific parameters first
    pub fn query(&self, cursor: PageCursor) -> Vec<(&'static str, String)> {
        let mut query = match self {
            Endpoint::Trending => vec![("order_by", "popular".to_string())],
            Endpoint::Random => vec![("count", cursor.per_page().to_string())],
        };
        query.push(("page", cursor.page().to_string()));
        query.push(("per_page", cursor.per_page().to_string()));
        query
    }

    /// Absolute URL for a cursor
    ///
    /// `base` must end with `/` for its path to be kept as a prefix.
    pub fn url(&self, base: &Url, cursor: PageCursor) -> Result<Url> {
        let mut url = base.join(self.path())?;
        url.query_pairs_mut().extend_pairs(self.query(cursor));
        Ok(url)
    }
}

/// A request for one page of photo records
#[derive(Debug)]
pub struct PagedRequest {
    endpoint: Endpoint,
    cursor: PageCursor,
    request: HttpRequest,
}

impl PagedRequest {
    /// Build the request for `cursor` on `endpoint`
    ///
    /// Adds the `Authorization: Client-ID {access_key}` header and the request
    /// timeout. An unbuildable URL is reported when the request executes.
    pub fn new(
        base: &Url,
        access_key: &str,
        timeout: Duration,
        endpoint: Endpoint,
        cursor: PageCursor,
    ) -> Self {
        let request = HttpRequest::get(endpoint.url(base, cursor), timeout)
            .with_header("Authorization", format!("Client-ID {}", access_key))
            .with_header("Accept-Version", "v1");

        Self {
            endpoint,
            cursor,
            request,
        }
    }

    /// Endpoint the request targets
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Cursor the request was built for
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Underlying HTTP request
    pub fn http(&self) -> &HttpRequest {
        &self.request
    }

    /// Handle for cancelling the request from another task
    pub fn handle(&self) -> RequestHandle {
        self.request.handle()
    }

    /// Execute the request and decode the page
    ///
    /// No retry is attempted at this layer.
    ///
    /// # Errors
    ///
    /// Any error of [`HttpRequest::execute`], plus the status classification of
    /// [`classify_response`].
    pub async fn execute(self, client: &reqwest::Client) -> Result<Vec<PhotoRecord>> {
        let source = self.endpoint.source();
        let cursor = self.cursor;
        let response = self.request.execute(client).await?;
        let result = classify_response(&response);

        match &result {
            Ok(photos) => tracing::debug!(
                source = %source,
                page = cursor.page(),
                per_page = cursor.per_page(),
                count = photos.len(),
                "Page decoded"
            ),
            Err(e) => tracing::warn!(
                source = %source,
                page = cursor.page(),
                status = response.status,
                error = %e,
                "Page request failed"
            ),
        }

        result
    }
}

/// Classify a response by status and decode successful bodies
///
/// - 200-299: body decoded as a list of photo records ([`Error::Decode`] on mismatch)
/// - 400-499: [`Error::Http`]
/// - anything else: [`Error::UnexpectedStatus`], fatal for this request
pub fn classify_response(response: &RawResponse) -> Result<Vec<PhotoRecord>> {
    if response.is_success() {
        return decode_photos(&response.body);
    }

    if (400..500).contains(&response.status) {
        let body = String::from_utf8_lossy(&response.body);
        tracing::debug!(status = response.status, body = %body, "Client error response");
    }
    Err(Error::from_status(response.status))
}
