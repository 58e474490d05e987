//! Cancellable HTTP request units and the paged endpoint requests built on them.
//!
//! - [`HttpRequest`] - one network call with a typed result and a state machine
//!   (`Ready -> Executing -> {Succeeded, Failed, Cancelled}`)
//! - [`paged`] - collection endpoint requests (query, auth, status classification, decoding)
//! - [`factory`] - builds the paged request for a source and cursor

pub mod factory;
pub mod paged;

pub use factory::RequestFactory;
pub use paged::{Endpoint, PagedRequest};

use crate::error::{Error, Result};
use reqwest::Method;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Lifecycle state of an [`HttpRequest`]
///
/// Terminal states (`Succeeded`, `Failed`, `Cancelled`) never transition further.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// Built, not yet started
    Ready,
    /// Network call in progress
    Executing,
    /// Completed with a response
    Succeeded,
    /// Completed with an error
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl RequestState {
    fn to_u8(self) -> u8 {
        match self {
            RequestState::Ready => 0,
            RequestState::Executing => 1,
            RequestState::Succeeded => 2,
            RequestState::Failed => 3,
            RequestState::Cancelled => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => RequestState::Ready,
            1 => RequestState::Executing,
            2 => RequestState::Succeeded,
            3 => RequestState::Failed,
            _ => RequestState::Cancelled,
        }
    }

    /// Whether the state is final
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Succeeded | RequestState::Failed | RequestState::Cancelled
        )
    }
}

/// Status code and body of a completed HTTP exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Handle used to observe or cancel an [`HttpRequest`] from elsewhere
///
/// Cloning is cheap; all clones share the request's state.
#[derive(Clone, Debug)]
pub struct RequestHandle {
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl RequestHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(RequestState::Ready.to_u8())),
            token: CancellationToken::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> RequestState {
        RequestState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether the request was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state() == RequestState::Cancelled
    }

    /// Cancel the request
    ///
    /// Returns `true` if this call cancelled it. Cancelling a request that
    /// already finished is a no-op. Cancellation does not guarantee the remote
    /// server aborted the operation, only that no result is reported afterwards.
    pub fn cancel(&self) -> bool {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if RequestState::from_u8(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange(
                current,
                RequestState::Cancelled.to_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    self.token.cancel();
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Resolves once the request is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    fn transition(&self, from: RequestState, to: RequestState) -> bool {
        self.state
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// One cancellable asynchronous network call
///
/// The request is executed at most once; the result is reported exactly once
/// by the future returned from [`HttpRequest::execute`], unless the request
/// was cancelled, in which case the result is always [`Error::Cancelled`].
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    url: Result<Url>,
    headers: Vec<(&'static str, String)>,
    timeout: Duration,
    handle: RequestHandle,
}

impl HttpRequest {
    /// Build a GET request
    ///
    /// URL construction errors are kept and reported when the request executes,
    /// so callers see them through the same completion path as network errors.
    pub fn get(url: Result<Url>, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            timeout,
            handle: RequestHandle::new(),
        }
    }

    /// Add a request header
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Target URL, if it could be built
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref().ok()
    }

    /// Value of a request header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Handle for cancelling the request from another task
    pub fn handle(&self) -> RequestHandle {
        self.handle.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> RequestState {
        self.handle.state()
    }

    /// Cancel the request (no-op once it finished)
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    /// Perform the network call
    ///
    /// Performs exactly one HTTP exchange. Any status code is a successful
    /// exchange at this layer; classification happens in [`PagedRequest`].
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if the request was cancelled before or during the call
    /// - [`Error::InvalidUrl`] if the URL could not be built
    /// - [`Error::Transport`] for connection failures, timeouts and connections
    ///   dropped while the body was being read
    /// - [`Error::NoHttpResponse`] if the peer did not answer with HTTP
    pub async fn execute(self, client: &reqwest::Client) -> Result<RawResponse> {
        if !self
            .handle
            .transition(RequestState::Ready, RequestState::Executing)
        {
            return Err(Error::Cancelled);
        }

        let url = match self.url {
            Ok(url) => url,
            Err(e) => {
                self.handle
                    .transition(RequestState::Executing, RequestState::Failed);
                return Err(e);
            }
        };

        let mut builder = client
            .request(self.method.clone(), url.clone())
            .timeout(self.timeout);
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }

        let started = Instant::now();
        tracing::debug!(method = %self.method, url = %url, "Sending request");

        let outcome = tokio::select! {
            biased;
            _ = self.handle.cancelled() => Err(Error::Cancelled),
            result = send_and_read(builder) => result,
        };

        let elapsed_ms = started.elapsed().as_millis();
        match outcome {
            Ok(response) => {
                if !self
                    .handle
                    .transition(RequestState::Executing, RequestState::Succeeded)
                {
                    // Cancelled after the response arrived; suppress it
                    tracing::debug!(url = %url, "Discarding response of cancelled request");
                    return Err(Error::Cancelled);
                }
                tracing::debug!(
                    url = %url,
                    status = response.status,
                    bytes = response.body.len(),
                    elapsed_ms,
                    "Request finished"
                );
                Ok(response)
            }
            Err(Error::Cancelled) => {
                tracing::debug!(url = %url, elapsed_ms, "Request cancelled");
                Err(Error::Cancelled)
            }
            Err(e) => {
                if !self
                    .handle
                    .transition(RequestState::Executing, RequestState::Failed)
                {
                    return Err(Error::Cancelled);
                }
                tracing::debug!(url = %url, error = %e, elapsed_ms, "Request failed");
                Err(e)
            }
        }
    }
}

async fn send_and_read(builder: reqwest::RequestBuilder) -> Result<RawResponse> {
    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();
    Ok(RawResponse { status, body })
}
