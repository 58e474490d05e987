//! Error types for photo-feed
//!
//! This module provides the error taxonomy shared by every layer of the crate:
//! - Request construction failures (invalid URL)
//! - Transport failures (connection errors, timeouts, truncated responses)
//! - HTTP status classification (4xx vs. anything else outside 2xx)
//! - Response decoding failures
//! - Cancellation
//! - Configuration and local I/O failures (image disk store)
//!
//! Errors propagate unchanged from the request layer to the page provider,
//! which reports them to its subscribers without classifying or recovering.

use thiserror::Error;

/// Result type alias for photo-feed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for photo-feed
///
/// The type is `Clone` so that it can travel inside broadcast events; variants
/// carry rendered messages instead of the underlying library errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The request URL could not be built from the configured base URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered with something that is not an HTTP response
    #[error("no HTTP response: {0}")]
    NoHttpResponse(String),

    /// The server answered with a client error (4xx)
    #[error("HTTP error: {status}")]
    Http {
        /// HTTP status code in the 400..=499 range
        status: u16,
    },

    /// The server answered with a status that is neither 2xx nor 4xx
    ///
    /// Redirects are not followed and server errors are not retried; both end
    /// up here and are fatal for the request that produced them.
    #[error("request failed with unexpected status {status}")]
    UnexpectedStatus {
        /// HTTP status code outside the 2xx and 4xx ranges
        status: u16,
    },

    /// The response body did not match the expected JSON shape
    #[error("failed to decode response: {message}")]
    Decode {
        /// Decoder error detail
        message: String,
    },

    /// Network-level failure, including the per-request timeout
    #[error("transport error: {message}")]
    Transport {
        /// Transport error detail
        message: String,
        /// Whether the failure was the request timeout elapsing
        timed_out: bool,
    },

    /// The request was cancelled before it completed
    #[error("request cancelled")]
    Cancelled,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.access_key")
        key: Option<String>,
    },

    /// Local I/O error (image disk store, config file)
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Get the machine-readable error code
    ///
    /// UI layers can use this to pick an error presentation without matching
    /// on the variants themselves.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "invalid_url",
            Error::NoHttpResponse(_) => "no_http_response",
            Error::Http { .. } => "http_error",
            Error::UnexpectedStatus { .. } => "unexpected_status",
            Error::Decode { .. } => "decode_error",
            Error::Transport { timed_out: true, .. } => "timeout",
            Error::Transport { .. } => "transport_error",
            Error::Cancelled => "cancelled",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status } | Error::UnexpectedStatus { status } => Some(*status),
            _ => None,
        }
    }

    /// Classify an HTTP status code that is not a success
    ///
    /// 4xx becomes [`Error::Http`], everything else [`Error::UnexpectedStatus`].
    pub fn from_status(status: u16) -> Self {
        if (400..500).contains(&status) {
            Error::Http { status }
        } else {
            Error::UnexpectedStatus { status }
        }
    }

    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Transport {
                message: e.to_string(),
                timed_out: true,
            }
        } else if e.is_builder() {
            Error::InvalidUrl(e.to_string())
        } else if is_malformed_response(&e) {
            Error::NoHttpResponse(error_chain(&e))
        } else {
            // Includes connections dropped while reading the body
            Error::Transport {
                message: error_chain(&e),
                timed_out: false,
            }
        }
    }
}

/// Whether the peer answered with something that is not an HTTP response
///
/// The HTTP parser reports these as "invalid ... parsed" somewhere in the
/// source chain.
fn is_malformed_response(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        if cause.to_string().contains("parsed") {
            return true;
        }
        source = cause.source();
    }
    false
}

fn error_chain(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode {
            message: e.to_string(),
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidUrl(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
