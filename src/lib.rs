//! # photo-feed
//!
//! Paginated photo feed client: fetches pages of photo metadata from a remote
//! photo API and accumulates them for display.
//!
//! ## Design Philosophy
//!
//! photo-feed is designed to be:
//! - **Explicitly configured** - Base URL and credentials are passed in, never read from globals
//! - **One request per provider** - A provider never has two pages in flight
//! - **Library-first** - No UI, purely a Rust crate for embedding
//! - **Event-driven** - The owner awaits `next_event()`, other observers subscribe
//!
//! A provider's owner drives it by awaiting `PageProvider::next_event()`; that
//! is where completions are applied and broadcast to `subscribe()` and
//! `event_stream()` receivers. Subscribing alone does not advance a provider.
//!
//! ## Quick Start
//!
//! ```no_run
//! use photo_feed::{Config, ExecutionQueue, PageProvider, ProviderEvent, SourceKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_json_str(r#"{"api": {"access_key": "my-access-key"}}"#)?;
//!
//!     // One queue shared by every provider
//!     let queue = ExecutionQueue::new(&config)?;
//!     let mut trending = PageProvider::from_config(SourceKind::Trending, &config, queue.clone())?;
//!     let mut random = PageProvider::from_config(SourceKind::Random, &config, queue)?;
//!
//!     trending.fetch_next_page();
//!     random.fetch_next_page();
//!
//!     while let Some(event) = trending.next_event().await {
//!         match event {
//!             ProviderEvent::DidFetch { items, can_fetch_more, .. } => {
//!                 println!("{} photos, more: {}", items.len(), can_fetch_more);
//!             }
//!             ProviderEvent::FetchFailed { error, .. } => eprintln!("fetch failed: {}", error),
//!             ProviderEvent::WillStartFetching { .. } => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Image fetching and caching
pub mod images;
/// Photo and user records
pub mod models;
/// Paginated providers
pub mod provider;
/// Shared request execution
pub mod queue;
/// HTTP and paged requests
pub mod request;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, CacheConfig, Config, PagingConfig, QueueConfig};
pub use error::{Error, Result};
pub use images::{FetchedImage, ImageCache, ImageDownloader, ImageStore};
pub use models::{HexColor, PhotoRecord, UrlKind, UserRecord};
pub use provider::PageProvider;
pub use queue::{ExecutionQueue, QueueStats, Submission};
pub use request::{Endpoint, PagedRequest, RequestFactory};
pub use types::{FetchStart, PageCursor, ProviderEvent, SourceKind};
