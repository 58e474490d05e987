//! Page provider: pagination over one photo collection
//!
//! A [`PageProvider`] owns the accumulated records of one collection together
//! with its cursor and fetch flags. It builds requests through the
//! [`RequestFactory`], runs them on a shared [`ExecutionQueue`] and merges the
//! results in the consumer's task:
//!
//! ```no_run
//! use photo_feed::{Config, ExecutionQueue, PageProvider, ProviderEvent, SourceKind};
//!
//! # async fn example() -> photo_feed::Result<()> {
//! let config = Config::from_json_file("photo-feed.json").await?;
//! let queue = ExecutionQueue::new(&config)?;
//! let mut trending = PageProvider::from_config(SourceKind::Trending, &config, queue)?;
//!
//! trending.fetch_next_page();
//! while let Some(event) = trending.next_event().await {
//!     if let ProviderEvent::DidFetch { items, .. } = event {
//!         println!("{} new photos, {} total", items.len(), trending.items().len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod state;

pub use state::{MergedPage, ProviderState};

use crate::config::Config;
use crate::error::Result;
use crate::models::PhotoRecord;
use crate::queue::{ExecutionQueue, Submission};
use crate::request::RequestFactory;
use crate::types::{FetchStart, PageCursor, ProviderEvent, SourceKind};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Buffered events per broadcast subscriber before the slowest one lags
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Paginated view of one photo collection
///
/// All state changes happen in the task that owns the provider: requests
/// complete on the queue, but their results are only applied (and mirrored
/// to subscribers) when the owner awaits [`PageProvider::next_event`]. The
/// owner must keep driving it while a request is in flight. At most one
/// request is in flight.
///
/// Dropping the provider cancels its in-flight request.
pub struct PageProvider {
    source: SourceKind,
    factory: RequestFactory,
    queue: ExecutionQueue,
    state: ProviderState,
    in_flight: Option<Submission>,
    pending: VecDeque<ProviderEvent>,
    event_tx: broadcast::Sender<ProviderEvent>,
}

impl std::fmt::Debug for PageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageProvider")
            .field("source", &self.source)
            .field("cursor", &self.state.cursor())
            .field("items", &self.state.items().len())
            .field("is_fetching", &self.state.is_fetching())
            .field("is_refreshing", &self.state.is_refreshing())
            .field("can_fetch_more", &self.state.can_fetch_more())
            .finish()
    }
}

impl PageProvider {
    /// Create a provider for `source` requesting `page_size` records per page
    pub fn new(
        source: SourceKind,
        factory: RequestFactory,
        queue: ExecutionQueue,
        page_size: u32,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            factory,
            queue,
            state: ProviderState::new(page_size),
            in_flight: None,
            pending: VecDeque::new(),
            event_tx,
        }
    }

    /// Create a provider using the API and paging settings of `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the base URL is unusable.
    pub fn from_config(source: SourceKind, config: &Config, queue: ExecutionQueue) -> Result<Self> {
        let factory = RequestFactory::new(&config.api)?;
        Ok(Self::new(source, factory, queue, config.paging.page_size))
    }

    /// Collection this provider pages through
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Accumulated records in page order
    pub fn items(&self) -> &[PhotoRecord] {
        self.state.items()
    }

    /// Cursor of the next page to fetch
    pub fn cursor(&self) -> PageCursor {
        self.state.cursor()
    }

    /// Whether a request is in flight
    pub fn is_fetching(&self) -> bool {
        self.state.is_fetching()
    }

    /// Whether the in-flight request will replace the accumulated items
    pub fn is_refreshing(&self) -> bool {
        self.state.is_refreshing()
    }

    /// Whether the last fetched page was full
    pub fn can_fetch_more(&self) -> bool {
        self.state.can_fetch_more()
    }

    /// Read-only view of the pagination state
    pub fn state(&self) -> &ProviderState {
        &self.state
    }

    /// Subscribe to this provider's events
    ///
    /// Subscribers only observe: a completion is applied and broadcast when
    /// the owner awaits [`PageProvider::next_event`]. Without an owner
    /// driving `next_event`, subscribers see `WillStartFetching` and nothing
    /// more, and the provider stays fetching.
    ///
    /// Subscribers are not owned by the provider; dropping a receiver simply
    /// stops delivery to it.
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to this provider's events as a stream
    ///
    /// Same delivery rules as [`PageProvider::subscribe`]: the owner must
    /// drive [`PageProvider::next_event`].
    pub fn event_stream(&self) -> BroadcastStream<ProviderEvent> {
        BroadcastStream::new(self.event_tx.subscribe())
    }

    /// Fetch the page at the current cursor
    ///
    /// Dropped without effect while a request is in flight or after a short
    /// page ended pagination.
    pub fn fetch_next_page(&mut self) -> FetchStart {
        match self.state.begin_fetch() {
            Ok(cursor) => {
                self.dispatch(cursor);
                FetchStart::Started
            }
            Err(skipped) => {
                tracing::trace!(source = %self.source, reason = ?skipped, "Fetch request dropped");
                skipped
            }
        }
    }

    /// Start over from the first page, replacing the items on success
    ///
    /// While a request is in flight no second request is made; the in-flight
    /// request's result replaces the items instead.
    pub fn refresh(&mut self) -> FetchStart {
        tracing::debug!(source = %self.source, "Refresh requested");
        match self.state.begin_refresh() {
            Ok(cursor) => {
                self.dispatch(cursor);
                FetchStart::Started
            }
            Err(skipped) => skipped,
        }
    }

    /// Cancel the in-flight request
    ///
    /// No event is emitted for it and the state returns to what it was before
    /// the request was dispatched. Returns whether a request was cancelled.
    pub fn cancel(&mut self) -> bool {
        let Some(submission) = self.in_flight.take() else {
            return false;
        };

        submission.cancel();
        self.state.cancel();
        self.pending.clear();
        tracing::debug!(
            source = %self.source,
            submission = submission.id(),
            "In-flight request cancelled"
        );
        true
    }

    /// Wait for the next event and apply it to the provider
    ///
    /// Returns queued notifications first, then waits for the in-flight
    /// request and merges its result. Returns `None` when nothing is in
    /// flight. Cancel-safe: dropping the future leaves the request in flight.
    pub async fn next_event(&mut self) -> Option<ProviderEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        let outcome = self.in_flight.as_mut()?.wait().await;
        self.in_flight = None;

        let event = match outcome {
            Some(Ok(page)) => {
                let merged = self.state.complete(page);
                tracing::debug!(
                    source = %self.source,
                    count = merged.items.len(),
                    total = self.state.items().len(),
                    refreshed = merged.refreshed,
                    can_fetch_more = merged.can_fetch_more,
                    "Page merged"
                );
                ProviderEvent::DidFetch {
                    source: self.source,
                    items: merged.items,
                    refreshed: merged.refreshed,
                    can_fetch_more: merged.can_fetch_more,
                }
            }
            Some(Err(error)) => {
                self.state.fail();
                tracing::warn!(
                    source = %self.source,
                    error = %error,
                    code = error.error_code(),
                    "Fetch failed"
                );
                ProviderEvent::FetchFailed {
                    source: self.source,
                    error,
                }
            }
            None => {
                // Cancelled underneath us; nothing to report
                self.state.cancel();
                return None;
            }
        };

        self.emit_event(event.clone());
        Some(event)
    }

    fn dispatch(&mut self, cursor: PageCursor) {
        let request = self.factory.request(self.source, cursor);
        let submission = self.queue.submit(request);
        let refreshing = self.state.is_refreshing();

        tracing::debug!(
            source = %self.source,
            page = cursor.page(),
            per_page = cursor.per_page(),
            refreshing,
            submission = submission.id(),
            "Fetch dispatched"
        );

        self.in_flight = Some(submission);
        let event = ProviderEvent::WillStartFetching {
            source: self.source,
            cursor,
            refreshing,
        };
        self.pending.push_back(event.clone());
        self.emit_event(event);
    }

    fn emit_event(&self, event: ProviderEvent) {
        // No subscribers is fine; the owner still gets the event from next_event
        self.event_tx.send(event).ok();
    }
}

impl Drop for PageProvider {
    fn drop(&mut self) {
        if let Some(submission) = self.in_flight.take() {
            submission.cancel();
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
