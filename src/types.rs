//! Core types for photo-feed

use crate::error::Error;
use crate::models::PhotoRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Page number and page size identifying the next page to fetch
///
/// Cursors are immutable values; [`PageCursor::next`] produces a new cursor
/// one page further on with the same page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor {
    page: u32,
    per_page: u32,
}

impl PageCursor {
    /// Create a cursor, clamping `page` and `per_page` to at least 1
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// The first page for the given page size
    pub fn first(per_page: u32) -> Self {
        Self::new(1, per_page)
    }

    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Number of records requested per page
    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// The cursor for the following page
    #[must_use]
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            per_page: self.per_page,
        }
    }

    /// Whether a page of `count` records is a full page for this cursor
    pub fn is_full_page(&self, count: usize) -> bool {
        count == self.per_page as usize
    }
}

impl std::fmt::Display for PageCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {} ({} per page)", self.page, self.per_page)
    }
}

/// Which photo collection a provider pages through
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Popular photos (`GET /photos/?order_by=popular`)
    Trending,
    /// Random photos (`GET /photos/random?count=N`)
    Random,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Trending => write!(f, "trending"),
            SourceKind::Random => write!(f, "random"),
        }
    }
}

/// Outcome of asking a provider to start a fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStart {
    /// A request was dispatched to the execution queue
    Started,
    /// A request is already in flight; the call was dropped
    AlreadyFetching,
    /// A short page ended pagination; only `refresh()` fetches again
    Exhausted,
}

impl FetchStart {
    /// Whether a new request was dispatched
    pub fn is_started(&self) -> bool {
        matches!(self, FetchStart::Started)
    }
}

/// Notifications emitted by a page provider
///
/// Events are delivered from the consumer's own task (see
/// [`PageProvider::next_event`](crate::provider::PageProvider::next_event))
/// and mirrored to every broadcast subscriber.
#[derive(Clone, Debug)]
pub enum ProviderEvent {
    /// A request was dispatched
    WillStartFetching {
        /// Source the provider pages through
        source: SourceKind,
        /// Cursor the request was built for
        cursor: PageCursor,
        /// Whether the request replaces the accumulated items
        refreshing: bool,
    },

    /// A page was fetched and merged into the provider's items
    DidFetch {
        /// Source the provider pages through
        source: SourceKind,
        /// Records of the fetched page, in response order
        items: Arc<[PhotoRecord]>,
        /// Whether the page replaced the accumulated items
        refreshed: bool,
        /// Whether another page is expected
        can_fetch_more: bool,
    },

    /// A fetch failed; accumulated items and cursor are unchanged
    FetchFailed {
        /// Source the provider pages through
        source: SourceKind,
        /// Cause of the failure
        error: Error,
    },
}

impl ProviderEvent {
    /// Source the event belongs to
    pub fn source(&self) -> SourceKind {
        match self {
            ProviderEvent::WillStartFetching { source, .. }
            | ProviderEvent::DidFetch { source, .. }
            | ProviderEvent::FetchFailed { source, .. } => *source,
        }
    }
}
