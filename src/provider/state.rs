//! Pagination state owned by one page provider.
//!
//! The transitions here are synchronous and free of I/O: the provider calls
//! [`ProviderState::begin_fetch`] / [`ProviderState::begin_refresh`] before
//! dispatching a request and exactly one of [`ProviderState::complete`],
//! [`ProviderState::fail`] or [`ProviderState::cancel`] when it resolves.

use crate::models::PhotoRecord;
use crate::types::{FetchStart, PageCursor};
use std::sync::Arc;

/// Values restored when a dispatched request fails or is cancelled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Rollback {
    cursor: PageCursor,
    is_refreshing: bool,
    exhausted: bool,
}

/// Result of merging a fetched page
#[derive(Clone, Debug)]
pub struct MergedPage {
    /// Records of the page, in response order
    pub items: Arc<[PhotoRecord]>,
    /// Whether the page replaced the accumulated items
    pub refreshed: bool,
    /// Whether the page was full and another page is expected
    pub can_fetch_more: bool,
}

/// Accumulated items, cursor and fetch flags of one provider
#[derive(Clone, Debug)]
pub struct ProviderState {
    items: Vec<PhotoRecord>,
    initial: PageCursor,
    cursor: PageCursor,
    is_fetching: bool,
    is_refreshing: bool,
    can_fetch_more: bool,
    exhausted: bool,
    rollback: Option<Rollback>,
}

impl ProviderState {
    /// Fresh state starting at page 1 with the given page size
    pub fn new(page_size: u32) -> Self {
        let initial = PageCursor::first(page_size);
        Self {
            items: Vec::new(),
            initial,
            cursor: initial,
            is_fetching: false,
            is_refreshing: false,
            can_fetch_more: false,
            exhausted: false,
            rollback: None,
        }
    }

    /// Accumulated records, in page order
    pub fn items(&self) -> &[PhotoRecord] {
        &self.items
    }

    /// Cursor of the next page to fetch
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Page size, fixed for the state's lifetime
    pub fn page_size(&self) -> u32 {
        self.initial.per_page()
    }

    /// Whether a request is in flight
    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    /// Whether the next completion replaces the accumulated items
    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }

    /// Whether the last page was full
    pub fn can_fetch_more(&self) -> bool {
        self.can_fetch_more
    }

    /// Whether a short page ended pagination
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Start fetching the page at the current cursor
    ///
    /// Returns the cursor to request, or why no request should be made.
    pub fn begin_fetch(&mut self) -> Result<PageCursor, FetchStart> {
        if self.is_fetching {
            return Err(FetchStart::AlreadyFetching);
        }
        if self.exhausted {
            return Err(FetchStart::Exhausted);
        }

        self.save_rollback();
        self.is_fetching = true;
        self.is_refreshing = false;
        Ok(self.cursor)
    }

    /// Reset to the first page and fetch it, replacing the items on success
    ///
    /// While a request is in flight the reset is applied but no new request
    /// is made: the in-flight request's result replaces the items instead.
    pub fn begin_refresh(&mut self) -> Result<PageCursor, FetchStart> {
        if self.is_fetching {
            self.cursor = self.initial;
            self.is_refreshing = true;
            self.exhausted = false;
            return Err(FetchStart::AlreadyFetching);
        }

        self.save_rollback();
        self.cursor = self.initial;
        self.is_refreshing = true;
        self.exhausted = false;
        self.is_fetching = true;
        Ok(self.cursor)
    }

    /// Merge a successfully fetched page
    pub fn complete(&mut self, page: Vec<PhotoRecord>) -> MergedPage {
        self.is_fetching = false;
        self.rollback = None;

        self.can_fetch_more = self.cursor.is_full_page(page.len());
        if self.can_fetch_more {
            self.cursor = self.cursor.next();
        } else {
            self.exhausted = true;
        }

        let refreshed = self.is_refreshing;
        if refreshed {
            self.items.clear();
            self.is_refreshing = false;
        }
        self.items.extend(page.iter().cloned());

        MergedPage {
            items: page.into(),
            refreshed,
            can_fetch_more: self.can_fetch_more,
        }
    }

    /// Record a failed request; items and cursor return to their pre-call values
    pub fn fail(&mut self) {
        self.restore_rollback();
    }

    /// Record a cancelled request; nothing it started is kept
    pub fn cancel(&mut self) {
        self.restore_rollback();
    }

    fn save_rollback(&mut self) {
        self.rollback = Some(Rollback {
            cursor: self.cursor,
            is_refreshing: self.is_refreshing,
            exhausted: self.exhausted,
        });
    }

    fn restore_rollback(&mut self) {
        self.is_fetching = false;
        if let Some(rollback) = self.rollback.take() {
            self.cursor = rollback.cursor;
            self.is_refreshing = rollback.is_refreshing;
            self.exhausted = rollback.exhausted;
        }
    }
}
