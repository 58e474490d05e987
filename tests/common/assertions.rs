//! Event helpers for integration tests

use photo_feed::{PageProvider, ProviderEvent};
use std::time::Duration;

/// Outcome of waiting for a fetch to finish
#[derive(Debug)]
pub enum WaitResult {
    /// The page was merged
    Fetched {
        /// Records in the page
        count: usize,
        /// Whether the page replaced the items
        refreshed: bool,
    },
    /// The fetch failed
    Failed(photo_feed::Error),
    /// Nothing was in flight, or the request was cancelled
    Idle,
    /// No completion within the timeout
    Timeout,
}

/// Drive `provider` until its in-flight fetch completes
pub async fn wait_for_completion(provider: &mut PageProvider, timeout: Duration) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match provider.next_event().await {
                Some(ProviderEvent::DidFetch {
                    items, refreshed, ..
                }) => {
                    return WaitResult::Fetched {
                        count: items.len(),
                        refreshed,
                    };
                }
                Some(ProviderEvent::FetchFailed { error, .. }) => return WaitResult::Failed(error),
                Some(ProviderEvent::WillStartFetching { .. }) => continue,
                None => return WaitResult::Idle,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}
