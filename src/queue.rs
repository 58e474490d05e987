//! Shared execution queue for paged requests
//!
//! The queue owns the HTTP client and bounds how many requests run at once
//! across every provider sharing it. Each submission gets its own completion
//! channel, so results of different providers never mix, and the completion is
//! consumed by the submitting provider in the consumer's task.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::PhotoRecord;
use crate::request::{PagedRequest, RequestHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Semaphore, oneshot};

/// Counters describing queue activity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Requests submitted since creation
    pub submitted: u64,
    /// Requests currently waiting for a slot or running
    pub in_flight: usize,
    /// Requests that delivered a result
    pub completed: u64,
    /// Requests that ended by cancellation
    pub cancelled: u64,
}

struct QueueInner {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    submitted: AtomicU64,
    in_flight: AtomicUsize,
    completed: AtomicU64,
    cancelled: AtomicU64,
}

/// Runs paged requests with bounded concurrency (cloneable, all state is shared)
#[derive(Clone)]
pub struct ExecutionQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for ExecutionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionQueue")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ExecutionQueue {
    /// Create a queue with its own HTTP client
    ///
    /// The client does not follow redirects: a 3xx answer is reported as
    /// [`Error::UnexpectedStatus`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the
    /// concurrency limit is zero.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.api.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: None,
            })?;
        Self::with_client(client, config.queue.max_concurrent_requests)
    }

    /// Create a queue around an existing client
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_concurrent` is zero.
    pub fn with_client(client: reqwest::Client, max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(Error::config(
                "queue.max_concurrent_requests",
                "at least one concurrent request is required",
            ));
        }

        Ok(Self {
            inner: Arc::new(QueueInner {
                client,
                permits: Arc::new(Semaphore::new(max_concurrent)),
                max_concurrent,
                submitted: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                cancelled: AtomicU64::new(0),
            }),
        })
    }

    /// HTTP client shared by all requests of this queue
    pub fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    /// Current activity counters
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.inner.submitted.load(Ordering::SeqCst),
            in_flight: self.inner.in_flight.load(Ordering::SeqCst),
            completed: self.inner.completed.load(Ordering::SeqCst),
            cancelled: self.inner.cancelled.load(Ordering::SeqCst),
        }
    }

    /// Submit a request for execution
    ///
    /// The request runs on the tokio runtime once a concurrency slot is free.
    /// Its result is delivered through the returned [`Submission`]; a cancelled
    /// request delivers nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: PagedRequest) -> Submission {
        let id = self.inner.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);

        let handle = request.handle();
        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        let task_handle = handle.clone();

        tracing::debug!(
            submission = id,
            source = %request.endpoint().source(),
            page = request.cursor().page(),
            "Request submitted"
        );

        tokio::spawn(async move {
            let delivered = run_submission(&inner, request, &task_handle, tx).await;
            inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            if delivered {
                inner.completed.fetch_add(1, Ordering::SeqCst);
            } else {
                inner.cancelled.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(submission = id, "Request cancelled, no completion delivered");
            }
        });

        Submission {
            id,
            handle,
            completion: rx,
        }
    }
}

/// Wait for a slot, run the request and deliver its result
///
/// Returns whether a result was delivered.
async fn run_submission(
    inner: &QueueInner,
    request: PagedRequest,
    handle: &RequestHandle,
    tx: oneshot::Sender<Result<Vec<PhotoRecord>>>,
) -> bool {
    let _permit = tokio::select! {
        biased;
        _ = handle.cancelled() => return false,
        permit = inner.permits.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return false,
        },
    };

    let result = request.execute(&inner.client).await;
    if matches!(result, Err(Error::Cancelled)) || handle.is_cancelled() {
        return false;
    }

    // The receiver may be gone if the provider was dropped meanwhile
    tx.send(result).is_ok()
}

/// A request accepted by the [`ExecutionQueue`]
#[derive(Debug)]
pub struct Submission {
    id: u64,
    handle: RequestHandle,
    completion: oneshot::Receiver<Result<Vec<PhotoRecord>>>,
}

impl Submission {
    /// Queue-unique submission number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handle of the underlying request
    pub fn handle(&self) -> &RequestHandle {
        &self.handle
    }

    /// Cancel the request; no result will be delivered afterwards
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    /// Wait for the result
    ///
    /// Returns `None` if the request was cancelled. Cancel-safe: dropping the
    /// future keeps the submission intact.
    pub async fn wait(&mut self) -> Option<Result<Vec<PhotoRecord>>> {
        let result = (&mut self.completion).await.ok()?;
        if self.handle.is_cancelled() {
            return None;
        }
        Some(result)
    }
}
