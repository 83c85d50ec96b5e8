//! Request-scoped cancellation and deadlines
//!
//! The runtime hands a [`Context`] to every provider call. Providers forward
//! it unmodified to their API clients, which bound each request by
//! [`Context::remaining`] and abort when [`Context::cancelled`] resolves.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

/// Context carries a request id, an optional deadline and a cancellation
/// signal across async boundaries
/// CRITICAL: Pass this as first parameter to ALL async trait methods
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    request_id: String,
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        Self::build(Uuid::new_v4().to_string(), None)
    }

    /// Derives a context that is cancelled once `timeout` elapses or the
    /// parent is cancelled. The request id is kept so log lines stay
    /// correlated.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let derived = Self::build(self.inner.request_id.clone(), Some(deadline));

        let done_tx = derived.inner.done_tx.clone();
        let mut parent_done = self.done();
        tokio::spawn(async move {
            let parent_cancelled = async move {
                let closed = parent_done.wait_for(|cancelled| *cancelled).await.is_err();
                if closed {
                    // parent dropped without being cancelled
                    std::future::pending::<()>().await;
                }
            };
            tokio::select! {
                _ = tokio::time::sleep_until(deadline.into()) => {}
                _ = parent_cancelled => {}
            }
            let _ = done_tx.send(true);
        });

        derived
    }

    fn build(request_id: String, deadline: Option<Instant>) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                request_id,
                deadline,
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, None when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns a channel that flips to true when work done on behalf of this
    /// context should be cancelled
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        let mut done = self.done();
        // the sender lives in self, so the channel cannot close underneath us
        let _ = done.wait_for(|cancelled| *cancelled).await;
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
