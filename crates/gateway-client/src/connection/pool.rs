//! Bounded handler pool
//!
//! A fixed number of permits limits how many handlers run at once. The read
//! loop takes a permit before spawning, so a full pool stalls reading.

use crate::handlers::{HandlerError, HandlerResult};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Default number of concurrently running handlers
pub const DEFAULT_WORKERS: usize = 20;

/// Fixed-size pool of handler tasks
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    size: usize,
}

impl WorkerPool {
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            size,
        }
    }

    /// Number of permits
    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a handler
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Handlers spawned and not yet finished
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for a free permit; `None` when `scope` is cancelled first
    pub async fn acquire(&self, scope: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            () = scope.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        }
    }

    /// Run `task` holding `permit` until it finishes
    ///
    /// Failures and panics are logged here and never reach the caller.
    pub fn spawn<F>(&self, permit: OwnedSemaphorePermit, label: &'static str, task: F)
    where
        F: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            let outcome = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(&*panic))));
            drop(permit);

            match outcome {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(handler = label, "Handler cancelled");
                }
                Err(HandlerError::Panicked(message)) => {
                    tracing::error!(handler = label, panic = %message, "Handler panicked");
                }
                Err(e) => {
                    tracing::warn!(handler = label, error = %e, "Handler failed");
                }
            }
        });
    }

    /// Stop accepting tasks for the purpose of [`wait`](Self::wait)
    pub fn close(&self) {
        self.tracker.close();
    }

    /// Wait for every spawned handler once the pool is closed
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_permits_bound_concurrency() {
        let pool = WorkerPool::new(2);
        let scope = CancellationToken::new();
        let release = CancellationToken::new();

        for _ in 0..2 {
            let permit = pool.acquire(&scope).await.unwrap();
            let release = release.clone();
            pool.spawn(permit, "test", async move {
                release.cancelled().await;
                Ok(())
            });
        }
        assert_eq!(pool.available(), 0);

        let third = tokio::time::timeout(Duration::from_millis(50), pool.acquire(&scope)).await;
        assert!(third.is_err(), "third permit must wait");

        release.cancel();
        let permit = tokio::time::timeout(Duration::from_secs(1), pool.acquire(&scope))
            .await
            .unwrap();
        assert!(permit.is_some());
    }

    #[tokio::test]
    async fn test_acquire_cancelled() {
        let pool = WorkerPool::new(1);
        let scope = CancellationToken::new();
        let _held = pool.acquire(&scope).await.unwrap();

        scope.cancel();
        assert!(pool.acquire(&scope).await.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let pool = WorkerPool::new(1);
        let scope = CancellationToken::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let permit = pool.acquire(&scope).await.unwrap();
        let explode = true;
        pool.spawn(permit, "panics", async move {
            if explode {
                panic!("handler blew up");
            }
            Ok(())
        });

        // the permit comes back and the next task runs normally
        let permit = pool.acquire(&scope).await.unwrap();
        let counter = Arc::clone(&ran);
        pool.spawn(permit, "counts", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        pool.close();
        pool.wait().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_wait_tracks_all_tasks() {
        let pool = WorkerPool::new(4);
        let scope = CancellationToken::new();
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..4u64 {
            let permit = pool.acquire(&scope).await.unwrap();
            let done = Arc::clone(&done);
            pool.spawn(permit, "sleeps", async move {
                tokio::time::sleep(Duration::from_millis(10 * i)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Err(HandlerError::Internal("expected".to_string()))
            });
        }

        pool.close();
        pool.wait().await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }
}
