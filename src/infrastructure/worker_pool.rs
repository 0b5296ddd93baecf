//! Bounded-concurrency admission control
//!
//! `submit` waits for one of `max_workers` permits before spawning the task,
//! so a caller outpacing capacity is throttled at the call site. `wait` is the
//! join barrier used to drain in-flight work on shutdown.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{error, warn};

use crate::error::WorkerPoolError;

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    max_workers: usize,
}

impl WorkerPool {
    /// A capacity of zero falls back to the number of available CPUs.
    pub fn new(max_workers: usize) -> Self {
        let max_workers = if max_workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            max_workers
        };

        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            tracker: TaskTracker::new(),
            max_workers,
        }
    }

    /// Waits for a free slot, then runs `task` in the background.
    ///
    /// Panics inside the task are caught and logged; the slot is released
    /// either way.
    pub async fn submit<F>(&self, task: F) -> Result<(), WorkerPoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!("task rejected, worker pool is closed");
                return Err(WorkerPoolError::Closed);
            }
        };

        self.tracker.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                error!(reason = panic_message(&*panic), "error executing task");
            }
            drop(permit);
        });

        Ok(())
    }

    /// Blocks until every task submitted so far has finished.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stops admitting new tasks. Already admitted tasks keep running.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn submit_blocks_when_full() {
        let pool = WorkerPool::new(2);
        let (release_first, first_gate) = oneshot::channel::<()>();
        let (release_second, second_gate) = oneshot::channel::<()>();

        pool.submit(async move {
            let _ = first_gate.await;
        })
        .await
        .unwrap();
        pool.submit(async move {
            let _ = second_gate.await;
        })
        .await
        .unwrap();
        assert_eq!(pool.available(), 0);

        let third_pool = pool.clone();
        let mut third = tokio::spawn(async move { third_pool.submit(async {}).await });

        let blocked = tokio::time::timeout(Duration::from_millis(50), &mut third).await;
        assert!(blocked.is_err(), "third submit should wait for a free slot");

        release_first.send(()).unwrap();
        let admitted = tokio::time::timeout(Duration::from_secs(1), third)
            .await
            .expect("third submit admitted after a slot freed")
            .unwrap();
        assert_eq!(admitted, Ok(()));

        release_second.send(()).unwrap();
        pool.wait().await;
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn wait_covers_panicking_tasks() {
        let pool = WorkerPool::new(4);
        let finished = Arc::new(AtomicUsize::new(0));

        for i in 0..8 {
            let finished = Arc::clone(&finished);
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if i % 3 == 0 {
                    panic!("task {i} blew up");
                }
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }

        pool.wait().await;
        assert_eq!(finished.load(Ordering::SeqCst), 5);
        assert_eq!(pool.available(), 4);

        // still usable after faults
        let finished_again = Arc::clone(&finished);
        pool.submit(async move {
            finished_again.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
        pool.wait().await;
        assert_eq!(finished.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn closed_pool_rejects_new_tasks() {
        let pool = WorkerPool::new(1);
        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.submit(async {}).await, Err(WorkerPoolError::Closed));
        pool.wait().await;
    }

    #[test]
    fn zero_capacity_uses_cpu_count() {
        let pool = WorkerPool::new(0);
        assert!(pool.max_workers() >= 1);
    }
}
