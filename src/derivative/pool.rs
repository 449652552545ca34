use super::error::PoolError;
use std::{future::Future, pin::Pin, sync::Arc};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fixed number of workers draining a bounded job queue.
///
/// Submitting never waits: when the backlog is full the job is rejected so a
/// burst of slow work cannot grow memory without limit.
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
}

impl WorkerPool {
    /// Spawns the workers on the current tokio runtime.
    pub fn new(workers: usize, backlog: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(backlog.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        for id in 0..workers {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                loop {
                    // Hold the lock only while waiting for the next job.
                    let job = receiver.lock().await.recv().await;
                    match job {
                        Some(job) => {
                            debug!(worker = id, "Worker picked up job");
                            // A panicking job must not take the worker down with it.
                            if let Err(e) = tokio::spawn(job).await {
                                error!(worker = id, "Worker job failed: {}", e);
                            }
                        }
                        None => break,
                    }
                }
                debug!(worker = id, "Worker stopped");
            });
        }

        info!(
            "Started derivative worker pool with {} workers and a backlog of {}",
            workers, backlog
        );

        Self { sender }
    }

    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.sender.try_send(Box::pin(job)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PoolError::Full,
            mpsc::error::TrySendError::Closed(_) => PoolError::Closed,
        })
    }

    /// Jobs waiting for a free worker.
    #[cfg(test)]
    fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{Notify, oneshot};

    #[tokio::test]
    async fn test_runs_submitted_jobs() {
        let pool = WorkerPool::new(2, 10);
        let (tx, rx) = oneshot::channel();

        pool.submit(async move {
            let _ = tx.send(42);
        })
        .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_full_backlog_rejects_instead_of_waiting() {
        let pool = WorkerPool::new(1, 1);
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());

        // Occupy the only worker.
        let (g, s) = (gate.clone(), started.clone());
        pool.submit(async move {
            s.notify_one();
            g.notified().await;
        })
        .unwrap();
        started.notified().await;

        // Fill the single backlog slot, then overflow it.
        pool.submit(async {}).unwrap();
        assert_eq!(pool.queued(), 1);
        assert_eq!(pool.submit(async {}), Err(PoolError::Full));

        gate.notify_one();
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_by_worker_count() {
        let pool = WorkerPool::new(3, 50);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = mpsc::channel(20);

        for _ in 0..20 {
            let running = running.clone();
            let peak = peak.clone();
            let done_tx = done_tx.clone();
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send(()).await;
            })
            .unwrap();
        }

        for _ in 0..20 {
            done_rx.recv().await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
