//! Single-worker FIFO queue that serializes every mutation.
//!
//! Units run one at a time on a dedicated thread, in submission order. The
//! channel is bounded: a full queue makes submitters wait until space frees up
//! or the queue shuts down.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::domain::{AppError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the worker. Cheap to share behind an `Arc`.
pub struct TaskQueue {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    stop: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Spawns the worker thread with room for `capacity` pending units.
    ///
    /// # Errors
    /// Returns error if the worker thread cannot be spawned.
    pub fn start(capacity: usize) -> Result<Self> {
        let (sender, mut receiver) = mpsc::channel::<Job>(capacity.max(1));
        let (stop, _) = watch::channel(false);

        let worker = thread::Builder::new()
            .name("samba-manager-queue".into())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!("Queued task panicked");
                    }
                }
                debug!("Task queue drained");
            })
            .map_err(|e| AppError::io("Failed to start task queue worker", e))?;

        debug!(capacity, "Task queue started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            stop,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.stop.borrow()
    }

    /// Enqueues `job` without waiting for it to run.
    ///
    /// # Errors
    /// Returns `AppError::QueueClosed` once shutdown has begun.
    pub async fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(job)).await
    }

    /// Enqueues `job` and waits for its result.
    ///
    /// # Errors
    /// Returns `AppError::QueueClosed` if the job was not accepted,
    /// `AppError::TaskAborted` if it panicked, or the job's own error.
    pub async fn submit_and_wait<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (reply, outcome) = oneshot::channel();
        self.enqueue(Box::new(move || {
            // the waiter may have gone away
            let _ = reply.send(job());
        }))
        .await?;

        outcome.await.map_err(|_| AppError::TaskAborted)?
    }

    async fn enqueue(&self, job: Job) -> Result<()> {
        let sender = self.sender.lock().clone().ok_or(AppError::QueueClosed)?;
        let stopped = self.stop.subscribe();

        tokio::select! {
            biased;
            () = wait_for_stop(stopped) => Err(AppError::QueueClosed),
            sent = sender.send(job) => sent.map_err(|_| AppError::QueueClosed),
        }
    }

    /// Stops accepting work, lets the worker finish what is queued, and joins it.
    ///
    /// Submitters blocked on a full queue get `AppError::QueueClosed`.
    pub async fn shutdown(&self) {
        self.stop.send_replace(true);
        drop(self.sender.lock().take());

        let worker = self.worker.lock().take();
        let Some(handle) = worker else {
            return;
        };
        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => info!("Task queue stopped"),
            Ok(Err(_)) => warn!("Task queue worker exited abnormally"),
            Err(e) => warn!(error = %e, "Failed to join task queue worker"),
        }
    }
}

async fn wait_for_stop(mut stopped: watch::Receiver<bool>) {
    loop {
        if *stopped.borrow_and_update() {
            return;
        }
        if stopped.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc as std_mpsc, Arc};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_units_run_in_submission_order() {
        let queue = TaskQueue::start(4).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..32 {
            let seen = Arc::clone(&seen);
            queue.submit(move || seen.lock().push(i)).await.unwrap();
        }
        queue.submit_and_wait(|| Ok(())).await.unwrap();

        assert_eq!(*seen.lock(), (0..32).collect::<Vec<_>>());
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_and_wait_returns_job_result() {
        let queue = TaskQueue::start(1).unwrap();

        let value = queue.submit_and_wait(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);

        let err = queue
            .submit_and_wait(|| -> Result<()> { Err(AppError::not_found("share 'x'")) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_unit_does_not_kill_worker() {
        let queue = TaskQueue::start(2).unwrap();

        let err = queue
            .submit_and_wait(|| -> Result<()> { panic!("boom") })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TaskAborted));

        assert_eq!(queue.submit_and_wait(|| Ok("alive")).await.unwrap(), "alive");
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_units_then_rejects() {
        let queue = TaskQueue::start(16).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let done = Arc::clone(&done);
            queue
                .submit(move || {
                    thread::sleep(Duration::from_millis(2));
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }
        queue.shutdown().await;

        assert_eq!(done.load(Ordering::SeqCst), 8);
        assert!(queue.is_closed());
        assert!(matches!(
            queue.submit(|| {}).await,
            Err(AppError::QueueClosed)
        ));
        assert!(matches!(
            queue.submit_and_wait(|| Ok(())).await,
            Err(AppError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_blocked_submitter_is_released_by_shutdown() {
        let queue = Arc::new(TaskQueue::start(1).unwrap());
        let (gate_tx, gate_rx) = std_mpsc::channel::<()>();

        // occupies the worker, then a second unit fills the only slot
        queue
            .submit(move || {
                let _ = gate_rx.recv();
            })
            .await
            .unwrap();
        queue.submit(|| {}).await.unwrap();

        let blocked = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.submit(|| {}).await })
        };
        tokio::task::yield_now().await;

        let stopping = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.shutdown().await })
        };
        while !queue.is_closed() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(blocked.await.unwrap(), Err(AppError::QueueClosed)));
        gate_tx.send(()).unwrap();
        stopping.await.unwrap();
    }
}
