//! Presentation queue: the single logical thread all surface work runs on.
//!
//! The host hands the queue handle to the view at construction and drives
//! the companion driver on whatever thread owns the rendering surface. Tasks
//! execute one at a time in submission order, which is the whole
//! synchronisation story: no further locking is needed around surface state.

use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::warn;

type Task = BoxFuture<'static, ()>;

/// Cloneable submission handle for the presentation queue.
#[derive(Clone)]
pub struct PresentationQueue {
    tx: mpsc::UnboundedSender<Task>,
}

/// Consumes submitted tasks. Run it on the surface's presentation thread.
pub struct PresentationDriver {
    rx: mpsc::UnboundedReceiver<Task>,
}

/// Create a connected queue/driver pair.
pub fn presentation_queue() -> (PresentationQueue, PresentationDriver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PresentationQueue { tx }, PresentationDriver { rx })
}

impl PresentationQueue {
    /// Submit a task. Submission never blocks and may happen from any
    /// thread; execution order follows submission order. Tasks submitted
    /// after the driver has shut down are dropped.
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(task.boxed()).is_err() {
            warn!("presentation queue closed; task dropped");
        }
    }
}

impl PresentationDriver {
    /// Run until every queue handle has been dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            task.await;
        }
    }

    /// Run queued tasks until the queue is momentarily empty. Deterministic
    /// building block for tests and manual pumps.
    pub async fn run_until_idle(&mut self) {
        while let Ok(task) = self.rx.try_recv() {
            task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn tasks_run_in_submission_order() {
        let (queue, mut driver) = presentation_queue();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..4 {
            let seen = Arc::clone(&seen);
            queue.submit(async move {
                seen.lock().unwrap().push(id);
            });
        }
        driver.run_until_idle().await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn submission_after_shutdown_is_dropped() {
        let (queue, driver) = presentation_queue();
        drop(driver);

        // Must not panic; the task is silently discarded.
        queue.submit(async {});
    }

    #[tokio::test]
    async fn run_until_idle_drains_nested_submissions() {
        let (queue, mut driver) = presentation_queue();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let inner_seen = Arc::clone(&seen);
        queue.submit(async move {
            inner_seen.lock().unwrap().push("outer");
            let nested_seen = Arc::clone(&inner_seen);
            inner_queue.submit(async move {
                nested_seen.lock().unwrap().push("inner");
            });
        });
        driver.run_until_idle().await;

        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
    }
}
