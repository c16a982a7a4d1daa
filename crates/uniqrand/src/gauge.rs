use core::future::Future;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Live count of tasks spawned through it.
///
/// A task stops counting once its future completes or is dropped, so a
/// reading of `0` means every task it spawned has terminated. Hosts poll
/// [`TaskGauge::active`] for diagnostics or await [`TaskGauge::idle`] to know
/// that a run left nothing behind.
#[derive(Clone, Debug)]
pub struct TaskGauge {
    tracker: TaskTracker,
}

impl Default for TaskGauge {
    fn default() -> Self {
        let tracker = TaskTracker::new();
        // A closed tracker still accepts tasks; closing only lets `wait`
        // resolve whenever the tracker is empty.
        tracker.close();
        Self { tracker }
    }
}

impl TaskGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks that have been spawned and not yet finished.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Resolves once no tracked task is running. Resolves immediately if
    /// none is.
    pub async fn idle(&self) {
        self.tracker.wait().await;
    }

    /// Spawns `fut` on the current tokio runtime and tracks it.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn counts_live_tasks() {
        let gauge = TaskGauge::new();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = gauge.spawn(async move {
            let _ = rx.await;
            7
        });
        assert_eq!(gauge.active(), 1);

        tx.send(()).unwrap();
        assert_eq!(handle.await.unwrap(), 7);
        assert_eq!(gauge.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn panicking_task_is_released() {
        let gauge = TaskGauge::new();
        let handle = gauge.spawn(async { None::<u8>.expect("boom") });
        assert!(handle.await.is_err());
        assert_eq!(gauge.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn idle_waits_for_every_task() {
        let gauge = TaskGauge::new();
        tokio::time::timeout(Duration::from_millis(100), gauge.idle())
            .await
            .expect("an empty gauge is idle");

        let (tx, rx) = oneshot::channel::<()>();
        gauge.spawn(async move {
            let _ = rx.await;
        });

        let waiter = {
            let gauge = gauge.clone();
            tokio::spawn(async move { gauge.idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("idle did not resolve after the last task ended")
            .unwrap();
        assert_eq!(gauge.active(), 0);

        // Still usable after going idle.
        gauge.spawn(async {}).await.unwrap();
        gauge.idle().await;
    }
}
