//! Per-listener execution.
//!
//! Every listener owns an [`Executor`] so that handler logic never runs on
//! the bus's delivery tasks. Two shapes exist:
//!
//! - [`Executor::inline`] runs the work on the submitting task. Useful for
//!   tests and for listeners whose handlers are trivially cheap.
//! - [`Executor::pool`] runs the work on a fixed set of worker tasks fed by
//!   a bounded queue. When the queue and all workers are saturated,
//!   submission *waits* for capacity — deliberate backpressure against the
//!   delivery path, not unbounded buffering.
//!
//! A single-worker pool processes its own work in FIFO order; nothing is
//! guaranteed across executors, and callers needing per-entity ordering must
//! serialize on their own.

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

type Job = BoxFuture<'static, ()>;

enum Inner {
    Inline,
    Pool {
        queue: mpsc::Sender<Job>,
        cancel: CancellationToken,
    },
}

/// Where a listener's handler work runs.
#[derive(Clone)]
pub struct Executor {
    inner: std::sync::Arc<Inner>,
}

impl Executor {
    /// Runs submitted work directly on the submitting task.
    pub fn inline() -> Self {
        Self {
            inner: std::sync::Arc::new(Inner::Inline),
        }
    }

    /// Runs submitted work on `workers` tasks fed by a queue of `backlog`
    /// entries. Submission waits when both are full.
    pub fn pool(workers: usize, backlog: usize) -> Self {
        let workers = workers.max(1);
        let backlog = backlog.max(1);
        let (queue, receiver) = mpsc::channel::<Job>(backlog);
        let receiver = std::sync::Arc::new(tokio::sync::Mutex::new(receiver));
        let cancel = CancellationToken::new();

        for worker in 0..workers {
            let receiver = std::sync::Arc::clone(&receiver);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let job = tokio::select! {
                        job = async { receiver.lock().await.recv().await } => job,
                        _ = cancel.cancelled() => {
                            // Intake is closed; drain whatever is queued.
                            let mut rx = receiver.lock().await;
                            while let Ok(job) = rx.try_recv() {
                                drop(rx);
                                job.await;
                                rx = receiver.lock().await;
                            }
                            None
                        }
                    };
                    match job {
                        Some(job) => job.await,
                        None => break,
                    }
                }
                trace!(worker, "executor worker stopped");
            });
        }

        Self {
            inner: std::sync::Arc::new(Inner::Pool { queue, cancel }),
        }
    }

    /// Submits work. On a pool this waits for queue capacity; inline it runs
    /// the future to completion before returning. Work submitted after
    /// [`shutdown`](Self::shutdown) is dropped.
    pub async fn submit(&self, job: impl std::future::Future<Output = ()> + Send + 'static) {
        match &*self.inner {
            Inner::Inline => job.await,
            Inner::Pool { queue, cancel } => {
                if cancel.is_cancelled() {
                    debug!("executor is shut down, dropping submitted work");
                    return;
                }
                if queue.send(Box::pin(job)).await.is_err() {
                    debug!("executor queue closed, dropping submitted work");
                }
            }
        }
    }

    /// Stops intake. Already-queued work is drained by the workers.
    /// Idempotent; a no-op for inline executors.
    pub fn shutdown(&self) {
        if let Inner::Pool { cancel, .. } = &*self.inner {
            cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &*self.inner {
            Inner::Inline => "inline",
            Inner::Pool { .. } => "pool",
        };
        f.debug_struct("Executor").field("kind", &kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn inline_runs_on_the_submitting_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = Executor::inline();
        let c = Arc::clone(&counter);
        executor
            .submit(async move {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        // Inline submission completes the work before returning.
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pool_runs_all_submitted_work() {
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = Executor::pool(2, 8);
        for _ in 0..10 {
            let c = Arc::clone(&counter);
            executor
                .submit(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        tokio::time::timeout(Duration::from_secs(1), async {
            while counter.load(Ordering::SeqCst) < 10 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("all submitted work should run");
    }

    #[tokio::test]
    async fn saturated_pool_applies_backpressure() {
        let executor = Executor::pool(1, 1);
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();

        // Occupy the single worker until the gate opens.
        executor
            .submit(async move {
                let _ = gate_rx.await;
            })
            .await;
        // Fill the backlog slot.
        executor.submit(async {}).await;

        // The next submission cannot complete until the worker frees up.
        let blocked = executor.submit(async {});
        tokio::pin!(blocked);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut blocked)
                .await
                .is_err(),
            "submission should wait while the pool is saturated"
        );

        gate_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("submission should complete once capacity frees");
    }

    #[tokio::test]
    async fn shutdown_drops_new_work() {
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = Executor::pool(1, 4);
        executor.shutdown();
        let c = Arc::clone(&counter);
        executor
            .submit(async move {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
