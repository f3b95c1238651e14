//! Serial interaction context.
//!
//! The platform geofencing API expects its calls to originate from one
//! consistent thread, the same one the host UI uses. `InteractionContext`
//! models that thread as a single Tokio task draining a job queue in order.
//!
//! ```text
//! caller ──post(job)──► [ job queue (mpsc) ] ──► interaction task runs jobs one by one
//! caller ◄──oneshot──── result of call(f)
//! ```
//!
//! Jobs are synchronous closures. Work that completes later (a provider
//! future) is returned from the job and awaited by the caller, so the context
//! is never held across an await.

use std::future::Future;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A unit of work for the interaction context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The interaction context has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interaction context is closed")]
pub struct ContextClosed;

/// Handle to the serial interaction task.
pub struct InteractionContext {
    job_tx: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
    handle: Handle,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl InteractionContext {
    /// Spawn the interaction task on `handle`.
    pub fn start(handle: &Handle) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let task = handle.spawn(run_jobs(job_rx, shutdown.clone()));

        Self {
            job_tx,
            shutdown,
            handle: handle.clone(),
            task: parking_lot::Mutex::new(Some(task)),
        }
    }

    /// Queue `job` behind everything already posted.
    ///
    /// Once the queue has closed the job is handed back so the caller can
    /// decide whether to run it elsewhere. A job accepted here always runs.
    pub fn post(&self, job: Job) -> Result<(), Job> {
        self.job_tx.send(job).map_err(|rejected| rejected.0)
    }

    /// Run `f` on the interaction context and return its result.
    pub async fn call<T, F>(&self, f: F) -> Result<T, ContextClosed>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(Box::new(move || {
            let _ = tx.send(f());
        }))
        .map_err(|_| ContextClosed)?;
        rx.await.map_err(|_| ContextClosed)
    }

    /// Wait until every job posted before this call has run.
    pub async fn flush(&self) -> Result<(), ContextClosed> {
        self.call(|| ()).await
    }

    /// Spawn background work on the runtime that owns this context.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future)
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.job_tx.is_closed()
    }

    /// Ask the interaction task to stop without waiting for it. Queued jobs
    /// still run.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Stop the interaction task.
    ///
    /// Jobs already queued still run before the task exits. Jobs posted after
    /// the queue closes are handed back by [`post`](Self::post).
    pub async fn shutdown(&self) {
        self.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("Interaction context stopped");
    }
}

impl Drop for InteractionContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_jobs(mut job_rx: mpsc::UnboundedReceiver<Job>, shutdown: CancellationToken) {
    debug!("Interaction context started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = job_rx.recv() => match job {
                Some(job) => job(),
                None => return,
            },
        }
    }

    // Jobs accepted before the close still run; later posts are handed back.
    job_rx.close();
    let mut drained = 0usize;
    while let Ok(job) = job_rx.try_recv() {
        job();
        drained += 1;
    }
    if drained > 0 {
        debug!(drained, "Ran queued jobs after shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_call_returns_result() {
        let ctx = InteractionContext::start(&Handle::current());
        let value = ctx.call(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_jobs_run_in_post_order() {
        let ctx = InteractionContext::start(&Handle::current());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = Arc::clone(&order);
            assert!(ctx.post(Box::new(move || order.lock().push(i))).is_ok());
        }
        ctx.flush().await.unwrap();

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_never_overlap() {
        let ctx = Arc::new(InteractionContext::start(&Handle::current()));
        let running = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..50 {
            let running = Arc::clone(&running);
            let order = Arc::clone(&order);
            let posted = ctx.post(Box::new(move || {
                assert!(!running.swap(true, std::sync::atomic::Ordering::SeqCst));
                order.lock().push(i);
                std::thread::yield_now();
                running.store(false, std::sync::atomic::Ordering::SeqCst);
            }));
            assert!(posted.is_ok());
        }
        ctx.flush().await.unwrap();

        assert_eq!(*order.lock(), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_shutdown_runs_queued_jobs() {
        let ctx = InteractionContext::start(&Handle::current());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            assert!(ctx.post(Box::new(move || order.lock().push(i))).is_ok());
        }
        ctx.shutdown().await;

        assert_eq!(*order.lock(), (0..5).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_cancel_still_runs_queued_jobs() {
        let ctx = InteractionContext::start(&Handle::current());
        let (tx, rx) = oneshot::channel();

        assert!(ctx.post(Box::new(move || {
            let _ = tx.send(7);
        }))
        .is_ok());
        drop(ctx);

        assert_eq!(rx.await, Ok(7));
    }

    #[tokio::test]
    async fn test_post_after_shutdown_returns_job() {
        let ctx = InteractionContext::start(&Handle::current());
        ctx.shutdown().await;

        assert!(ctx.is_closed());
        assert!(ctx.post(Box::new(|| {})).is_err());
        assert_eq!(ctx.call(|| 1).await, Err(ContextClosed));
    }
}
