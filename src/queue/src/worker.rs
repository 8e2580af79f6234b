//! Workers and the idle-worker pool
//!
//! A worker announces itself as idle by registering its private job channel
//! in the shared pool, runs whatever job it receives to completion, then
//! registers again.

use async_trait::async_trait;
use hoist_core::error::HoistError;
use hoist_core::queue::Job;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Sender half of a worker's private job channel
pub type JobSender = mpsc::Sender<Arc<Job>>;

/// Shared registry of idle workers
#[derive(Clone)]
pub struct WorkerPool {
    idle_tx: mpsc::UnboundedSender<JobSender>,
    idle_rx: Arc<Mutex<mpsc::UnboundedReceiver<JobSender>>>,
}

impl WorkerPool {
    /// Create an empty pool
    pub fn new() -> Self {
        let (idle_tx, idle_rx) = mpsc::unbounded_channel();
        Self {
            idle_tx,
            idle_rx: Arc::new(Mutex::new(idle_rx)),
        }
    }

    /// Announce an idle worker
    pub fn register(&self, sender: JobSender) -> bool {
        self.idle_tx.send(sender).is_ok()
    }

    /// Wait for the next idle worker
    pub async fn next_idle(&self) -> Option<JobSender> {
        self.idle_rx.lock().await.recv().await
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters shared by the workers of a dispatcher
#[derive(Debug, Default)]
pub struct WorkerCounters {
    pub alive: AtomicUsize,
    pub running: AtomicUsize,
    pub completed: AtomicUsize,
}

/// Everything a worker needs from its dispatcher
#[derive(Clone)]
pub struct WorkerContext {
    pub id: usize,
    pub pool: WorkerPool,
    pub quit: CancellationToken,
    pub counters: Arc<WorkerCounters>,
}

/// Executes jobs pulled from the pool
#[async_trait]
pub trait Worker: Send {
    /// Worker ID
    fn id(&self) -> usize;

    /// Run until quit or cancelled
    async fn run(self: Box<Self>, cancel: CancellationToken);
}

/// Creates the workers of a dispatcher
pub trait WorkerFactory: Send + Sync {
    fn create(&self, context: WorkerContext) -> Box<dyn Worker>;
}

/// Default worker: one job at a time, pull based
pub struct PoolWorker {
    context: WorkerContext,
    job_tx: JobSender,
    job_rx: mpsc::Receiver<Arc<Job>>,
}

impl PoolWorker {
    /// Create a new worker
    pub fn new(context: WorkerContext) -> Self {
        let (job_tx, job_rx) = mpsc::channel(1);
        Self {
            context,
            job_tx,
            job_rx,
        }
    }
}

#[async_trait]
impl Worker for PoolWorker {
    fn id(&self) -> usize {
        self.context.id
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) {
        let mut this = self;
        let id = this.context.id;
        let counters = Arc::clone(&this.context.counters);
        counters.alive.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(worker = id, "Worker started");

        loop {
            if !this.context.pool.register(this.job_tx.clone()) {
                tracing::debug!(worker = id, "Worker pool closed");
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(worker = id, "Worker cancelled");
                    break;
                }
                _ = this.context.quit.cancelled() => {
                    tracing::debug!(worker = id, "Worker quit");
                    break;
                }
                job = this.job_rx.recv() => {
                    let Some(job) = job else { break };
                    counters.running.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(worker = id, job = %job.id(), "Worker picked up job");
                    job.run(&cancel).await;
                    counters.running.fetch_sub(1, Ordering::SeqCst);
                    counters.completed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        // a job handed over while stopping is failed, never dropped
        this.job_rx.close();
        while let Ok(job) = this.job_rx.try_recv() {
            tracing::debug!(worker = id, job = %job.id(), "Rejecting job of stopped worker");
            job.reject(HoistError::Dispatch("worker stopped".to_string()));
        }

        counters.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Factory producing [`PoolWorker`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct PoolWorkerFactory;

impl WorkerFactory for PoolWorkerFactory {
    fn create(&self, context: WorkerContext) -> Box<dyn Worker> {
        Box::new(PoolWorker::new(context))
    }
}
