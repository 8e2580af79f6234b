//! Bounded-concurrency job dispatcher

use super::worker::{WorkerContext, WorkerCounters, WorkerFactory, WorkerPool};
use super::DispatcherStats;
use hoist_core::error::{HoistError, Result};
use async_trait::async_trait;
use hoist_core::queue::{Job, JobDispatcher};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Dispatcher
///
/// Accepts jobs and hands each one to the next idle worker. At most
/// `workers` jobs run at the same time.
pub struct Dispatcher {
    workers: usize,
    factory: Arc<dyn WorkerFactory>,
    pool: WorkerPool,
    intake_tx: mpsc::Sender<Arc<Job>>,
    intake_rx: Mutex<Option<mpsc::Receiver<Arc<Job>>>>,
    started: AtomicBool,
    quit: CancellationToken,
    counters: Arc<WorkerCounters>,
    queued: Arc<AtomicUsize>,
}

impl Dispatcher {
    /// Create a new dispatcher. `workers` is raised to at least 1.
    pub fn new(factory: Arc<dyn WorkerFactory>, workers: usize) -> Self {
        let workers = workers.max(1);
        let (intake_tx, intake_rx) = mpsc::channel(workers);
        Self {
            workers,
            factory,
            pool: WorkerPool::new(),
            intake_tx,
            intake_rx: Mutex::new(Some(intake_rx)),
            started: AtomicBool::new(false),
            quit: CancellationToken::new(),
            counters: Arc::new(WorkerCounters::default()),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Spawn the workers and the dispatch loop.
    ///
    /// Calling it again once started is a no-op.
    pub fn start(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HoistError::Config(
                "dispatcher cannot start with a cancelled context".to_string(),
            ));
        }

        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Dispatcher already started");
            return Ok(());
        }

        let intake_rx = self.intake_rx.lock().take().ok_or_else(|| {
            HoistError::Config("dispatcher intake queue is not available".to_string())
        })?;

        tracing::info!(workers = self.workers, "Starting dispatcher");

        for id in 0..self.workers {
            let worker = self.factory.create(WorkerContext {
                id,
                pool: self.pool.clone(),
                quit: self.quit.clone(),
                counters: Arc::clone(&self.counters),
            });
            tokio::spawn(worker.run(cancel.clone()));
        }

        tokio::spawn(dispatch_loop(
            intake_rx,
            self.pool.clone(),
            cancel.clone(),
            self.quit.clone(),
            Arc::clone(&self.queued),
        ));

        Ok(())
    }

    /// Submit a job. Waits while the intake queue is full.
    pub async fn enqueue(&self, job: Arc<Job>) -> Result<()> {
        tracing::debug!(job = %job.id(), command = %job.command_type(), "Enqueue job");
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.intake_tx.send(job).await.is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(HoistError::Dispatch(
                "dispatcher is not accepting jobs".to_string(),
            ));
        }
        Ok(())
    }

    /// Ask every worker to stop once its current job is done.
    pub fn stop(&self) {
        tracing::info!("Stopping dispatcher");
        self.quit.cancel();
    }

    /// Whether `start` has been called successfully
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStats {
        let alive = self.counters.alive.load(Ordering::SeqCst);
        let running = self.counters.running.load(Ordering::SeqCst);
        DispatcherStats {
            workers: self.workers,
            idle: alive.saturating_sub(running),
            queued: self.queued.load(Ordering::SeqCst),
            running,
            completed: self.counters.completed.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl JobDispatcher for Dispatcher {
    async fn enqueue(&self, job: Arc<Job>) -> Result<()> {
        Dispatcher::enqueue(self, job).await
    }
}

async fn dispatch_loop(
    mut intake_rx: mpsc::Receiver<Arc<Job>>,
    pool: WorkerPool,
    cancel: CancellationToken,
    quit: CancellationToken,
    queued: Arc<AtomicUsize>,
) {
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = quit.cancelled() => break,
            job = intake_rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let pool = pool.clone();
        let cancel = cancel.clone();
        let quit = quit.clone();
        let queued = Arc::clone(&queued);
        tokio::spawn(async move {
            forward(job, &pool, &cancel, &quit).await;
            queued.fetch_sub(1, Ordering::SeqCst);
        });
    }

    // Fail whatever is still waiting in the intake queue
    intake_rx.close();
    while let Some(job) = intake_rx.recv().await {
        queued.fetch_sub(1, Ordering::SeqCst);
        job.reject(HoistError::Dispatch("dispatcher stopped".to_string()));
    }
    tracing::debug!("Dispatch loop stopped");
}

/// Hand `job` to the next idle worker.
async fn forward(job: Arc<Job>, pool: &WorkerPool, cancel: &CancellationToken, quit: &CancellationToken) {
    loop {
        let idle = tokio::select! {
            _ = cancel.cancelled() => None,
            _ = quit.cancelled() => None,
            idle = pool.next_idle() => idle,
        };

        let Some(idle) = idle else {
            job.reject(HoistError::Dispatch("dispatcher stopped".to_string()));
            return;
        };

        match idle.send(Arc::clone(&job)).await {
            Ok(()) => return,
            // The worker stopped after registering; try the next one
            Err(_) => continue,
        }
    }
}
