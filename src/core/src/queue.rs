use crate::error::{HoistError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Job identifier
pub type JobId = String;

/// Command to be executed
#[async_trait]
pub trait Command: Send + Sync {
    /// Execute the command. Cancellation is cooperative.
    async fn execute(&self, cancel: &CancellationToken) -> Result<()>;

    /// Get command type (for logging/debugging)
    fn command_type(&self) -> &str;
}

/// Accepts jobs for execution.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Hand `job` over; the outcome is read with [`Job::wait`].
    async fn enqueue(&self, job: Arc<Job>) -> Result<()>;
}

/// Unit of work handed to the dispatcher.
///
/// Wraps one command; the outcome of its single run is delivered to the
/// single caller of [`Job::wait`].
pub struct Job {
    id: JobId,
    command_type: String,
    command: Mutex<Option<Box<dyn Command>>>,
    result_tx: Mutex<Option<oneshot::Sender<Result<()>>>>,
    result_rx: Mutex<Option<oneshot::Receiver<Result<()>>>>,
}

impl Job {
    /// Create a new job
    pub fn new(command: Box<dyn Command>) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            id: Uuid::new_v4().to_string(),
            command_type: command.command_type().to_string(),
            command: Mutex::new(Some(command)),
            result_tx: Mutex::new(Some(tx)),
            result_rx: Mutex::new(Some(rx)),
        }
    }

    /// Get job ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Type of the wrapped command
    pub fn command_type(&self) -> &str {
        &self.command_type
    }

    /// Execute the wrapped command and publish its outcome.
    ///
    /// Only the first call runs the command.
    pub async fn run(&self, cancel: &CancellationToken) {
        let command = self.command.lock().take();
        let Some(command) = command else {
            tracing::warn!(job = %self.id, "Job has already run or was closed");
            return;
        };

        tracing::debug!(job = %self.id, command = %self.command_type, "Running job");
        let result = command.execute(cancel).await;
        if let Err(ref e) = result {
            tracing::debug!(job = %self.id, error = %e, "Job failed");
        }
        self.complete(result);
    }

    /// Fail a job that could not be handed to a worker.
    pub fn reject(&self, err: HoistError) {
        self.command.lock().take();
        self.complete(Err(err));
    }

    /// Wait for the outcome of the run.
    pub async fn wait(&self) -> Result<()> {
        let rx = self
            .result_rx
            .lock()
            .take()
            .ok_or_else(|| HoistError::Job(format!("job {} is already awaited", self.id)))?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(HoistError::Job(format!(
                "job {} was closed before completing",
                self.id
            ))),
        }
    }

    /// Release the command and the result channel.
    ///
    /// Must not be called while the job is running.
    pub fn close(&self) {
        self.command.lock().take();
        self.result_tx.lock().take();
    }

    fn complete(&self, result: Result<()>) {
        if let Some(tx) = self.result_tx.lock().take() {
            let _ = tx.send(result);
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("command_type", &self.command_type)
            .finish()
    }
}
