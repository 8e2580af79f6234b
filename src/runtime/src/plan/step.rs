//! One buildable unit of a plan with its ordering signals.

use std::sync::Arc;

use hoist_core::error::{HoistError, Result};
use hoist_core::image::Image;
use tokio::sync::oneshot;

/// Signal a child waits on until its parent step completes.
pub type WaitSignal = oneshot::Receiver<()>;

/// Signal fired by a parent step when it completes.
pub type NotifySignal = oneshot::Sender<()>;

/// Create a linked notify/wait pair.
pub fn signal() -> (NotifySignal, WaitSignal) {
    oneshot::channel()
}

/// A planned image build.
///
/// A step waits on at most one parent signal and fires one signal per
/// subscribed child. Dropping a step without notifying also releases its
/// children.
#[derive(Debug)]
pub struct Step {
    image: Arc<Image>,
    wait: Option<WaitSignal>,
    subscriptions: Option<Vec<NotifySignal>>,
}

impl Step {
    /// Create a step. Root steps have no wait signal.
    pub fn new(image: Arc<Image>, wait: Option<WaitSignal>) -> Self {
        Self {
            image,
            wait,
            subscriptions: Some(Vec::new()),
        }
    }

    /// Image built by this step
    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    /// Whether the step waits on a parent
    pub fn has_parent(&self) -> bool {
        self.wait.is_some()
    }

    /// Number of subscribed children
    pub fn subscribers(&self) -> usize {
        self.subscriptions.as_ref().map_or(0, Vec::len)
    }

    /// Register a child signal to fire on completion.
    pub fn subscribe(&mut self, signal: NotifySignal) -> Result<()> {
        match self.subscriptions.as_mut() {
            Some(subscriptions) => {
                subscriptions.push(signal);
                Ok(())
            }
            None => Err(HoistError::Config(format!(
                "step '{}:{}' has already notified its subscribers",
                self.image.name, self.image.version
            ))),
        }
    }

    /// Wait until the parent step completes. Returns at once for root steps.
    ///
    /// A parent dropped without notifying counts as completed.
    pub async fn wait(&mut self) {
        if let Some(wait) = self.wait.take() {
            let _ = wait.await;
        }
    }

    /// Release every subscribed child. Only the first call has an effect.
    pub fn notify(&mut self) {
        if let Some(subscriptions) = self.subscriptions.take() {
            for subscription in subscriptions {
                // a child that stopped waiting is not an error
                let _ = subscription.send(());
            }
        }
    }
}
