//! Bounded-concurrency job dispatching and monitoring
//!
//! Jobs submitted to the [`Dispatcher`] are handed to a fixed pool of
//! workers; the [`DispatcherMonitor`] samples its statistics.

use hoist_core::config::DispatcherConfig;
use hoist_core::error::{HoistError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod dispatcher;
pub mod monitor;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use monitor::{DispatcherMonitor, MonitorConfig};
pub use worker::{PoolWorker, PoolWorkerFactory, Worker, WorkerContext, WorkerFactory, WorkerPool};

/// Dispatcher statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    pub workers: usize,
    pub idle: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
}

/// Builder for a [`Dispatcher`]
pub struct DispatcherBuilder {
    workers: usize,
    factory: Option<Arc<dyn WorkerFactory>>,
}

impl DispatcherBuilder {
    /// Create a new dispatcher builder
    pub fn new() -> Self {
        Self {
            workers: DispatcherConfig::default().workers,
            factory: None,
        }
    }

    /// Apply a dispatcher configuration
    pub fn with_config(mut self, config: &DispatcherConfig) -> Self {
        self.workers = config.workers;
        self
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the worker factory
    pub fn with_worker_factory(mut self, factory: Arc<dyn WorkerFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Use the default pull-based workers
    pub fn with_default_workers(self) -> Self {
        self.with_worker_factory(Arc::new(PoolWorkerFactory))
    }

    /// Build the dispatcher
    pub fn build(self) -> Result<Dispatcher> {
        let factory = self
            .factory
            .ok_or_else(|| HoistError::Config("a worker factory is required".to_string()))?;
        if self.workers == 0 {
            return Err(HoistError::Config(
                "dispatcher needs at least one worker".to_string(),
            ));
        }
        Ok(Dispatcher::new(factory, self.workers))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
