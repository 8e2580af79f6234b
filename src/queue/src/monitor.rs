//! Dispatcher monitor for tracking dispatcher metrics and health

use super::{Dispatcher, DispatcherStats};
use hoist_core::event::{events, BuildEvent, EventEmitter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Dispatcher monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Monitoring interval
    pub interval: Duration,
    /// Warning threshold for queued jobs
    pub queued_warning_threshold: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            queued_warning_threshold: 100,
        }
    }
}

/// Dispatcher health as seen by one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Idle,
    Busy,
    Saturated,
}

/// Dispatcher monitor
pub struct DispatcherMonitor {
    dispatcher: Arc<Dispatcher>,
    config: MonitorConfig,
    event_emitter: Option<EventEmitter>,
}

impl DispatcherMonitor {
    /// Create a new dispatcher monitor
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_config(dispatcher, MonitorConfig::default())
    }

    /// Create a new dispatcher monitor with custom configuration
    pub fn with_config(dispatcher: Arc<Dispatcher>, config: MonitorConfig) -> Self {
        Self {
            dispatcher,
            config,
            event_emitter: None,
        }
    }

    /// Publish pressure changes as events
    pub fn with_event_emitter(mut self, emitter: EventEmitter) -> Self {
        self.event_emitter = Some(emitter);
        self
    }

    /// Start monitoring until `cancel` fires
    pub fn start(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.config.interval);

        tokio::spawn(async move {
            let mut last = Health::Idle;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let health = self.check_health();
                if health != last {
                    self.publish(health);
                    last = health;
                }
            }
        });
    }

    /// Check dispatcher health
    pub fn check_health(&self) -> Health {
        let stats = self.dispatcher.stats();

        debug!(
            "Dispatcher: workers={}, idle={}, queued={}, running={}, completed={}",
            stats.workers, stats.idle, stats.queued, stats.running, stats.completed
        );

        let mut health = if stats.running == 0 && stats.queued == 0 {
            Health::Idle
        } else {
            Health::Busy
        };

        if stats.running >= stats.workers && stats.queued > 0 {
            warn!("All {} workers are busy", stats.workers);
            health = Health::Saturated;
        }

        if stats.queued > self.config.queued_warning_threshold {
            warn!(
                "High number of queued jobs: {} (threshold: {})",
                stats.queued, self.config.queued_warning_threshold
            );
            health = Health::Saturated;
        }

        health
    }

    /// Get current statistics
    pub fn stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    fn publish(&self, health: Health) {
        let Some(emitter) = &self.event_emitter else {
            return;
        };
        let key = match health {
            Health::Saturated => events::DISPATCHER_PRESSURE,
            Health::Idle => events::DISPATCHER_IDLE,
            Health::Busy => return,
        };
        let stats = self.dispatcher.stats();
        let mut map = HashMap::new();
        map.insert("queued".to_string(), serde_json::json!(stats.queued));
        map.insert("running".to_string(), serde_json::json!(stats.running));
        emitter.emit(BuildEvent::with_map(key, map));
    }
}
