//! Build drivers.
//!
//! A driver turns an enriched [`Image`] plus its [`BuildDriverOptions`] into
//! an actual image. Drivers are registered by name on a [`DriverFactory`];
//! builders select one through their `driver` attribute.

mod dry_run;

pub use dry_run::DryRunDriver;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hoist_core::error::{HoistError, Result};
use hoist_core::image::Image;
use hoist_core::options::BuildDriverOptions;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Name of the driver used when a build runs in dry-run mode
pub const DRY_RUN_DRIVER_NAME: &str = "dry-run";

/// Builds one image.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn build(
        &self,
        cancel: &CancellationToken,
        image: &Image,
        options: &BuildDriverOptions,
    ) -> Result<()>;
}

/// Registry of drivers keyed by name.
#[derive(Default)]
pub struct DriverFactory {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    default: Option<Arc<dyn Driver>>,
}

impl DriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver returned for names nothing was registered under
    pub fn with_default(mut self, driver: Arc<dyn Driver>) -> Self {
        self.default = Some(driver);
        self
    }

    /// Register a driver under `name`.
    pub fn register(&self, name: impl Into<String>, driver: Arc<dyn Driver>) -> Result<()> {
        let name = name.into();
        let mut drivers = self.drivers.write();
        if drivers.contains_key(&name) {
            return Err(HoistError::Duplicate {
                name,
                version: "driver".to_string(),
            });
        }
        tracing::debug!(driver = %name, "Registered build driver");
        drivers.insert(name, driver);
        Ok(())
    }

    /// Resolve a driver by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Driver>> {
        if let Some(driver) = self.drivers.read().get(name) {
            return Ok(driver.clone());
        }

        match &self.default {
            Some(driver) => {
                tracing::debug!(driver = %name, "Unknown driver, using default");
                Ok(driver.clone())
            }
            None => Err(HoistError::NotFound {
                name: format!("driver '{}'", name),
                versions: vec![],
            }),
        }
    }

    /// Registered driver names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.read().keys().cloned().collect();
        names.sort();
        names
    }
}
