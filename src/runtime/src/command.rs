//! Build commands scheduled on the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use hoist_core::error::Result;
use hoist_core::image::Image;
use hoist_core::options::BuildDriverOptions;
use hoist_core::queue::Command;
use tokio_util::sync::CancellationToken;

use crate::driver::Driver;

/// Builds the command that runs one image through a driver.
pub trait CommandFactory: Send + Sync {
    fn new_command(
        &self,
        driver: Arc<dyn Driver>,
        image: Image,
        options: BuildDriverOptions,
    ) -> Result<Box<dyn Command>>;
}

/// Runs `driver.build` for one image.
pub struct BuildCommand {
    driver: Arc<dyn Driver>,
    image: Image,
    options: BuildDriverOptions,
}

impl BuildCommand {
    pub fn new(driver: Arc<dyn Driver>, image: Image, options: BuildDriverOptions) -> Self {
        Self {
            driver,
            image,
            options,
        }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }
}

#[async_trait]
impl Command for BuildCommand {
    async fn execute(&self, cancel: &CancellationToken) -> Result<()> {
        tracing::debug!(
            image = %self.image.name,
            version = %self.image.version,
            driver = self.options.driver_name().unwrap_or("<none>"),
            "Running build command"
        );
        self.driver.build(cancel, &self.image, &self.options).await
    }

    fn command_type(&self) -> &str {
        "build"
    }
}

/// [`CommandFactory`] producing [`BuildCommand`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCommandFactory;

impl CommandFactory for DefaultCommandFactory {
    fn new_command(
        &self,
        driver: Arc<dyn Driver>,
        image: Image,
        options: BuildDriverOptions,
    ) -> Result<Box<dyn Command>> {
        Ok(Box::new(BuildCommand::new(driver, image, options)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::error::HoistError;
    use parking_lot::Mutex;

    // ========================================================================
    // Mock drivers
    // ========================================================================

    #[derive(Default)]
    struct RecordingDriver {
        built: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Driver for RecordingDriver {
        async fn build(
            &self,
            _cancel: &CancellationToken,
            image: &Image,
            _options: &BuildDriverOptions,
        ) -> Result<()> {
            self.built.lock().push(image.reference().to_string());
            Ok(())
        }
    }

    struct FailingDriver;

    #[async_trait]
    impl Driver for FailingDriver {
        async fn build(
            &self,
            _cancel: &CancellationToken,
            image: &Image,
            _options: &BuildDriverOptions,
        ) -> Result<()> {
            Err(HoistError::Driver {
                driver: "failing".to_string(),
                message: format!("cannot build {}", image.name),
            })
        }
    }

    // ========================================================================
    // BuildCommand
    // ========================================================================

    #[tokio::test]
    async fn test_command_runs_driver() {
        let driver = Arc::new(RecordingDriver::default());
        let command = DefaultCommandFactory
            .new_command(
                driver.clone(),
                Image::new("app", "1.0"),
                BuildDriverOptions::default(),
            )
            .unwrap();

        assert_eq!(command.command_type(), "build");
        command.execute(&CancellationToken::new()).await.unwrap();
        assert_eq!(*driver.built.lock(), vec!["app:1.0".to_string()]);
    }

    #[tokio::test]
    async fn test_command_propagates_driver_error() {
        let command = BuildCommand::new(
            Arc::new(FailingDriver),
            Image::new("app", "1.0"),
            BuildDriverOptions::default(),
        );
        let err = command.execute(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Driver error: failing - cannot build app");
    }
}
