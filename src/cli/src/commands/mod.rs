//! CLI command definitions and dispatch.

mod build;
mod builders;
mod images;
mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hoist_core::config::HoistConfig;
use hoist_runtime::{
    BuildersStore, CredentialsStore, FileCredentialsStore, ImageStore, MemoryCredentialsStore,
    TemplateRenderer,
};

/// Hoist, a builder for trees of container images.
#[derive(Parser)]
#[command(name = "hoist", version, about)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "hoist.yml")]
    pub config: PathBuf,

    /// Log at debug level
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Build an image and, with --cascade, its descendants
    Build(build::BuildArgs),
    /// List defined images
    Images(images::ImagesArgs),
    /// List defined builders
    Builders(builders::BuildersArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Load the configuration file.
pub(crate) fn load_config(path: &Path) -> Result<HoistConfig, Box<dyn std::error::Error>> {
    Ok(HoistConfig::from_file(path)?)
}

/// Load the images tree named by the configuration.
pub(crate) fn open_image_store(
    config: &HoistConfig,
) -> Result<Arc<ImageStore>, Box<dyn std::error::Error>> {
    let store = Arc::new(ImageStore::new(Arc::new(TemplateRenderer::new())));
    hoist_runtime::load_images_file(&store, &config.images_path)?;
    Ok(store)
}

/// Load the builders named by the configuration, if any.
pub(crate) fn open_builders(
    config: &HoistConfig,
) -> Result<Arc<BuildersStore>, Box<dyn std::error::Error>> {
    let builders = Arc::new(BuildersStore::new());
    if let Some(path) = &config.builders_path {
        hoist_runtime::load_builders_file(&builders, path)?;
    }
    Ok(builders)
}

/// Open the registry credentials store.
pub(crate) fn open_credentials(config: &HoistConfig) -> Arc<dyn CredentialsStore> {
    match &config.credentials_path {
        Some(path) => Arc::new(FileCredentialsStore::new(path.clone())),
        None => match FileCredentialsStore::default_path() {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "No credentials store available");
                Arc::new(MemoryCredentialsStore::new())
            }
        },
    }
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build(args) => build::execute(args, &cli.config).await,
        Command::Images(args) => images::execute(args, &cli.config).await,
        Command::Builders(args) => builders::execute(args, &cli.config).await,
        Command::Version(args) => version::execute(args).await,
    }
}
