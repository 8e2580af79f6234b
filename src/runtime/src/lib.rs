//! Hoist Runtime - image store, build plans and build orchestration.
//!
//! Images are loaded into an [`ImageStore`], a [`Planner`] turns a build
//! request into ordered [`Step`]s, and the [`BuildService`] runs every step
//! through a driver on a job dispatcher.

#![allow(clippy::result_large_err)]

pub mod build;
pub mod builders;
pub mod command;
pub mod credentials;
pub mod driver;
pub mod loader;
pub mod plan;
pub mod render;
pub mod semver;
pub mod store;

// Re-export common types
pub use build::BuildService;
pub use builders::BuildersStore;
pub use command::{BuildCommand, CommandFactory, DefaultCommandFactory};
pub use credentials::{AuthMethod, CredentialsStore, FileCredentialsStore, MemoryCredentialsStore};
pub use driver::{Driver, DriverFactory, DryRunDriver, DRY_RUN_DRIVER_NAME};
pub use loader::{load_builders, load_builders_file, load_images, load_images_file};
pub use plan::{
    CascadePlan, PlanFactory, PlanParameters, Planner, SinglePlan, Step, CASCADE_PLAN_ID,
    SINGLE_PLAN_ID,
};
pub use render::{Renderer, TemplateRenderer};
pub use semver::{DefaultSemverGenerator, SemverGenerator};
pub use store::ImageStore;

/// Hoist Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
