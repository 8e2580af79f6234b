//! Hoist Core - Foundational Types and Abstractions
//!
//! This crate provides the image model, build options, error types, events
//! and the job abstraction shared across the hoist workspace.

pub mod builder;
pub mod config;
pub mod error;
pub mod event;
pub mod image;
pub mod options;
pub mod queue;
pub mod template;

// Re-export commonly used types
pub use builder::{Builder, BuilderOptions, BuilderRef, VarsMap, DEFAULT_DRIVER_NAME};
pub use config::{DispatcherConfig, HoistConfig, LogLevel};
pub use error::{HoistError, Result};
pub use event::{BuildEvent, EventEmitter};
pub use image::{Image, ImageDefinition, ImageRef, WILDCARD_VERSION};
pub use options::{BuildDriverOptions, BuildOptions, UserPasswordAuth};
pub use queue::{Command, Job, JobDispatcher, JobId};

/// Hoist version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
