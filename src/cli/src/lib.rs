//! Hoist CLI - build trees of container images.

pub mod commands;
pub mod output;
