//! Build options.
//!
//! [`BuildOptions`] is what a caller asks for; [`BuildDriverOptions`] is the
//! per-image result handed to a driver once those options have been merged
//! with the image definition and credentials have been resolved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::builder::Builder;
use crate::image::{Labels, Vars};

/// Caller supplied build options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Override the image name
    pub image_name: Option<String>,
    /// Override the registry host
    pub image_registry_host: Option<String>,
    /// Override the registry namespace
    pub image_registry_namespace: Option<String>,
    /// Override the parent image name
    pub image_from_name: Option<String>,
    /// Override the parent image version
    pub image_from_version: Option<String>,
    /// Override the parent registry host
    pub image_from_registry_host: Option<String>,
    /// Override the parent registry namespace
    pub image_from_registry_namespace: Option<String>,
    /// Extra tags
    pub tags: Vec<String>,
    /// Generate semantic version tags
    pub enable_semver: bool,
    /// Templates used when generating semantic version tags
    pub semantic_version_tags_templates: Vec<String>,
    pub persistent_vars: Vars,
    pub vars: Vars,
    pub persistent_labels: Labels,
    pub labels: Labels,
    /// Pull the parent image before building
    pub pull_parent_image: bool,
    /// Push the image once built
    pub push_after_build: bool,
    /// Remove the local image once pushed
    pub remove_after_push: bool,
    /// Describe the builds instead of running them
    pub dry_run: bool,
    /// Depth used by the cascade plan
    pub cascade_depth: Option<i64>,
    pub ansible_connection_local: bool,
    pub ansible_intermediate_container_name: Option<String>,
    pub ansible_inventory_path: Option<String>,
    pub ansible_limit: Option<String>,
}

/// Username/password registry credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPasswordAuth {
    pub username: String,
    pub password: String,
}

impl UserPasswordAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for UserPasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPasswordAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// ansible-playbook specific options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnsibleDriverOptions {
    pub connection_local: bool,
    pub intermediate_container_name: String,
    pub inventory_path: Option<String>,
    pub limit: Option<String>,
}

/// Effective options for building one image.
#[derive(Debug, Clone, Default)]
pub struct BuildDriverOptions {
    pub builder: Option<Builder>,
    pub tags: Vec<String>,
    pub persistent_vars: Vars,
    pub vars: Vars,
    pub persistent_labels: Labels,
    pub labels: Labels,
    pub pull_parent_image: bool,
    pub pull_auth: Option<UserPasswordAuth>,
    pub push_image: bool,
    pub push_auth: Option<UserPasswordAuth>,
    pub remove_after_push: bool,
    pub ansible: AnsibleDriverOptions,
}

impl BuildDriverOptions {
    /// Name of the driver the builder asks for, if any.
    pub fn driver_name(&self) -> Option<&str> {
        self.builder
            .as_ref()
            .map(|b| b.driver.as_str())
            .filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_options_from_yaml_defaults() {
        let options: BuildOptions = serde_yaml::from_str("tags: [latest]\ndry_run: true").unwrap();
        assert_eq!(options.tags, vec!["latest"]);
        assert!(options.dry_run);
        assert!(!options.push_after_build);
        assert!(options.cascade_depth.is_none());
    }

    #[test]
    fn test_user_password_debug_hides_password() {
        let auth = UserPasswordAuth::new("user", "secret");
        let debug = format!("{:?}", auth);
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_driver_name() {
        let mut options = BuildDriverOptions::default();
        assert!(options.driver_name().is_none());

        options.builder = Some(Builder::new("b", "", None, None));
        assert!(options.driver_name().is_none());

        options.builder = Some(Builder::new("b", "docker", None, None));
        assert_eq!(options.driver_name(), Some("docker"));
    }
}
