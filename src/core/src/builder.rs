//! Builder definitions.
//!
//! A builder names the driver used to build an image together with the
//! driver options and the mapping from well-known build variables to the
//! variable names the driver expects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{HoistError, Result};

/// Driver used when an image declares no builder at all.
pub const DEFAULT_DRIVER_NAME: &str = "docker";

/// Well-known variable mapping keys.
pub mod var_mapping_keys {
    pub const IMAGE_BUILDER_LABEL: &str = "image_builder_label_key";
    pub const IMAGE_EXTRA_TAGS: &str = "image_extra_tags_key";
    pub const IMAGE_FROM_FULLY_QUALIFIED_NAME: &str = "image_from_fully_qualified_name_key";
    pub const IMAGE_FROM_NAME: &str = "image_from_name_key";
    pub const IMAGE_FROM_REGISTRY_HOST: &str = "image_from_registry_host_key";
    pub const IMAGE_FROM_REGISTRY_NAMESPACE: &str = "image_from_registry_namespace_key";
    pub const IMAGE_FROM_TAG: &str = "image_from_tag_key";
    pub const IMAGE_FULLY_QUALIFIED_NAME: &str = "image_fully_qualified_name_key";
    pub const IMAGE_LABELS: &str = "image_labels_key";
    pub const IMAGE_NAME: &str = "image_name_key";
    pub const IMAGE_TAG: &str = "image_tag_key";
    pub const PULL_PARENT_IMAGE: &str = "pull_parent_image_key";
    pub const PUSH_IMAGE: &str = "push_image_key";
    pub const REGISTRY_HOST: &str = "image_registry_host_key";
    pub const REGISTRY_NAMESPACE: &str = "image_registry_namespace_key";
}

/// Mapping from well-known build variables to driver variable names.
///
/// Decoded mappings are completed with the defaults for keys they omit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct VarsMap(BTreeMap<String, String>);

impl From<BTreeMap<String, String>> for VarsMap {
    fn from(explicit: BTreeMap<String, String>) -> Self {
        let mut map = VarsMap(explicit);
        map.combine(&VarsMap::default());
        map
    }
}

impl From<VarsMap> for BTreeMap<String, String> {
    fn from(map: VarsMap) -> Self {
        map.0
    }
}

impl Default for VarsMap {
    fn default() -> Self {
        use var_mapping_keys::*;

        let defaults = [
            (IMAGE_BUILDER_LABEL, "image_builder_label"),
            (IMAGE_EXTRA_TAGS, "image_extra_tags"),
            (IMAGE_FROM_FULLY_QUALIFIED_NAME, "image_from_fully_qualified_name"),
            (IMAGE_FROM_NAME, "image_from_name"),
            (IMAGE_FROM_REGISTRY_HOST, "image_from_registry_host"),
            (IMAGE_FROM_REGISTRY_NAMESPACE, "image_from_registry_namespace"),
            (IMAGE_FROM_TAG, "image_from_tag"),
            (IMAGE_FULLY_QUALIFIED_NAME, "image_fully_qualified_name"),
            (IMAGE_LABELS, "image_labels"),
            (IMAGE_NAME, "image_name"),
            (IMAGE_TAG, "image_tag"),
            (PULL_PARENT_IMAGE, "pull_parent_image"),
            (PUSH_IMAGE, "push_image"),
            (REGISTRY_HOST, "image_registry_host"),
            (REGISTRY_NAMESPACE, "image_registry_namespace"),
        ];

        Self(
            defaults
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl VarsMap {
    /// An empty mapping, without the well-known defaults.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Add entries from `other` whose keys are not already present.
    pub fn combine(&mut self, other: &VarsMap) {
        for (k, v) in &other.0 {
            self.0.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Git repository used as a docker build context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitContext {
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One entry of a docker build context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitContext>,
}

/// Driver specific builder options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuilderOptions {
    /// ansible-playbook: playbook path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook: Option<String>,
    /// ansible-playbook: inventory path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<String>,
    /// docker: Dockerfile path relative to the context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// docker: build context sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<BuildContext>,
}

/// A named driver + options + variable-mapping definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Builder {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub options: BuilderOptions,
    #[serde(default, rename = "variables_mapping")]
    pub var_mapping: VarsMap,
}

impl Builder {
    /// Create a builder. A missing mapping falls back to the defaults.
    pub fn new(
        name: impl Into<String>,
        driver: impl Into<String>,
        options: Option<BuilderOptions>,
        var_mapping: Option<VarsMap>,
    ) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
            options: options.unwrap_or_default(),
            var_mapping: var_mapping.unwrap_or_default(),
        }
    }

    /// Decode a free-form document into a builder.
    pub fn from_document(document: &serde_yaml::Value) -> Result<Self> {
        serde_yaml::from_value(document.clone()).map_err(|e| {
            HoistError::Serialization(format!("Builder could not be decoded: {}", e))
        })
    }
}

/// How an image refers to its builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuilderRef {
    /// Reference to a builder registered by name
    Name(String),
    /// Builder defined inline on the image
    Inline(Builder),
    /// Free-form document that still needs decoding
    Document(serde_yaml::Value),
}
