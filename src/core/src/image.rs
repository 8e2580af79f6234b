//! Image model.
//!
//! Images form a parent/child tree. A child holds a strong reference to its
//! parent while parents only keep weak references to their children, so the
//! owner of the concrete images (the image store) controls their lifetime.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::builder::BuilderRef;

/// Version marking an image as a template rendered on demand.
pub const WILDCARD_VERSION: &str = "*";

/// Variable map attached to an image.
pub type Vars = BTreeMap<String, serde_json::Value>;

/// Label map attached to an image.
pub type Labels = BTreeMap<String, String>;

/// Reference to a parent image by name and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub version: String,
}

/// Declarative form of an image, as written in definition files and as
/// exchanged with the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDefinition {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, rename = "registry", skip_serializing_if = "String::is_empty")]
    pub registry_host: String,
    #[serde(default, rename = "namespace", skip_serializing_if = "String::is_empty")]
    pub registry_namespace: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: Vars,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub persistent_vars: Vars,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub persistent_labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderRef>,
    /// Single parent reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ImageRef>,
    /// Parent name to list of parent versions; expands into one image per parent
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parents: BTreeMap<String, Vec<String>>,
}

impl ImageDefinition {
    /// Parent references declared by the definition, single form first.
    pub fn parent_refs(&self) -> Vec<ImageRef> {
        let mut refs: Vec<ImageRef> = self.parent.iter().cloned().collect();
        for (name, versions) in &self.parents {
            for version in versions {
                refs.push(ImageRef {
                    name: name.clone(),
                    version: version.clone(),
                });
            }
        }
        refs
    }

    /// Build an image, linked to `parent` but not registered as its child.
    pub fn into_image(self, name: &str, version: &str, parent: Option<Arc<Image>>) -> Image {
        Image {
            name: if self.name.is_empty() {
                name.to_string()
            } else {
                self.name
            },
            version: if self.version.is_empty() {
                version.to_string()
            } else {
                self.version
            },
            registry_host: self.registry_host,
            registry_namespace: self.registry_namespace,
            tags: self.tags,
            vars: self.vars,
            persistent_vars: self.persistent_vars,
            labels: self.labels,
            persistent_labels: self.persistent_labels,
            builder: self.builder,
            parent,
            children: RwLock::new(Vec::new()),
        }
    }
}

/// A container image definition.
#[derive(Default)]
pub struct Image {
    pub name: String,
    pub version: String,
    pub registry_host: String,
    pub registry_namespace: String,
    pub tags: Vec<String>,
    pub vars: Vars,
    pub persistent_vars: Vars,
    pub labels: Labels,
    pub persistent_labels: Labels,
    pub builder: Option<BuilderRef>,
    pub parent: Option<Arc<Image>>,
    children: RwLock<Vec<Weak<Image>>>,
}

impl Image {
    /// Create an image with only a name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Set the parent image.
    pub fn with_parent(mut self, parent: Arc<Image>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the builder reference.
    pub fn with_builder(mut self, builder: BuilderRef) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Set the registry host and namespace.
    pub fn with_registry(mut self, host: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.registry_host = host.into();
        self.registry_namespace = namespace.into();
        self
    }

    /// Whether this image is a template.
    pub fn is_wildcard(&self) -> bool {
        self.version == WILDCARD_VERSION
    }

    /// Register `child` as a descendant of this image.
    pub fn add_child(&self, child: &Arc<Image>) {
        self.children.write().push(Arc::downgrade(child));
    }

    /// Live children, in registration order.
    pub fn children(&self) -> Vec<Arc<Image>> {
        self.children
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Reference to the image as `name:version`.
    pub fn reference(&self) -> ImageRef {
        ImageRef {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    /// `[host/][namespace/]name[:version]`
    pub fn fully_qualified_name(&self) -> String {
        let mut out = String::new();
        if !self.registry_host.is_empty() {
            out.push_str(&self.registry_host);
            out.push('/');
        }
        if !self.registry_namespace.is_empty() {
            out.push_str(&self.registry_namespace);
            out.push('/');
        }
        out.push_str(&self.name);
        if !self.version.is_empty() {
            out.push(':');
            out.push_str(&self.version);
        }
        out
    }

    /// Replace characters a docker tag cannot hold.
    pub fn sanitize(&mut self) {
        self.version = sanitize_version(&self.version);
    }

    /// Declarative form of the image, without parent or children.
    pub fn to_definition(&self) -> ImageDefinition {
        ImageDefinition {
            name: self.name.clone(),
            version: self.version.clone(),
            registry_host: self.registry_host.clone(),
            registry_namespace: self.registry_namespace.clone(),
            tags: self.tags.clone(),
            vars: self.vars.clone(),
            persistent_vars: self.persistent_vars.clone(),
            labels: self.labels.clone(),
            persistent_labels: self.persistent_labels.clone(),
            builder: self.builder.clone(),
            parent: None,
            parents: BTreeMap::new(),
        }
    }

    /// Copy of the image sharing the same parent and children.
    pub fn copy(&self) -> Image {
        Image {
            name: self.name.clone(),
            version: self.version.clone(),
            registry_host: self.registry_host.clone(),
            registry_namespace: self.registry_namespace.clone(),
            tags: self.tags.clone(),
            vars: self.vars.clone(),
            persistent_vars: self.persistent_vars.clone(),
            labels: self.labels.clone(),
            persistent_labels: self.persistent_labels.clone(),
            builder: self.builder.clone(),
            parent: self.parent.clone(),
            children: RwLock::new(self.children.read().clone()),
        }
    }

    /// Take over the live children of `other`, keeping the current ones.
    pub fn adopt_children(&self, other: &Image) {
        let adopted = other.children();
        let mut children = self.children.write();
        for child in &adopted {
            let known = children
                .iter()
                .any(|c| c.upgrade().is_some_and(|c| Arc::ptr_eq(&c, child)));
            if !known {
                children.push(Arc::downgrade(child));
            }
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("registry_host", &self.registry_host)
            .field("registry_namespace", &self.registry_namespace)
            .field("tags", &self.tags)
            .field("builder", &self.builder)
            .field("parent", &self.parent.as_ref().map(|p| p.reference()))
            .field("children", &self.children.read().len())
            .finish()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Docker tags do not accept `+`; semver build metadata uses it.
pub fn sanitize_version(version: &str) -> String {
    version.replace('+', "_")
}
