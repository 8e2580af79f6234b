//! Driver that describes builds instead of running them.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::Write;

use async_trait::async_trait;
use hoist_core::builder::{var_mapping_keys, BuilderRef, VarsMap};
use hoist_core::error::Result;
use hoist_core::image::Image;
use hoist_core::options::BuildDriverOptions;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::Driver;

/// Writes a description of every image it is asked to build.
pub struct DryRunDriver {
    out: Mutex<Box<dyn Write + Send>>,
}

impl DryRunDriver {
    /// Describe builds on stdout.
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for DryRunDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn join_map<V: Display>(map: &BTreeMap<String, V>) -> String {
    let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{{{}}}", pairs.join(", "))
}

fn describe_builder(builder: &Option<BuilderRef>) -> String {
    match builder {
        None => "<none>".to_string(),
        Some(BuilderRef::Name(name)) => name.clone(),
        Some(BuilderRef::Inline(builder)) => {
            format!("{} (driver: {})", builder.name, builder.driver)
        }
        Some(BuilderRef::Document(_)) => "<inline document>".to_string(),
    }
}

/// Render the description of one build.
pub(crate) fn describe(image: &Image, options: &BuildDriverOptions) -> String {
    let mut lines = vec![String::new()];

    lines.push(format!(" builder: {}", describe_builder(&image.builder)));
    let children = image.children();
    if !children.is_empty() {
        lines.push(" children:".to_string());
        for child in children {
            lines.push(format!(" - {}", child.reference()));
        }
    }
    lines.push(format!(" labels: {}", join_map(&image.labels)));
    lines.push(format!(" name: {}", image.name));
    if let Some(parent) = &image.parent {
        lines.push(" parent:".to_string());
        lines.push(format!(" - {}", parent.reference()));
    }
    lines.push(format!(" persistent labels: {}", join_map(&image.persistent_labels)));
    lines.push(format!(" persistent vars: {}", join_map(&image.persistent_vars)));
    lines.push(format!(" registry host: {}", image.registry_host));
    lines.push(format!(" registry namespace: {}", image.registry_namespace));
    lines.push(format!(" tags: [{}]", image.tags.join(", ")));
    lines.push(format!(" vars: {}", join_map(&image.vars)));
    lines.push(format!(" version: {}", image.version));

    lines.push(" options:".to_string());
    if let Some(driver) = options.driver_name() {
        lines.push(format!("  driver: {}", driver));
    }
    lines.push(format!("  tags: [{}]", options.tags.join(", ")));
    lines.push(format!("  pull parent image: {}", options.pull_parent_image));
    lines.push(format!("  pull auth: {}", options.pull_auth.is_some()));
    lines.push(format!("  push image: {}", options.push_image));
    lines.push(format!("  push auth: {}", options.push_auth.is_some()));
    lines.push(format!("  remove after push: {}", options.remove_after_push));
    if !options.ansible.intermediate_container_name.is_empty() {
        lines.push(format!(
            "  ansible intermediate container: {}",
            options.ansible.intermediate_container_name
        ));
    }

    if let Some(parent) = &image.parent {
        let mapping = options
            .builder
            .as_ref()
            .map(|b| b.var_mapping.clone())
            .unwrap_or_default();
        let key = |k: &str| -> String { mapping_key(&mapping, k) };

        lines.push(" parent builder vars mapping:".to_string());
        let pairs = [
            (var_mapping_keys::IMAGE_FROM_REGISTRY_NAMESPACE, &parent.registry_namespace),
            (var_mapping_keys::IMAGE_FROM_NAME, &parent.name),
            (var_mapping_keys::IMAGE_FROM_TAG, &parent.version),
            (var_mapping_keys::IMAGE_FROM_REGISTRY_HOST, &parent.registry_host),
        ];
        for (mapping_key, value) in pairs {
            if !value.is_empty() {
                lines.push(format!("  {}: {}", key(mapping_key), value));
            }
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

fn mapping_key(mapping: &VarsMap, key: &str) -> String {
    mapping.get(key).unwrap_or(key).to_string()
}

#[async_trait]
impl Driver for DryRunDriver {
    async fn build(
        &self,
        _cancel: &CancellationToken,
        image: &Image,
        options: &BuildDriverOptions,
    ) -> Result<()> {
        let description = describe(image, options);
        let mut out = self.out.lock();
        writeln!(out, "{}", description)?;
        out.flush()?;
        Ok(())
    }
}
