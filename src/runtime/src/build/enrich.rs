//! Per-image option merging.

use std::sync::Arc;

use hoist_core::image::Image;
use hoist_core::options::{AnsibleDriverOptions, BuildOptions};

fn set_if_some(target: &mut String, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
        *target = value.to_string();
    }
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
        tags.push(tag.to_string());
    }
}

/// Apply name and registry overrides to the image and its parent.
pub(crate) fn apply_overrides(image: &mut Image, options: &BuildOptions) {
    set_if_some(&mut image.name, &options.image_name);
    set_if_some(&mut image.registry_host, &options.image_registry_host);
    set_if_some(&mut image.registry_namespace, &options.image_registry_namespace);

    let overrides_parent = [
        &options.image_from_name,
        &options.image_from_version,
        &options.image_from_registry_host,
        &options.image_from_registry_namespace,
    ]
    .iter()
    .any(|o| o.as_deref().is_some_and(|v| !v.is_empty()));
    if !overrides_parent {
        return;
    }

    let mut parent = image
        .parent
        .as_ref()
        .map(|p| p.copy())
        .unwrap_or_default();
    set_if_some(&mut parent.name, &options.image_from_name);
    set_if_some(&mut parent.version, &options.image_from_version);
    set_if_some(&mut parent.registry_host, &options.image_from_registry_host);
    set_if_some(&mut parent.registry_namespace, &options.image_from_registry_namespace);
    image.parent = Some(Arc::new(parent));
}

/// Append generated and caller tags, keeping the first occurrence of each.
pub(crate) fn merge_tags(image: &mut Image, generated: &[String], options: &BuildOptions) {
    for tag in generated.iter().chain(options.tags.iter()) {
        push_unique(&mut image.tags, tag);
    }
}

/// Merge vars and labels.
///
/// Caller values win over inherited parent values, which win over the
/// image's own. Only persistent maps are inherited.
pub(crate) fn merge_vars_and_labels(image: &mut Image, options: &BuildOptions) {
    if let Some(parent) = &image.parent {
        for (k, v) in &parent.persistent_vars {
            image.persistent_vars.insert(k.clone(), v.clone());
        }
        for (k, v) in &parent.persistent_labels {
            image.persistent_labels.insert(k.clone(), v.clone());
        }
    }

    image.persistent_vars.extend(options.persistent_vars.clone());
    image.vars.extend(options.vars.clone());
    image.persistent_labels.extend(options.persistent_labels.clone());
    image.labels.extend(options.labels.clone());
}

/// ansible-playbook options for one image.
pub(crate) fn ansible_options(image: &Image, driver: &str, options: &BuildOptions) -> AnsibleDriverOptions {
    let intermediate_container_name = options
        .ansible_intermediate_container_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            [
                "builder",
                driver,
                image.registry_namespace.as_str(),
                image.name.as_str(),
                image.version.as_str(),
            ]
            .join("_")
        });

    AnsibleDriverOptions {
        connection_local: options.ansible_connection_local,
        intermediate_container_name,
        inventory_path: options.ansible_inventory_path.clone(),
        limit: options.ansible_limit.clone(),
    }
}
