//! Image template rendering.
//!
//! Wildcard images are templates: every string of their definition may hold
//! `{{ .Field }}` placeholders which are expanded when a concrete version is
//! requested.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use hoist_core::error::{HoistError, Result};
use hoist_core::image::{Image, ImageDefinition, WILDCARD_VERSION};
use hoist_core::template;
use serde_yaml::Value;

/// Expands an image definition for a given name and version.
pub trait Renderer: Send + Sync {
    fn render(&self, name: &str, version: &str, image: &Image) -> Result<Image>;
}

/// Source of the timestamp exposed as `{{ .DateRFC3339 }}`.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// [`Renderer`] expanding `{{ .Name }}`-style placeholders.
///
/// Available fields: `Name`, `Version`, `Parent.Name`, `Parent.Version`,
/// `Parent.RegistryHost`, `Parent.RegistryNamespace`, `DateRFC3339`.
#[derive(Clone)]
pub struct TemplateRenderer {
    clock: Clock,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(|| {
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        }))
    }

    /// Use a fixed clock, mostly for tests.
    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }

    fn lookup(&self, key: &str, name: &str, version: &str, image: &Image) -> Option<String> {
        let parent = image.parent.as_deref();
        match key {
            "Name" => Some(name.to_string()),
            "Version" => Some(version.to_string()),
            "DateRFC3339" => Some((self.clock)()),
            "Parent.Name" => parent.map(|p| p.name.clone()),
            "Parent.Version" => parent.map(|p| p.version.clone()),
            "Parent.RegistryHost" => parent.map(|p| p.registry_host.clone()),
            "Parent.RegistryNamespace" => parent.map(|p| p.registry_namespace.clone()),
            _ => None,
        }
    }

    fn render_value(&self, value: Value, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Value> {
        match value {
            Value::String(s) if template::has_placeholders(&s) => {
                Ok(Value::String(template::render(&s, lookup)?))
            }
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.render_value(item, lookup))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut rendered = serde_yaml::Mapping::with_capacity(map.len());
                for (k, v) in map {
                    rendered.insert(self.render_value(k, lookup)?, self.render_value(v, lookup)?);
                }
                Ok(Value::Mapping(rendered))
            }
            other => Ok(other),
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, name: &str, version: &str, image: &Image) -> Result<Image> {
        let document = serde_yaml::to_value(image.to_definition())?;
        let lookup = |key: &str| self.lookup(key, name, version, image);

        let rendered = self.render_value(document, &lookup).map_err(|e| {
            HoistError::Render(format!("image '{}:{}' could not be rendered: {}", name, version, e))
        })?;

        let mut definition: ImageDefinition = serde_yaml::from_value(rendered)?;
        if definition.version == WILDCARD_VERSION {
            definition.version.clear();
        }

        tracing::trace!(image = %name, version = %version, "Rendered image");
        Ok(definition.into_image(name, version, image.parent.clone()))
    }
}
