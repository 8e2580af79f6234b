//! In-memory image store.
//!
//! Indexes concrete images by name and version (rendered version and tags
//! included) and wildcard templates by name. Unknown versions of a name with
//! a template are rendered on demand.

use std::collections::HashMap;
use std::sync::Arc;

use hoist_core::error::{HoistError, Result};
use hoist_core::image::{Image, WILDCARD_VERSION};
use parking_lot::Mutex;

use crate::render::Renderer;

#[derive(Default)]
struct StoreIndex {
    /// name -> version or tag -> image
    images: HashMap<String, HashMap<String, Arc<Image>>>,
    /// name -> template
    wildcards: HashMap<String, Arc<Image>>,
    /// Every stored concrete image, once
    stored: Vec<Arc<Image>>,
    /// Template variants not reachable by name
    variants: Vec<Arc<Image>>,
}

/// Image store
pub struct ImageStore {
    renderer: Arc<dyn Renderer>,
    index: Mutex<StoreIndex>,
}

impl ImageStore {
    /// Create an empty store rendering images with `renderer`.
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            index: Mutex::new(StoreIndex::default()),
        }
    }

    /// Add an image under `name` and `version`.
    ///
    /// `"*"` registers a template; at most one per name. Concrete images are
    /// rendered first and indexed under the requested version, the rendered
    /// version and every tag not indexed yet.
    pub fn store(&self, name: &str, version: &str, image: Image) -> Result<Arc<Image>> {
        if name.is_empty() {
            return Err(HoistError::Config(
                "an image name is required to store an image".to_string(),
            ));
        }
        if version.is_empty() {
            return Err(HoistError::Config(
                "an image version is required to store an image".to_string(),
            ));
        }

        if version == WILDCARD_VERSION {
            let image = Arc::new(image);
            let mut index = self.index.lock();
            if index.wildcards.contains_key(name) {
                return Err(HoistError::Duplicate {
                    name: name.to_string(),
                    version: version.to_string(),
                });
            }
            index.wildcards.insert(name.to_string(), Arc::clone(&image));
            tracing::debug!(image = %name, "Stored wildcard image");
            return Ok(image);
        }

        let rendered = Arc::new(self.renderer.render(name, version, &image)?);

        let mut index = self.index.lock();
        let versions = index.images.entry(name.to_string()).or_default();

        for key in [version, rendered.version.as_str()] {
            if versions.contains_key(key) {
                return Err(HoistError::Duplicate {
                    name: name.to_string(),
                    version: key.to_string(),
                });
            }
        }

        versions.insert(version.to_string(), Arc::clone(&rendered));
        versions.insert(rendered.version.clone(), Arc::clone(&rendered));
        for tag in &rendered.tags {
            versions
                .entry(tag.clone())
                .or_insert_with(|| Arc::clone(&rendered));
        }
        index.stored.push(Arc::clone(&rendered));

        tracing::debug!(image = %name, version = %rendered.version, "Stored image");
        Ok(rendered)
    }

    /// Keep another variant of an image that is already indexed.
    ///
    /// Images built from several parents have one variant per parent. Only
    /// the first is reachable by name and version; the others are kept alive
    /// here and reached through their parent's children.
    pub fn attach(&self, name: &str, version: &str, image: Image) -> Result<Arc<Image>> {
        let rendered = if version == WILDCARD_VERSION {
            Arc::new(image)
        } else {
            Arc::new(self.renderer.render(name, version, &image)?)
        };

        let mut index = self.index.lock();
        if version != WILDCARD_VERSION {
            index.stored.push(Arc::clone(&rendered));
        } else {
            index.variants.push(Arc::clone(&rendered));
        }
        tracing::debug!(image = %name, version = %version, "Attached image variant");
        Ok(rendered)
    }

    /// Every concrete image, sorted by name and version.
    pub fn list(&self) -> Vec<Arc<Image>> {
        let mut images = self.index.lock().stored.clone();
        sort_images(&mut images);
        images
    }

    /// Concrete images of `name`, sorted by version.
    pub fn find_by_name(&self, name: &str) -> Vec<Arc<Image>> {
        let mut images: Vec<Arc<Image>> = self
            .index
            .lock()
            .stored
            .iter()
            .filter(|i| i.name == name)
            .cloned()
            .collect();
        sort_images(&mut images);
        images
    }

    /// Exact lookup; `"*"` looks up the template.
    pub fn find(&self, name: &str, version: &str) -> Option<Arc<Image>> {
        let index = self.index.lock();
        if version == WILDCARD_VERSION {
            return index.wildcards.get(name).cloned();
        }
        index
            .images
            .get(name)
            .and_then(|versions| versions.get(version))
            .cloned()
    }

    /// Template registered for `name`
    pub fn find_wildcard(&self, name: &str) -> Option<Arc<Image>> {
        self.find(name, WILDCARD_VERSION)
    }

    /// Exact lookup falling back to rendering the template of `name`.
    ///
    /// Rendered images are not added to the store; they share the children
    /// of their template.
    pub fn find_guaranteed(&self, name: &str, version: &str) -> Result<Arc<Image>> {
        if let Some(image) = self.find(name, version) {
            return Ok(image);
        }

        let template = self
            .find_wildcard(name)
            .ok_or_else(|| HoistError::not_found(name, version))?;

        let rendered = self.render_wildcard(&template, name, version)?;
        rendered.adopt_children(&template);
        Ok(Arc::new(rendered))
    }

    /// Whether `name` has a template.
    pub fn is_wildcard(&self, name: &str) -> bool {
        self.index.lock().wildcards.contains_key(name)
    }

    /// Number of concrete images stored
    pub fn len(&self) -> usize {
        self.index.lock().stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn render_wildcard(&self, template: &Image, name: &str, version: &str) -> Result<Image> {
        let mut to_render = template.copy();

        if let Some(parent) = &template.parent {
            if parent.is_wildcard() {
                let parent_template = self
                    .find_wildcard(&parent.name)
                    .unwrap_or_else(|| Arc::clone(parent));
                let rendered_parent =
                    self.render_wildcard(&parent_template, &parent.name, version)?;
                to_render.parent = Some(Arc::new(rendered_parent));
            }
        }

        tracing::debug!(image = %name, version = %version, "Rendering image from wildcard");
        self.renderer.render(name, version, &to_render)
    }
}

fn sort_images(images: &mut [Arc<Image>]) {
    images.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
}
