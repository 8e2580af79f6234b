//! Image tree and builder definition loading.
//!
//! The images document maps `name -> version -> definition`. Definitions
//! name their parents through `parent` or `parents`; parents are stored
//! before their children and every child is linked to its parent.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use hoist_core::builder::Builder;
use hoist_core::error::{HoistError, Result};
use hoist_core::image::{Image, ImageDefinition, ImageRef};

use crate::builders::BuildersStore;
use crate::store::ImageStore;

type Definitions = BTreeMap<String, BTreeMap<String, ImageDefinition>>;

/// Load the images document at `path` into `store`.
pub fn load_images_file(store: &ImageStore, path: &Path) -> Result<usize> {
    let data = read(path, "images")?;
    load_images(store, &data)
}

/// Load an images document into `store`. Returns the number of definitions.
pub fn load_images(store: &ImageStore, data: &str) -> Result<usize> {
    let definitions: Definitions = serde_yaml::from_str(data).map_err(|e| {
        HoistError::Serialization(format!("images definition could not be decoded: {}", e))
    })?;

    let mut loader = ImagesLoader {
        store,
        definitions: &definitions,
        loaded: HashSet::new(),
        loading: HashSet::new(),
    };

    let mut count = 0;
    for (name, versions) in &definitions {
        for version in versions.keys() {
            loader.load(name, version)?;
            count += 1;
        }
    }

    tracing::info!(definitions = count, images = store.len(), "Loaded images");
    Ok(count)
}

/// Load the builders document at `path` into `store`.
pub fn load_builders_file(store: &BuildersStore, path: &Path) -> Result<usize> {
    let data = read(path, "builders")?;
    load_builders(store, &data)
}

/// Load a builders document (`name -> builder`) into `store`.
pub fn load_builders(store: &BuildersStore, data: &str) -> Result<usize> {
    let documents: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(data).map_err(|e| {
        HoistError::Serialization(format!("builders definition could not be decoded: {}", e))
    })?;

    let count = documents.len();
    for (name, document) in documents {
        let mut builder = Builder::from_document(&document)?;
        if builder.name.is_empty() {
            builder.name = name;
        }
        store.store(builder)?;
    }

    tracing::info!(builders = count, "Loaded builders");
    Ok(count)
}

fn read(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        HoistError::Config(format!(
            "failed to read {} definition {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

struct ImagesLoader<'a> {
    store: &'a ImageStore,
    definitions: &'a Definitions,
    loaded: HashSet<(String, String)>,
    loading: HashSet<(String, String)>,
}

impl ImagesLoader<'_> {
    fn load(&mut self, name: &str, version: &str) -> Result<()> {
        let key = (name.to_string(), version.to_string());
        if self.loaded.contains(&key) {
            return Ok(());
        }
        if !self.loading.insert(key.clone()) {
            return Err(HoistError::Config(format!(
                "image '{}:{}' is its own ancestor",
                name, version
            )));
        }

        let definition = self
            .definitions
            .get(name)
            .and_then(|versions| versions.get(version))
            .ok_or_else(|| HoistError::not_found(name, version))?;

        let parents = definition.parent_refs();
        if parents.is_empty() {
            self.store
                .store(name, version, definition.clone().into_image(name, version, None))?;
        } else {
            for (i, parent_ref) in parents.iter().enumerate() {
                let parent = self.parent(parent_ref)?;
                let image = definition
                    .clone()
                    .into_image(name, version, Some(Arc::clone(&parent)));
                let stored = if i == 0 {
                    self.store.store(name, version, image)?
                } else {
                    self.store.attach(name, version, image)?
                };
                parent.add_child(&stored);
            }
        }

        self.loading.remove(&key);
        self.loaded.insert(key);
        Ok(())
    }

    fn parent(&mut self, parent: &ImageRef) -> Result<Arc<Image>> {
        let defined = self
            .definitions
            .get(&parent.name)
            .is_some_and(|versions| versions.contains_key(&parent.version));
        if defined {
            self.load(&parent.name, &parent.version)?;
        }

        self.store
            .find(&parent.name, &parent.version)
            .ok_or_else(|| HoistError::not_found(&parent.name, &parent.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TemplateRenderer;
    use tempfile::TempDir;

    fn make_store() -> ImageStore {
        ImageStore::new(Arc::new(TemplateRenderer::new()))
    }

    const IMAGES: &str = r#"
app:
  "1.0":
    registry: registry.test
    namespace: team
    tags: ["{{ .Version }}-{{ .Parent.Name }}"]
    builder: app-builder
    parent:
      name: base
      version: "3.18"
base:
  "3.18":
    builder:
      driver: docker
  "3.19": {}
tools:
  "*":
    parents:
      base: ["3.18", "3.19"]
"#;

    #[test]
    fn test_load_images_links_parents() {
        let store = make_store();
        let count = load_images(&store, IMAGES).unwrap();
        assert_eq!(count, 4);

        let app = store.find("app", "1.0").unwrap();
        let parent = app.parent.as_ref().unwrap();
        assert_eq!(parent.reference().to_string(), "base:3.18");
        assert_eq!(app.tags, vec!["1.0-base"]);
        assert_eq!(app.registry_host, "registry.test");

        let children: Vec<String> = store
            .find("base", "3.18")
            .unwrap()
            .children()
            .iter()
            .map(|c| c.reference().to_string())
            .collect();
        assert!(children.contains(&"app:1.0".to_string()));
        assert!(children.contains(&"tools:*".to_string()));
    }

    #[test]
    fn test_load_images_multiple_parents() {
        let store = make_store();
        load_images(&store, IMAGES).unwrap();

        assert!(store.is_wildcard("tools"));
        for version in ["3.18", "3.19"] {
            let base = store.find("base", version).unwrap();
            let tools: Vec<Arc<Image>> = base
                .children()
                .into_iter()
                .filter(|c| c.name == "tools")
                .collect();
            assert_eq!(tools.len(), 1);
            assert_eq!(tools[0].parent.as_ref().unwrap().version, version);
        }
    }

    #[test]
    fn test_load_images_unknown_parent() {
        let store = make_store();
        let err = load_images(
            &store,
            "app:\n  \"1.0\":\n    parent: {name: missing, version: \"1\"}\n",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Not found: missing version(s) [1]");
    }

    #[test]
    fn test_load_images_cycle() {
        let store = make_store();
        let err = load_images(
            &store,
            "a:\n  \"1\":\n    parent: {name: b, version: \"1\"}\nb:\n  \"1\":\n    parent: {name: a, version: \"1\"}\n",
        )
        .unwrap_err();
        assert!(matches!(err, HoistError::Config(_)));
    }

    #[test]
    fn test_load_images_invalid_document() {
        let store = make_store();
        assert!(matches!(
            load_images(&store, "- not\n- a map\n"),
            Err(HoistError::Serialization(_))
        ));
    }

    #[test]
    fn test_load_builders() {
        let store = BuildersStore::new();
        let count = load_builders(
            &store,
            r#"
app-builder:
  driver: docker
  options:
    dockerfile: Dockerfile
  variables_mapping:
    image_name_key: name
infra:
  name: infra-playbook
  driver: ansible-playbook
"#,
        )
        .unwrap();
        assert_eq!(count, 2);

        let builder = store.find("app-builder").unwrap();
        assert_eq!(builder.name, "app-builder");
        assert_eq!(builder.var_mapping.get("image_name_key"), Some("name"));
        assert_eq!(builder.var_mapping.get("image_tag_key"), Some("image_tag"));
        assert!(store.find("infra-playbook").is_ok());
    }

    #[test]
    fn test_load_builders_unknown_field() {
        let store = BuildersStore::new();
        let err = load_builders(&store, "b:\n  driver: docker\n  unknown: 1\n").unwrap_err();
        assert!(err.to_string().contains("Builder could not be decoded"));
    }

    #[test]
    fn test_load_files() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("images.yaml");
        let builders = dir.path().join("builders.yaml");
        std::fs::write(&images, "base:\n  \"1\": {}\n").unwrap();
        std::fs::write(&builders, "b:\n  driver: docker\n").unwrap();

        let store = make_store();
        assert_eq!(load_images_file(&store, &images).unwrap(), 1);
        assert_eq!(load_builders_file(&BuildersStore::new(), &builders).unwrap(), 1);

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            load_images_file(&store, &missing),
            Err(HoistError::Config(_))
        ));
    }
}
