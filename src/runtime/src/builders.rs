//! Registered builders.

use std::collections::HashMap;

use hoist_core::builder::Builder;
use hoist_core::error::{HoistError, Result};
use parking_lot::RwLock;

/// Builders addressable by name
#[derive(Default)]
pub struct BuildersStore {
    builders: RwLock<HashMap<String, Builder>>,
}

impl BuildersStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder. Names are unique.
    pub fn store(&self, builder: Builder) -> Result<()> {
        if builder.name.is_empty() {
            return Err(HoistError::Config(
                "a builder name is required to store a builder".to_string(),
            ));
        }

        let mut builders = self.builders.write();
        if builders.contains_key(&builder.name) {
            return Err(HoistError::Duplicate {
                name: builder.name.clone(),
                version: "builder".to_string(),
            });
        }
        tracing::debug!(builder = %builder.name, driver = %builder.driver, "Stored builder");
        builders.insert(builder.name.clone(), builder);
        Ok(())
    }

    /// Look a builder up by name.
    pub fn find(&self, name: &str) -> Result<Builder> {
        self.builders
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| HoistError::NotFound {
                name: format!("builder '{}'", name),
                versions: vec![],
            })
    }

    /// Every builder, sorted by name.
    pub fn list(&self) -> Vec<Builder> {
        let mut builders: Vec<Builder> = self.builders.read().values().cloned().collect();
        builders.sort_by(|a, b| a.name.cmp(&b.name));
        builders
    }

    pub fn len(&self) -> usize {
        self.builders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_find() {
        let store = BuildersStore::new();
        store.store(Builder::new("infra", "ansible-playbook", None, None)).unwrap();

        let builder = store.find("infra").unwrap();
        assert_eq!(builder.driver, "ansible-playbook");
    }

    #[test]
    fn test_find_missing() {
        let store = BuildersStore::new();
        let err = store.find("missing").unwrap_err();
        assert_eq!(err.to_string(), "Not found: builder 'missing'");
    }

    #[test]
    fn test_duplicate() {
        let store = BuildersStore::new();
        store.store(Builder::new("b", "docker", None, None)).unwrap();
        assert!(matches!(
            store.store(Builder::new("b", "docker", None, None)),
            Err(HoistError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_unnamed_builder_rejected() {
        let store = BuildersStore::new();
        assert!(store.store(Builder::new("", "docker", None, None)).is_err());
    }

    #[test]
    fn test_list_sorted() {
        let store = BuildersStore::new();
        store.store(Builder::new("zeta", "docker", None, None)).unwrap();
        store.store(Builder::new("alpha", "docker", None, None)).unwrap();
        let names: Vec<String> = store.list().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(store.len(), 2);
    }
}
