//! Build plans
//!
//! A planner turns an image name and a set of versions into the list of
//! [`Step`]s to build, linked so that children wait for their parents.

use std::sync::Arc;

use hoist_core::error::{HoistError, Result};
use hoist_core::image::Image;

use crate::store::ImageStore;

pub mod cascade;
pub mod factory;
pub mod single;
pub mod step;

pub use cascade::CascadePlan;
pub use factory::{PlanFactory, PlanParameters, CASCADE_PLAN_ID, SINGLE_PLAN_ID};
pub use single::SinglePlan;
pub use step::Step;

/// Produces the steps of a build
pub trait Planner: Send + Sync {
    fn plan(&self, name: &str, versions: &[String]) -> Result<Vec<Step>>;
}

/// Resolve the requested images.
///
/// Without versions every concrete version of `name` is returned.
pub(crate) fn find_images(
    store: &ImageStore,
    name: &str,
    versions: &[String],
) -> Result<Vec<Arc<Image>>> {
    let images = if versions.is_empty() {
        store.find_by_name(name)
    } else {
        let mut images = Vec::with_capacity(versions.len());
        for version in versions {
            match store.find_guaranteed(name, version) {
                Ok(image) => images.push(image),
                Err(HoistError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        images
    };

    if images.is_empty() {
        return Err(HoistError::NotFound {
            name: name.to_string(),
            versions: versions.to_vec(),
        });
    }

    tracing::debug!(image = %name, count = images.len(), "Resolved images to plan");
    Ok(images)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::render::TemplateRenderer;

    /// Store with a three level chain `image:v1 -> child:v1 -> grandchild:v1`
    /// and a wildcard child of `image:v1`.
    pub fn chain_store() -> Arc<ImageStore> {
        let store = Arc::new(ImageStore::new(Arc::new(TemplateRenderer::new())));
        let root = store.store("image", "v1", Image::new("image", "v1")).unwrap();
        store.store("image", "v2", Image::new("image", "v2")).unwrap();

        let child = store
            .store("child", "v1", Image::new("child", "v1").with_parent(root.clone()))
            .unwrap();
        root.add_child(&child);

        let grandchild = store
            .store(
                "grandchild",
                "v1",
                Image::new("grandchild", "v1").with_parent(child.clone()),
            )
            .unwrap();
        child.add_child(&grandchild);

        let template = store
            .store("template", "*", Image::new("template", "*").with_parent(root.clone()))
            .unwrap();
        root.add_child(&template);

        store
    }
}

#[cfg(test)]
mod tests {
    use super::testing::chain_store;
    use super::*;

    #[test]
    fn test_find_images_all_versions() {
        let store = chain_store();
        let images = find_images(&store, "image", &[]).unwrap();
        let versions: Vec<&str> = images.iter().map(|i| i.version.as_str()).collect();
        assert_eq!(versions, vec!["v1", "v2"]);
    }

    #[test]
    fn test_find_images_not_found_names_versions() {
        let store = chain_store();
        let err = find_images(&store, "image", &["v9".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Not found: image version(s) [v9]");
    }

    #[test]
    fn test_find_images_unknown_name() {
        let store = chain_store();
        let err = find_images(&store, "missing", &[]).unwrap_err();
        assert!(matches!(err, HoistError::NotFound { .. }));
    }
}
