use std::sync::Arc;

use hoist_core::error::Result;
use hoist_core::image::Image;

use super::step::{signal, Step};
use super::{find_images, Planner};
use crate::store::ImageStore;

/// Plans the requested images and their descendants.
///
/// `depth` limits how many levels below the requested images are planned:
/// `0` plans only the requested images, a negative depth is unbounded.
pub struct CascadePlan {
    store: Arc<ImageStore>,
    depth: i64,
}

impl CascadePlan {
    pub fn new(store: Arc<ImageStore>, depth: i64) -> Self {
        Self { store, depth }
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    fn plan_image(
        &self,
        image: Arc<Image>,
        parent: Option<&mut Step>,
        depth: i64,
        steps: &mut Vec<Step>,
    ) -> Result<()> {
        // templates are never built
        if image.is_wildcard() {
            return Ok(());
        }

        let wait = match parent {
            Some(parent) => {
                let (notify, wait) = signal();
                parent.subscribe(notify)?;
                Some(wait)
            }
            None => None,
        };

        let mut step = Step::new(Arc::clone(&image), wait);
        if depth != 0 {
            for child in image.children() {
                self.plan_image(child, Some(&mut step), depth - 1, steps)?;
            }
        }
        tracing::trace!(image = %image.name, version = %image.version, "Planned step");
        steps.push(step);
        Ok(())
    }
}

impl Planner for CascadePlan {
    fn plan(&self, name: &str, versions: &[String]) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        for image in find_images(&self.store, name, versions)? {
            let mut tree = Vec::new();
            self.plan_image(image, None, self.depth, &mut tree)?;
            // steps are collected children first
            tree.reverse();
            steps.extend(tree);
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_images;
    use crate::plan::testing::chain_store;
    use crate::render::TemplateRenderer;

    fn plan_names(depth: i64) -> Vec<String> {
        CascadePlan::new(chain_store(), depth)
            .plan("image", &["v1".to_string()])
            .unwrap()
            .iter()
            .map(|s| s.image().name.clone())
            .collect()
    }

    #[test]
    fn test_cascade_depth_zero_is_roots_only() {
        assert_eq!(plan_names(0), vec!["image"]);
    }

    #[test]
    fn test_cascade_unbounded() {
        assert_eq!(plan_names(-1), vec!["image", "child", "grandchild"]);
    }

    #[test]
    fn test_cascade_depth_one() {
        assert_eq!(plan_names(1), vec!["image", "child"]);
    }

    #[test]
    fn test_cascade_links_parents_and_children() {
        let steps = CascadePlan::new(chain_store(), -1)
            .plan("image", &["v1".to_string()])
            .unwrap();

        assert!(!steps[0].has_parent());
        assert_eq!(steps[0].subscribers(), 1);
        assert!(steps[1].has_parent());
        assert_eq!(steps[1].subscribers(), 1);
        assert!(steps[2].has_parent());
        assert_eq!(steps[2].subscribers(), 0);
    }

    #[test]
    fn test_cascade_multiple_roots() {
        let steps = CascadePlan::new(chain_store(), -1)
            .plan("image", &[])
            .unwrap();
        // v1 with its two descendants, v2 alone
        let planned: Vec<String> = steps
            .iter()
            .map(|s| format!("{}:{}", s.image().name, s.image().version))
            .collect();
        assert_eq!(planned, vec!["image:v1", "child:v1", "grandchild:v1", "image:v2"]);
    }

    #[test]
    fn test_cascade_from_wildcard_rendered_root() {
        let store = Arc::new(ImageStore::new(Arc::new(TemplateRenderer::new())));
        load_images(
            &store,
            r#"
base:
  "*": {}
app:
  "1.0":
    parent: {name: base, version: "*"}
"#,
        )
        .unwrap();

        let steps = CascadePlan::new(store, -1)
            .plan("base", &["2.0".to_string()])
            .unwrap();
        let planned: Vec<String> = steps
            .iter()
            .map(|s| format!("{}:{}", s.image().name, s.image().version))
            .collect();
        assert_eq!(planned, vec!["base:2.0", "app:1.0"]);
        assert!(steps[1].has_parent());
    }
}
