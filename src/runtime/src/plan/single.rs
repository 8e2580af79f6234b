use std::sync::Arc;

use hoist_core::error::Result;

use super::{find_images, Planner, Step};
use crate::store::ImageStore;

/// Plans exactly the requested images, with no ordering between them.
pub struct SinglePlan {
    store: Arc<ImageStore>,
}

impl SinglePlan {
    pub fn new(store: Arc<ImageStore>) -> Self {
        Self { store }
    }
}

impl Planner for SinglePlan {
    fn plan(&self, name: &str, versions: &[String]) -> Result<Vec<Step>> {
        let steps = find_images(&self.store, name, versions)?
            .into_iter()
            .map(|image| Step::new(image, None))
            .collect();
        Ok(steps)
    }
}
