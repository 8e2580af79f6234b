use std::sync::Arc;

use hoist_core::error::{HoistError, Result};

use super::{CascadePlan, Planner, SinglePlan};
use crate::store::ImageStore;

/// Identifier of the cascade plan
pub const CASCADE_PLAN_ID: &str = "cascade";

/// Identifier of the single plan
pub const SINGLE_PLAN_ID: &str = "single";

/// Parameters accepted by [`PlanFactory::new_plan`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanParameters {
    /// Cascade depth, required by the cascade plan
    pub depth: Option<i64>,
}

impl PlanParameters {
    pub fn with_depth(depth: i64) -> Self {
        Self { depth: Some(depth) }
    }
}

/// Creates planners over an image store
pub struct PlanFactory {
    store: Option<Arc<ImageStore>>,
}

impl PlanFactory {
    pub fn new(store: Arc<ImageStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Factory without a store; every plan request fails.
    pub fn empty() -> Self {
        Self { store: None }
    }

    pub fn new_plan(&self, id: &str, parameters: PlanParameters) -> Result<Box<dyn Planner>> {
        let store = self.store.as_ref().ok_or_else(|| {
            HoistError::Config("an image store is required to create a build plan".to_string())
        })?;

        match id {
            CASCADE_PLAN_ID => {
                let depth = parameters.depth.ok_or_else(|| {
                    HoistError::Config("a depth is required to create a cascade plan".to_string())
                })?;
                Ok(Box::new(CascadePlan::new(Arc::clone(store), depth)))
            }
            SINGLE_PLAN_ID => Ok(Box::new(SinglePlan::new(Arc::clone(store)))),
            other => Err(HoistError::Config(format!(
                "plan '{}' has not been registered",
                other
            ))),
        }
    }
}
