//! Semantic version tag generation.

use std::collections::BTreeSet;

use hoist_core::error::{HoistError, Result};
use hoist_core::template;

/// Generates extra tags from semantic versions.
pub trait SemverGenerator: Send + Sync {
    /// Render every template for every candidate that parses as a semantic
    /// version. Candidates that do not parse are skipped.
    fn generate_semver_list(&self, versions: &[String], templates: &[String]) -> Result<Vec<String>>;
}

/// [`SemverGenerator`] rendering `{{ .Major }}`, `{{ .Minor }}`,
/// `{{ .Patch }}`, `{{ .PreRelease }}` and `{{ .Build }}` placeholders.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSemverGenerator;

impl DefaultSemverGenerator {
    pub fn new() -> Self {
        Self
    }
}

/// Parse `version`, accepting a leading `v`.
pub fn parse_version(version: &str) -> Option<::semver::Version> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    ::semver::Version::parse(trimmed).ok()
}

fn render_tree(version: &::semver::Version, templates: &[String]) -> Result<Vec<String>> {
    let lookup = |key: &str| match key {
        "Major" => Some(version.major.to_string()),
        "Minor" => Some(version.minor.to_string()),
        "Patch" => Some(version.patch.to_string()),
        "PreRelease" => Some(version.pre.as_str().to_string()),
        "Build" => Some(version.build.as_str().to_string()),
        _ => None,
    };

    templates
        .iter()
        .map(|tmpl| {
            template::render(tmpl, lookup).map_err(|e| {
                HoistError::Semver(format!(
                    "version tree for '{}' could not be generated: {}",
                    version, e
                ))
            })
        })
        .collect()
}

impl SemverGenerator for DefaultSemverGenerator {
    fn generate_semver_list(&self, versions: &[String], templates: &[String]) -> Result<Vec<String>> {
        let mut list = BTreeSet::new();

        for candidate in versions {
            let Some(version) = parse_version(candidate) else {
                tracing::trace!(version = %candidate, "Skipping non semantic version");
                continue;
            };
            list.extend(render_tree(&version, templates)?);
        }

        list.remove("");
        Ok(list.into_iter().collect())
    }
}
