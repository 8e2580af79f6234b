//! Minimal `{{ .Field }}` placeholder expansion.
//!
//! Image definitions and semantic version tag templates use the same
//! placeholder syntax: a dotted field path between double braces, e.g.
//! `{{ .Version }}` or `{{ .Parent.Name }}`.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{HoistError, Result};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*\.([A-Za-z][A-Za-z0-9_.]*)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Returns true when `input` contains at least one placeholder.
pub fn has_placeholders(input: &str) -> bool {
    placeholder_regex().is_match(input)
}

/// Expand every placeholder in `template` using `lookup`.
///
/// Fails on the first placeholder `lookup` cannot resolve.
pub fn render<F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Option<String> = None;
    let rendered = placeholder_regex().replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        match lookup(key) {
            Some(value) => value,
            None => {
                if missing.is_none() {
                    missing = Some(key.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(key) => Err(HoistError::Render(format!(
            "unknown placeholder '.{}' in template '{}'",
            key, template
        ))),
        None => Ok(rendered.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(key: &str) -> Option<String> {
        match key {
            "Version" => Some("1.2.3".to_string()),
            "Parent.Name" => Some("base".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_render_simple() {
        assert_eq!(render("v{{ .Version }}", lookup).unwrap(), "v1.2.3");
    }

    #[test]
    fn test_render_without_spaces() {
        assert_eq!(render("{{.Version}}", lookup).unwrap(), "1.2.3");
    }

    #[test]
    fn test_render_dotted_path() {
        assert_eq!(
            render("{{ .Parent.Name }}:{{ .Version }}", lookup).unwrap(),
            "base:1.2.3"
        );
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let err = render("{{ .Nope }}", lookup).unwrap_err();
        assert!(err.to_string().contains(".Nope"));
    }

    #[test]
    fn test_render_plain_text_untouched() {
        assert_eq!(render("no placeholders", lookup).unwrap(), "no placeholders");
    }

    #[test]
    fn test_has_placeholders() {
        assert!(has_placeholders("{{ .Version }}"));
        assert!(!has_placeholders("{ .Version }"));
    }
}
