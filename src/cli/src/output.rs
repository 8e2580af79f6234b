//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};
use hoist_core::event::{events, BuildEvent};

/// Create a borderless table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// One progress line per build step event.
pub fn progress_line(event: &BuildEvent) -> Option<String> {
    let image = event.field("image")?;
    let version = event.field("version").unwrap_or_default();
    match event.key.as_str() {
        events::BUILD_STEP_STARTED => Some(format!("Building {image}:{version}")),
        events::BUILD_STEP_COMPLETED => Some(format!("Built {image}:{version}")),
        events::BUILD_STEP_FAILED => Some(format!(
            "Failed {image}:{version}: {}",
            event.field("error").unwrap_or("unknown error")
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_with_rows() {
        let mut table = new_table(&["NAME", "VERSION"]);
        table.add_row(["base", "1.0"]);
        let output = table.to_string();
        assert!(output.contains("NAME"));
        assert!(output.contains("base"));
        assert!(output.contains("1.0"));
    }

    #[test]
    fn test_progress_lines() {
        let started = BuildEvent::for_image(events::BUILD_STEP_STARTED, "app", "1.0");
        assert_eq!(progress_line(&started).as_deref(), Some("Building app:1.0"));

        let done = BuildEvent::for_image(events::BUILD_STEP_COMPLETED, "app", "1.0");
        assert_eq!(progress_line(&done).as_deref(), Some("Built app:1.0"));

        let mut failed = BuildEvent::for_image(events::BUILD_STEP_FAILED, "app", "1.0");
        failed
            .payload
            .insert("error".to_string(), serde_json::json!("boom"));
        assert_eq!(progress_line(&failed).as_deref(), Some("Failed app:1.0: boom"));
    }

    #[test]
    fn test_progress_ignores_other_events() {
        let event = BuildEvent::for_image(events::BUILD_STARTED, "app", "1.0");
        assert!(progress_line(&event).is_none());
    }
}
