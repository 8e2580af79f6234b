//! `hoist images` command.

use std::path::Path;

use clap::Args;
use hoist_core::image::Image;

use crate::output;

const HEADERS: [&str; 6] = ["NAME", "VERSION", "REGISTRY", "NAMESPACE", "PARENT", "TAGS"];

#[derive(Args)]
pub struct ImagesArgs {
    /// Only show images with this name
    pub name: Option<String>,

    /// Only show image references (one per line)
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: ImagesArgs, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = super::open_image_store(&config)?;

    let mut images = match &args.name {
        Some(name) => store.find_by_name(name),
        None => store.list(),
    };
    images.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));

    if args.quiet {
        for image in &images {
            println!("{}", image.reference());
        }
        return Ok(());
    }

    let mut table = output::new_table(&HEADERS);
    for image in &images {
        table.add_row(ImageRow::from_image(image).cells());
    }
    println!("{table}");
    Ok(())
}

/// Display fields for a single image row.
struct ImageRow {
    name: String,
    version: String,
    registry: String,
    namespace: String,
    parent: String,
    tags: String,
}

impl ImageRow {
    fn from_image(image: &Image) -> Self {
        Self {
            name: image.name.clone(),
            version: image.version.clone(),
            registry: or_none(&image.registry_host),
            namespace: or_none(&image.registry_namespace),
            parent: image
                .parent
                .as_ref()
                .map(|p| p.reference().to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            tags: image.tags.join(","),
        }
    }

    fn cells(self) -> [String; 6] {
        [
            self.name,
            self.version,
            self.registry,
            self.namespace,
            self.parent,
            self.tags,
        ]
    }
}

fn or_none(value: &str) -> String {
    if value.is_empty() {
        "<none>".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_image_row() {
        let parent = Arc::new(Image::new("base", "1.0"));
        let mut image = Image::new("app", "2.0")
            .with_registry("registry.test", "")
            .with_parent(parent);
        image.tags = vec!["2".to_string(), "latest".to_string()];

        let cells = ImageRow::from_image(&image).cells();
        assert_eq!(
            cells,
            ["app", "2.0", "registry.test", "<none>", "base:1.0", "2,latest"].map(String::from)
        );
    }

    #[test]
    fn test_image_row_without_parent() {
        let cells = ImageRow::from_image(&Image::new("base", "1.0")).cells();
        assert_eq!(cells[4], "<none>");
        assert_eq!(cells[5], "");
    }
}
