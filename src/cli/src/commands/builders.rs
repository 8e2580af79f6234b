//! `hoist builders` command.

use std::path::Path;

use clap::Args;
use hoist_core::builder::Builder;

use crate::output;

#[derive(Args)]
pub struct BuildersArgs {
    /// Only show builder names (one per line)
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: BuildersArgs, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let builders = super::open_builders(&config)?;

    if args.quiet {
        for builder in builders.list() {
            println!("{}", builder.name);
        }
        return Ok(());
    }

    let mut table = output::new_table(&["NAME", "DRIVER", "VARS MAPPING"]);
    for builder in builders.list() {
        table.add_row(row(&builder));
    }
    println!("{table}");
    Ok(())
}

fn row(builder: &Builder) -> [String; 3] {
    [
        builder.name.clone(),
        builder.driver.clone(),
        builder.var_mapping.len().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_row() {
        // explicit mappings are completed with the well-known defaults
        let doc: serde_yaml::Value = serde_yaml::from_str(
            "name: ansible\ndriver: ansible-playbook\nvariables_mapping:\n  image_name_key: name\n",
        )
        .unwrap();
        let builder = Builder::from_document(&doc).unwrap();
        assert_eq!(row(&builder), ["ansible", "ansible-playbook", "15"].map(String::from));
    }
}
