//! `hoist version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("hoist version {}", hoist_core::VERSION);
    println!("runtime {}", hoist_runtime::VERSION);
    Ok(())
}
