//! Layout command - validate layout files.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use layex_core::LayoutSchema;

use super::load_config;

/// Arguments for the layout command.
#[derive(Args)]
pub struct LayoutArgs {
    #[command(subcommand)]
    command: LayoutCommand,
}

#[derive(Subcommand)]
enum LayoutCommand {
    /// Load a layout, report problems and summarize its page types
    Check {
        /// Layout file (defaults to the configured layout)
        path: Option<PathBuf>,
    },
}

pub async fn run(args: LayoutArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        LayoutCommand::Check { path } => {
            let path = match path {
                Some(path) => path,
                None => load_config(config_path)?.paths.layout,
            };
            check(path)
        }
    }
}

fn check(path: PathBuf) -> anyhow::Result<()> {
    let schema = LayoutSchema::load(&path)
        .map_err(|e| anyhow::anyhow!("Invalid layout {}: {}", path.display(), e))?;

    println!("{} {} is valid", style("✓").green(), path.display());
    println!();
    println!("{}", style("Page types (classification order):").bold());
    for page_type in schema.page_types() {
        let short_circuits = page_type
            .fields
            .iter()
            .filter(|f| f.short_circuit.is_some())
            .count();
        println!(
            "  {:<20} {:>3} fields  {:>2} skip regions  {:>2} short-circuit",
            page_type.name,
            page_type.fields.len(),
            page_type.skip.len(),
            short_circuits
        );
    }
    Ok(())
}
