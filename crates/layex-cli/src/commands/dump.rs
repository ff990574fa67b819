//! Dump command - show the positioned text of a document for layout authoring.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use console::style;
use tracing::info;

use layex_core::provider::DocumentDump;
use layex_core::{classify, AutoLayoutProvider, Classification, LayoutProvider, LayoutSchema, Page};

/// Output format for dumps.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DumpFormat {
    /// Aligned, human-readable listing
    Text,
    /// Fragment dump readable by `layex parse`
    Json,
}

/// Arguments for the dump command.
#[derive(Args)]
pub struct DumpArgs {
    /// Document to dump (PDF or JSON fragment dump)
    document: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: DumpFormat,

    /// Classify pages against this layout
    #[arg(short, long)]
    layout: Option<PathBuf>,
}

pub async fn run(args: DumpArgs, _config_path: Option<&str>) -> anyhow::Result<()> {
    if !args.document.exists() {
        anyhow::bail!("File not found: {}", args.document.display());
    }

    let pages = AutoLayoutProvider::new().load(&args.document)?;
    info!("Loaded {} pages from {}", pages.len(), args.document.display());

    match args.format {
        DumpFormat::Json => {
            let dump = DocumentDump { pages };
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        DumpFormat::Text => {
            let schema = match &args.layout {
                Some(path) => Some(LayoutSchema::load(path)?),
                None => None,
            };
            for page in &pages {
                print!("{}", format_page(page, schema.as_ref()));
            }
        }
    }
    Ok(())
}

fn format_page(page: &Page, schema: Option<&LayoutSchema>) -> String {
    let mut out = String::new();

    let heading = format!("Page {}", page.number);
    match schema.map(|s| classify(s.page_types(), &page.fragments)) {
        Some(Classification::Known { page_type, .. }) => out.push_str(&format!(
            "{} {}\n",
            style(heading).bold(),
            style(format!("[{}]", page_type.name)).green()
        )),
        Some(Classification::Unknown) => out.push_str(&format!(
            "{} {}\n",
            style(heading).bold(),
            style("[unknown]").yellow()
        )),
        None => out.push_str(&format!("{}\n", style(heading).bold())),
    }

    for (index, fragment) in page.fragments.iter().enumerate() {
        out.push_str(&format!(
            "{:>5}  {:<36} {}\n",
            index,
            fragment.region.to_string(),
            fragment.text.replace('\n', "\\n")
        ));
    }
    out.push('\n');
    out
}
