//! Parse command - turn documents into stored records.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgGroup, Args};
use console::style;
use glob::glob;
use serde_json::Value;
use tracing::{debug, warn};

use layex_core::models::ParseConfig;
use layex_core::{
    case_id_to_filename, filename_to_case_id, DocumentParser, JsonLinesStore, JsonRecordStore,
    LayexConfig, LayoutSchema, Orchestrator, PipelineOptions, RecordStore, RunSummary,
};

use super::load_config;
use super::teach::{confirm, ConsoleEditor};

/// Arguments for the parse command.
#[derive(Args)]
#[command(group(
    ArgGroup::new("reparse")
        .args(["reparse_flagged", "reparse_old", "reparse_all"])
        .conflicts_with("files")
))]
pub struct ParseArgs {
    /// Documents to parse; records are printed as JSON lines instead of stored
    files: Vec<String>,

    /// Reparse stored documents whose flag field is set
    #[arg(long)]
    reparse_flagged: bool,

    /// Reparse stored documents that never parsed cleanly or at all
    #[arg(long)]
    reparse_old: bool,

    /// Reparse every document in the document directory
    #[arg(long)]
    reparse_all: bool,

    /// Number of parallel workers (0 = available parallelism)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Ask about fragments the layout cannot place and learn from the answers
    #[arg(short, long)]
    interactive: bool,

    /// Layout file
    #[arg(short, long)]
    layout: Option<PathBuf>,

    /// Directory holding the source documents
    #[arg(long)]
    document_dir: Option<PathBuf>,

    /// Directory holding the record store
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

/// Which documents a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Explicit,
    Flagged,
    Old,
    All,
    Unparsed,
}

impl ParseArgs {
    fn selection(&self) -> Selection {
        if !self.files.is_empty() {
            Selection::Explicit
        } else if self.reparse_flagged {
            Selection::Flagged
        } else if self.reparse_old {
            Selection::Old
        } else if self.reparse_all {
            Selection::All
        } else {
            Selection::Unparsed
        }
    }
}

pub async fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);

    let parser = DocumentParser::from_config(&config)?;

    let selection = args.selection();
    let paths = match selection {
        Selection::Explicit => expand_files(&args.files)?,
        _ => {
            let mut store = JsonRecordStore::open(&config.paths.store_dir)?;
            select_documents(selection, &mut store, &config)?
        }
    };

    if paths.is_empty() {
        eprintln!("{} Nothing to parse", style("ℹ").blue());
        return Ok(());
    }
    eprintln!(
        "{} Parsing {} documents",
        style("ℹ").blue(),
        paths.len()
    );

    let mut options = PipelineOptions::from_config(&config.parse);
    if args.interactive {
        options = options.with_workers(1);
    }
    let orchestrator = Orchestrator::new(parser, options);

    let shutdown = orchestrator.shutdown();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight documents");
            shutdown.request();
        }
    });

    let interactive = args.interactive;
    let store_dir = config.paths.store_dir.clone();
    let (summary, orchestrator) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut store: Box<dyn RecordStore> = match selection {
            Selection::Explicit => Box::new(JsonLinesStore::new(io::stdout())),
            _ => Box::new(JsonRecordStore::open(&store_dir)?),
        };
        execute(orchestrator, paths, store.as_mut(), interactive)
    })
    .await??;

    if interactive && orchestrator.parser().schema().is_modified() {
        offer_save(orchestrator.parser().schema(), &config.paths.layout)?;
    }

    report(&summary);
    if !summary.status.is_success() {
        std::process::exit(summary.status.exit_code());
    }
    Ok(())
}

fn execute(
    mut orchestrator: Orchestrator,
    paths: Vec<PathBuf>,
    store: &mut dyn RecordStore,
    interactive: bool,
) -> anyhow::Result<(RunSummary, Orchestrator)> {
    let summary = if interactive {
        let mut editor = ConsoleEditor::new();
        orchestrator.run_interactive(paths, store, &mut editor)
    } else {
        orchestrator.run(paths, store)
    };
    Ok((summary, orchestrator))
}

fn apply_overrides(config: &mut LayexConfig, args: &ParseArgs) {
    if let Some(layout) = &args.layout {
        config.paths.layout = layout.clone();
    }
    if let Some(dir) = &args.document_dir {
        config.paths.document_dir = dir.clone();
    }
    if let Some(dir) = &args.store_dir {
        config.paths.store_dir = dir.clone();
    }
    if let Some(workers) = args.workers {
        config.parse.workers = workers;
    }
}

fn offer_save(schema: &LayoutSchema, path: &Path) -> anyhow::Result<()> {
    if confirm(&format!("Layout changed. Save to {}?", path.display()))? {
        schema.save(path)?;
        eprintln!("{} Saved layout to {}", style("✓").green(), path.display());
    } else {
        eprintln!("{} Layout changes discarded", style("ℹ").blue());
    }
    Ok(())
}

fn report(summary: &RunSummary) {
    let marker = if summary.status.is_success() {
        style("✓").green()
    } else {
        style("✗").red()
    };
    eprintln!();
    eprintln!(
        "{} {}: stored {} of {} documents in {:.1?}",
        marker,
        summary.status,
        summary.stored,
        summary.documents,
        summary.elapsed
    );
    if summary.peak_result_queue > 0 {
        eprintln!("  Peak result queue: {}", summary.peak_result_queue);
    }
}

/// Expand file arguments, treating each one as a glob pattern.
fn expand_files(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let matched: Vec<PathBuf> = glob(pattern)?.filter_map(|r| r.ok()).collect();
        if matched.is_empty() {
            anyhow::bail!("No matching files found for pattern: {}", pattern);
        }
        files.extend(matched);
    }
    Ok(files)
}

/// Documents in `dir` that a layout provider can read, sorted by name.
fn list_documents(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Document directory not found: {}", dir.display());
    }
    let pattern = dir.join("*");
    let mut files: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
        .filter_map(|r| r.ok())
        .filter(|p| is_document(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_document(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(ext.to_lowercase().as_str(), "pdf" | "json")
}

fn select_documents(
    selection: Selection,
    store: &mut JsonRecordStore,
    config: &LayexConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    let document_dir = &config.paths.document_dir;
    let paths = match selection {
        Selection::All => list_documents(document_dir)?,
        Selection::Unparsed => {
            let done: HashSet<String> = store
                .records()?
                .into_iter()
                .filter(|r| is_truthy(r.get("parsed")))
                .filter_map(|r| r.get("case_id").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            debug!("{} documents already parsed", done.len());
            list_documents(document_dir)?
                .into_iter()
                .filter(|p| !done.contains(&filename_to_case_id(p)))
                .collect()
        }
        Selection::Flagged | Selection::Old => store
            .records()?
            .into_iter()
            .filter(|r| wants_reparse(selection, r, &config.parse))
            .filter_map(|r| stored_path(r, document_dir))
            .collect(),
        Selection::Explicit => Vec::new(),
    };
    Ok(paths)
}

fn wants_reparse(selection: Selection, record: &Value, parse: &ParseConfig) -> bool {
    match selection {
        Selection::Flagged => is_truthy(record.get(&parse.flag_field)),
        Selection::Old => {
            !is_truthy(record.get("parsed"))
                && !is_truthy(record.get("unparseable"))
                && !is_truthy(record.get("unparsed_data"))
        }
        _ => false,
    }
}

/// Source path of a stored record: its file name, else one rebuilt from the case id.
fn stored_path(record: &Value, document_dir: &Path) -> Option<PathBuf> {
    let filename = match record.get("filename").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => case_id_to_filename(record.get("case_id")?.as_str()?),
    };
    Some(document_dir.join(filename))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
