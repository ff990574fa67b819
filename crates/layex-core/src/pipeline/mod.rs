//! Parallel parsing pipeline.
//!
//! The orchestrator fills a work queue with every document path, starts a
//! pool of parser threads and drains their records from a bounded result
//! queue into the store in batches. All store writes happen on the
//! orchestrator's thread. Shutdown is cooperative: once requested, workers
//! finish their current document and exit, and the orchestrator drains
//! whatever they produced before returning.

mod worker;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver};
use tracing::{debug, error, info, warn};

use crate::editor::SchemaEditor;
use crate::error::StoreError;
use crate::models::config::ParseConfig;
use crate::models::record::ParsedRecord;
use crate::parser::DocumentParser;
use crate::store::RecordStore;

use worker::Worker;

/// Cooperative cancellation flag shared by the orchestrator and its workers.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Upper bound on worker threads. Fewer than two runs in the foreground.
    pub workers: usize,
    /// Maximum records per store batch.
    pub batch_size: usize,
    /// Maximum time a store batch stays open. Zero writes whatever one
    /// receive produced.
    pub batch_interval: Duration,
    /// How long to wait for one result before checking on the workers.
    pub recv_timeout: Duration,
    /// Result queue capacity as a multiple of the worker count.
    pub result_queue_factor: usize,
    /// How long a worker blocks on a full result queue before logging and
    /// trying again.
    pub backpressure_poll: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&ParseConfig::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &ParseConfig) -> Self {
        Self {
            workers: config.effective_workers(),
            batch_size: config.batch_size.max(1),
            batch_interval: Duration::from_secs(config.batch_interval_secs),
            recv_timeout: Duration::from_millis(config.recv_timeout_ms),
            result_queue_factor: config.result_queue_factor.max(1),
            backpressure_poll: Duration::from_millis(config.backpressure_poll_ms.max(1)),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Result queue ceiling for a pool of `workers` threads.
    pub fn result_queue_capacity(&self, workers: usize) -> usize {
        (self.result_queue_factor * workers).max(1)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Shutdown was requested before every document was parsed.
    Interrupted,
    /// A worker thread died. Records already produced were still stored.
    WorkerFault(String),
    /// The store rejected a write. Later records were discarded.
    StoreFailed(String),
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            2
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Interrupted => write!(f, "interrupted"),
            RunStatus::WorkerFault(msg) => write!(f, "worker fault: {msg}"),
            RunStatus::StoreFailed(msg) => write!(f, "store failed: {msg}"),
        }
    }
}

/// Outcome of [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Documents handed to the run.
    pub documents: usize,
    /// Records written to the store.
    pub stored: usize,
    pub status: RunStatus,
    /// Highest observed result queue length.
    pub peak_result_queue: usize,
    pub elapsed: Duration,
}

/// Drives a [`DocumentParser`] over many documents.
pub struct Orchestrator {
    parser: DocumentParser,
    options: PipelineOptions,
    shutdown: Shutdown,
}

/// Store bookkeeping for one run.
struct Sink<'a> {
    store: &'a mut dyn RecordStore,
    stored: usize,
    received: usize,
    failure: Option<String>,
}

impl<'a> Sink<'a> {
    fn new(store: &'a mut dyn RecordStore) -> Self {
        Self {
            store,
            stored: 0,
            received: 0,
            failure: None,
        }
    }

    /// Write one batch. After a failure every later record is discarded.
    fn write(&mut self, batch: Vec<ParsedRecord>, shutdown: &Shutdown) {
        self.received += batch.len();
        if batch.is_empty() {
            return;
        }
        if self.failure.is_some() {
            debug!("Discarding {} records after store failure", batch.len());
            return;
        }

        match self.write_batch(&batch) {
            Ok(()) => {
                self.stored += batch.len();
                debug!("Stored batch of {} records", batch.len());
            }
            Err(e) => {
                error!("Failed to store batch of {} records: {}", batch.len(), e);
                if let Err(abort) = self.store.abort_batch() {
                    warn!("Failed to discard the open batch: {}", abort);
                }
                self.failure = Some(e.to_string());
                shutdown.request();
            }
        }
    }

    fn write_batch(&mut self, batch: &[ParsedRecord]) -> Result<(), StoreError> {
        self.store.begin_batch()?;
        for record in batch {
            self.store.upsert(record)?;
        }
        self.store.end_batch()
    }
}

impl Orchestrator {
    pub fn new(parser: DocumentParser, options: PipelineOptions) -> Self {
        Self {
            parser,
            options,
            shutdown: Shutdown::new(),
        }
    }

    /// Share an existing shutdown flag, e.g. one wired to Ctrl-C.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn parser(&self) -> &DocumentParser {
        &self.parser
    }

    pub fn into_parser(self) -> DocumentParser {
        self.parser
    }

    /// Parse every path and store the records, in parallel when worthwhile.
    pub fn run(&mut self, paths: Vec<PathBuf>, store: &mut dyn RecordStore) -> RunSummary {
        let workers = self.options.workers.min(paths.len());
        if workers < 2 {
            debug!("Running {} documents in the foreground", paths.len());
            self.run_foreground(paths, store, None)
        } else {
            self.run_workers(paths, workers, store)
        }
    }

    /// Parse in the foreground, asking `editor` about unplaced fragments.
    pub fn run_interactive(
        &mut self,
        paths: Vec<PathBuf>,
        store: &mut dyn RecordStore,
        editor: &mut dyn SchemaEditor,
    ) -> RunSummary {
        self.run_foreground(paths, store, Some(editor))
    }

    fn run_foreground(
        &mut self,
        paths: Vec<PathBuf>,
        store: &mut dyn RecordStore,
        mut editor: Option<&mut dyn SchemaEditor>,
    ) -> RunSummary {
        let started = Instant::now();
        let documents = paths.len();
        let mut sink = Sink::new(store);
        let mut batch = Vec::new();
        let mut batch_started = Instant::now();
        let mut fault: Option<String> = None;

        for path in paths {
            if self.shutdown.is_requested() {
                info!("Shutdown requested, stopping before {}", path.display());
                break;
            }
            let parser = &mut self.parser;
            let parsed = panic::catch_unwind(AssertUnwindSafe(|| match editor.as_deref_mut() {
                Some(editor) => parser.parse_interactive(&path, editor),
                None => parser.parse(&path),
            }));
            let record = match parsed {
                Ok(record) => record,
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    error!("Parser died on {}: {}", path.display(), msg);
                    fault = Some(format!("{}: {msg}", path.display()));
                    self.shutdown.request();
                    break;
                }
            };
            batch.push(record);

            if batch.len() >= self.options.batch_size
                || batch_started.elapsed() >= self.options.batch_interval
            {
                sink.write(std::mem::take(&mut batch), &self.shutdown);
                log_progress(&sink, documents, started);
                batch_started = Instant::now();
            }
        }
        sink.write(batch, &self.shutdown);

        let status = final_status(fault, &sink, &self.shutdown, documents);
        summarize(documents, &sink, status, 0, started)
    }

    fn run_workers(
        &mut self,
        paths: Vec<PathBuf>,
        workers: usize,
        store: &mut dyn RecordStore,
    ) -> RunSummary {
        let started = Instant::now();
        let documents = paths.len();
        let capacity = self.options.result_queue_capacity(workers);

        let (work_tx, work_rx) = unbounded();
        for path in paths {
            // The receiver is alive until the workers are started
            let _ = work_tx.send(path);
        }
        drop(work_tx);
        debug!("Added {} paths to work queue", documents);

        let (result_tx, result_rx) = bounded(capacity);
        let mut peak = 0;
        let mut fault: Option<String> = None;

        info!(
            "Starting {} workers for {} documents (result queue capacity {})",
            workers, documents, capacity
        );
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for i in 0..workers {
            let worker = Worker {
                parser: self.parser.clone(),
                work: work_rx.clone(),
                results: result_tx.clone(),
                shutdown: self.shutdown.clone(),
                backpressure_poll: self.options.backpressure_poll,
            };
            let spawned = thread::Builder::new()
                .name(format!("parse-worker-{i}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!("Failed to start worker {}: {}", i, e);
                    fault = Some(format!("failed to start worker: {e}"));
                    self.shutdown.request();
                    break;
                }
            }
        }
        drop(result_tx);

        let mut sink = Sink::new(store);
        while !handles.is_empty() {
            let batch = self.collect_batch(&result_rx, &mut peak);
            sink.write(batch, &self.shutdown);
            log_progress(&sink, documents, started);

            let mut running = Vec::with_capacity(handles.len());
            for handle in handles {
                if !handle.is_finished() {
                    running.push(handle);
                    continue;
                }
                let name = handle.thread().name().unwrap_or("worker").to_string();
                match handle.join() {
                    Ok(()) => debug!("{} exited", name),
                    Err(payload) => {
                        let msg = panic_message(payload.as_ref());
                        error!("{} died: {}", name, msg);
                        fault.get_or_insert_with(|| format!("{name}: {msg}"));
                        self.shutdown.request();
                    }
                }
            }
            handles = running;
            debug!("{} workers still running", handles.len());
        }

        // Records pushed between the last drain and the workers exiting
        peak = peak.max(result_rx.len());
        let remaining: Vec<ParsedRecord> = result_rx.try_iter().collect();
        if !remaining.is_empty() {
            debug!("Final drain collected {} records", remaining.len());
        }
        sink.write(remaining, &self.shutdown);

        let status = final_status(fault, &sink, &self.shutdown, documents);
        summarize(documents, &sink, status, peak, started)
    }

    /// Receive until the batch is full, the batch interval passes, or the
    /// queue stays empty for one receive timeout. There is always at least
    /// one receive. `peak` tracks the longest queue seen before a receive.
    fn collect_batch(
        &self,
        results: &Receiver<ParsedRecord>,
        peak: &mut usize,
    ) -> Vec<ParsedRecord> {
        let opened = Instant::now();
        let mut batch = Vec::new();
        loop {
            *peak = (*peak).max(results.len());
            match results.recv_timeout(self.options.recv_timeout) {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
            if batch.len() >= self.options.batch_size
                || opened.elapsed() >= self.options.batch_interval
            {
                break;
            }
        }
        batch
    }
}

fn final_status(
    fault: Option<String>,
    sink: &Sink<'_>,
    shutdown: &Shutdown,
    documents: usize,
) -> RunStatus {
    if let Some(msg) = fault {
        RunStatus::WorkerFault(msg)
    } else if let Some(msg) = &sink.failure {
        RunStatus::StoreFailed(msg.clone())
    } else if shutdown.is_requested() && sink.received < documents {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    }
}

fn summarize(
    documents: usize,
    sink: &Sink<'_>,
    status: RunStatus,
    peak_result_queue: usize,
    started: Instant,
) -> RunSummary {
    let summary = RunSummary {
        documents,
        stored: sink.stored,
        status,
        peak_result_queue,
        elapsed: started.elapsed(),
    };
    if summary.status.is_success() {
        info!(
            "Stored {} of {} records in {:.1}s",
            summary.stored,
            documents,
            summary.elapsed.as_secs_f64()
        );
    } else {
        warn!(
            "Run {} after storing {} of {} records",
            summary.status, summary.stored, documents
        );
    }
    summary
}

fn log_progress(sink: &Sink<'_>, documents: usize, started: Instant) {
    if sink.received == 0 {
        return;
    }
    let remaining = documents.saturating_sub(sink.received);
    let per_document = started.elapsed().as_secs_f64() / sink.received as f64;
    info!(
        "Stored {} records, {} remaining ({:.2}s per document, about {:.0}s left)",
        sink.stored,
        remaining,
        per_document,
        per_document * remaining as f64
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutSchema;
    use crate::provider::MemoryLayoutProvider;

    fn parser() -> DocumentParser {
        let schema = LayoutSchema::from_yaml_str(
            r#"
page_types:
  - name: report
    match: { contains: "Accident Report" }
    fields:
      date: { region: [0, 100, 0, 20], type: Date }
"#,
        )
        .unwrap();
        DocumentParser::new(schema, Arc::new(MemoryLayoutProvider::new()))
    }

    #[test]
    fn test_options_from_config() {
        let config = ParseConfig {
            workers: 4,
            result_queue_factor: 0,
            ..ParseConfig::default()
        };
        let options = PipelineOptions::from_config(&config);
        assert_eq!(options.workers, 4);
        assert_eq!(options.batch_size, 30);
        assert_eq!(options.batch_interval, Duration::from_secs(15));
        assert_eq!(options.result_queue_capacity(4), 4);

        let options = options.with_workers(3);
        assert_eq!(options.workers, 3);
    }

    #[test]
    fn test_status_exit_codes() {
        assert_eq!(RunStatus::Completed.exit_code(), 0);
        assert_eq!(RunStatus::Interrupted.exit_code(), 2);
        assert_eq!(RunStatus::WorkerFault("boom".to_string()).exit_code(), 2);
        assert_eq!(
            RunStatus::StoreFailed("disk full".to_string()).to_string(),
            "store failed: disk full"
        );
    }

    #[test]
    fn test_zero_interval_options() {
        let config = ParseConfig {
            batch_interval_secs: 0,
            backpressure_poll_ms: 0,
            ..ParseConfig::default()
        };
        let options = PipelineOptions::from_config(&config);
        assert_eq!(options.batch_interval, Duration::ZERO);
        assert_eq!(options.backpressure_poll, Duration::from_millis(1));
    }

    #[test]
    fn test_collect_batch_receives_with_zero_interval() {
        let options = PipelineOptions {
            batch_interval: Duration::ZERO,
            recv_timeout: Duration::from_millis(10),
            ..PipelineOptions::default()
        };
        let orchestrator = Orchestrator::new(parser(), options);
        let (tx, rx) = bounded(4);
        for i in 0..3 {
            tx.send(ParsedRecord::new(format!("AB-{i}"), format!("AB{i}.PDF")))
                .unwrap();
        }

        let mut peak = 0;
        let batch = orchestrator.collect_batch(&rx, &mut peak);
        assert_eq!(batch.len(), 1);
        assert_eq!(peak, 3);

        drop(tx);
        let batch = orchestrator.collect_batch(&rx, &mut peak);
        assert_eq!(batch.len(), 1);
        let batch = orchestrator.collect_batch(&rx, &mut peak);
        assert_eq!(batch.len(), 1);
        assert!(orchestrator.collect_batch(&rx, &mut peak).is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
