//! Parser worker threads.

use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use tracing::{debug, info, warn};

use super::Shutdown;
use crate::models::record::ParsedRecord;
use crate::parser::DocumentParser;

pub(crate) struct Worker {
    pub(crate) parser: DocumentParser,
    pub(crate) work: Receiver<PathBuf>,
    pub(crate) results: Sender<ParsedRecord>,
    pub(crate) shutdown: Shutdown,
    pub(crate) backpressure_poll: Duration,
}

impl Worker {
    /// Parse documents until the work queue is empty or shutdown is requested.
    pub(crate) fn run(self) {
        while !self.shutdown.is_requested() {
            let Ok(path) = self.work.try_recv() else {
                info!("Work queue is empty, exiting");
                return;
            };

            debug!("Got {} from work queue", path.display());
            let record = self.parser.parse(&path);
            if !self.push(record) {
                return;
            }
        }
        info!("Shutdown requested, exiting");
    }

    /// Hand a record to the orchestrator, blocking while the queue is full.
    ///
    /// Keeps waiting after shutdown; the orchestrator drains until every
    /// worker has exited.
    fn push(&self, record: ParsedRecord) -> bool {
        let mut pending = record;
        loop {
            match self.results.send_timeout(pending, self.backpressure_poll) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(record)) => {
                    debug!(
                        "Result queue full for {:?}, still holding {}",
                        self.backpressure_poll, record.case_id
                    );
                    pending = record;
                }
                Err(SendTimeoutError::Disconnected(record)) => {
                    warn!("Result queue closed, dropping {}", record.case_id);
                    return false;
                }
            }
        }
    }
}
