//! Append-only audit log of admission decisions.
//!
//! Records are queued on a bounded channel and flushed by an out-of-line
//! writer task, so storage latency or failure never blocks or fails the
//! admission path.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{GatekeeperError, Result};

/// Column header written when a new audit log is created.
const CSV_HEADER: &str = "timestamp_utc,client_id,path,status";

/// How many records may sit in the queue before appends are dropped.
const QUEUE_DEPTH: usize = 1024;

/// One audited admission decision.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// The client the decision applied to
    pub client_id: String,
    /// The requested path
    pub path: String,
    /// Outcome status code (200 admitted, 429 rejected)
    pub status: u16,
}

impl AuditRecord {
    /// Create a record stamped with the current UTC time.
    pub fn new(client_id: impl Into<String>, path: impl Into<String>, status: u16) -> Self {
        Self {
            timestamp: Utc::now(),
            client_id: client_id.into(),
            path: path.into(),
            status,
        }
    }

    /// Render the record as one CSV row.
    ///
    /// Fields containing a comma or quote are quoted so a row always
    /// parses back into four columns.
    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            csv_field(&self.client_id),
            csv_field(&self.path),
            self.status
        )
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Storage the audit writer appends rows to.
pub trait AuditStorage: Send + 'static {
    /// Append one row. A failure is reported but never retried.
    fn append_row(&mut self, row: &str) -> std::io::Result<()>;
}

/// CSV file storage with a fixed header row.
pub struct CsvFileStorage {
    file: File,
}

impl CsvFileStorage {
    /// Open the audit log at `path`, creating it with a header row if it
    /// does not exist. An existing file is appended to as-is.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let existed = path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if !existed {
            writeln!(file, "{}", CSV_HEADER)?;
        }
        info!(path = %path.display(), "Audit log opened");
        Ok(Self { file })
    }
}

impl AuditStorage for CsvFileStorage {
    fn append_row(&mut self, row: &str) -> std::io::Result<()> {
        writeln!(self.file, "{}", row)?;
        self.file.flush()
    }
}

/// Handle for appending audit records from request handlers.
///
/// Cloning shares the underlying queue.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditRecord>,
}

impl AuditSink {
    /// Start the audit writer over the given storage.
    ///
    /// Returns the sink handle and the writer task; the task drains the
    /// queue and exits once every sink clone has been dropped.
    pub fn spawn(storage: impl AuditStorage) -> (Self, JoinHandle<()>) {
        Self::spawn_with_depth(storage, QUEUE_DEPTH)
    }

    fn spawn_with_depth(mut storage: impl AuditStorage, depth: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(depth);
        let writer = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = storage.append_row(&record.to_csv_row()) {
                    warn!(
                        client_id = %record.client_id,
                        error = %e,
                        "Failed to persist audit record"
                    );
                }
            }
        });
        (Self { tx }, writer)
    }

    /// Queue a record for persistence.
    ///
    /// Never blocks: a full or closed queue drops the record and returns
    /// an error the caller should treat as a warning.
    pub fn append(&self, record: AuditRecord) -> Result<()> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                GatekeeperError::Audit("audit queue full, record dropped".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                GatekeeperError::Audit("audit writer stopped, record dropped".to_string())
            }
        })
    }

    #[cfg(test)]
    fn from_sender(tx: mpsc::Sender<AuditRecord>) -> Self {
        Self { tx }
    }
}
