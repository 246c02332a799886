//! Per-transaction log buffer
//!
//! Records logged under a transaction's logger are buffered in order
//! and re-emitted through `tracing` with the transaction id attached,
//! so the control plane can ship a transaction's own diagnostic trail
//! back to the caller.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Severity of a buffered log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for RecordLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One buffered log record.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: RecordLevel,
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level, self.message)
    }
}

/// Ordered buffer of everything logged under one transaction.
#[derive(Debug)]
pub struct TransactionLog {
    transaction_id: Uuid,
    records: Mutex<Vec<LogRecord>>,
}

impl TransactionLog {
    pub fn new(transaction_id: Uuid) -> Self {
        Self {
            transaction_id,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(transaction_id = %self.transaction_id, "{}", message);
        self.push(RecordLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(transaction_id = %self.transaction_id, "{}", message);
        self.push(RecordLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(transaction_id = %self.transaction_id, "{}", message);
        self.push(RecordLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(transaction_id = %self.transaction_id, "{}", message);
        self.push(RecordLevel::Error, message);
    }

    fn push(&self, level: RecordLevel, message: String) {
        let mut records = self.records.lock().expect("transaction log poisoned");
        records.push(LogRecord {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    /// Copy of the buffered records, in logging order.
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .expect("transaction log poisoned")
            .clone()
    }

    /// Buffered records rendered as single lines, for shipping over
    /// the control plane.
    pub fn lines(&self) -> Vec<String> {
        self.snapshot().iter().map(|r| r.to_string()).collect()
    }
}
