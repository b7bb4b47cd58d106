use std::fmt;

use chrono::{DateTime, Utc};
use harvest_core::{HarvestWarning, PageFailure, QueryError, QuerySignature, WinRecord};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection, DNS or body read failure.
    Transport,
    /// The per-request timeout elapsed. A transport failure.
    Timeout,
    HttpStatus(u16),
    /// Body was not JSON or lacked the record list / total fields.
    MalformedResponse,
}

impl FailureKind {
    pub fn is_transport(&self) -> bool {
        matches!(self, FailureKind::Transport | FailureKind::Timeout)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

/// A single failed page request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("offset {offset}: {kind}: {message}")]
pub struct PageError {
    pub kind: FailureKind,
    pub offset: u64,
    pub message: String,
}

impl PageError {
    pub(crate) fn new(kind: FailureKind, offset: u64, message: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarvestError {
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
    #[error(
        "offset {offset} failed after {attempts} attempts ({pages_succeeded} pages already fetched): {last}"
    )]
    ExhaustedRetries {
        offset: u64,
        attempts: u32,
        pages_succeeded: usize,
        last: PageError,
    },
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("harvest interrupted: {0}")]
    Interrupted(String),
}

impl HarvestError {
    /// The offset that ended the harvest, for retry exhaustion.
    pub fn offset(&self) -> Option<u64> {
        match self {
            HarvestError::ExhaustedRetries { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// A finished, deduplicated harvest. Shared read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarvestResult {
    pub signature: QuerySignature,
    pub records: Vec<WinRecord>,
    pub fetched_at: DateTime<Utc>,
    /// Total reported by the first page.
    pub total_reported: i64,
    pub pages_fetched: usize,
    pub duplicates_removed: usize,
    /// Offsets abandoned in best-effort mode. Always empty otherwise.
    pub failed_offsets: Vec<PageFailure>,
    pub warnings: Vec<HarvestWarning>,
}

impl HarvestResult {
    pub fn is_complete(&self) -> bool {
        self.failed_offsets.is_empty()
    }
}
