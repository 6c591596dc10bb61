//! Upstream logging-program client.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{contact::ContactRecord, types::ConnectionHealth};

/// Reconnect delay schedule.
pub mod backoff;
/// TCP client that polls a dialect.
pub mod client;
/// Command/parse seam for upstream programs.
pub mod dialect;
/// N3FJP dialect.
pub mod n3fjp;
/// `<TAG>value</TAG>` scanner.
pub mod parser;
/// Date/time column parsing.
pub mod timestamp;

/// Transient upstream failures. None of these are fatal to the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connect to {addr} timed out")]
    ConnectTimeout { addr: String },
    #[error("backing off for {remaining:?} before reconnecting")]
    BackingOff { remaining: Duration },
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("upstream closed the connection mid-response")]
    Disconnected,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Health implied by a failed pull.
    pub fn health(&self) -> ConnectionHealth {
        match self {
            Self::Timeout(_) => ConnectionHealth::Degraded,
            _ => ConnectionHealth::Reconnecting,
        }
    }
}

/// Why a single record was discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("field {field} has unusable value `{value}`")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PullKind {
    /// Full-log pull after connect or reset.
    Seed,
    /// Tail pull on a regular tick.
    Poll,
}

/// Result of one successful exchange.
#[derive(Debug, Clone)]
pub struct Pull {
    pub kind: PullKind,
    pub records: Vec<ContactRecord>,
    pub malformed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullDiagnostics {
    pub requested: usize,
    pub records_parsed: usize,
    pub malformed: usize,
    pub raw_bytes: usize,
    /// Whether the response ended on the dialect's terminator rather than a timeout.
    pub terminated: bool,
    pub sample_fields: Vec<String>,
    pub at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub host: String,
    pub port: u16,
    pub connected: bool,
    pub connects: u64,
    pub disconnects: u64,
    pub last_error: Option<String>,
    pub seed: Option<PullDiagnostics>,
    pub poll: Option<PullDiagnostics>,
}

/// Where the driver loop gets contacts from.
pub trait ContactSource: Send + 'static {
    /// One request/response exchange, bounded by the source's own timeouts.
    fn pull(&mut self, now: DateTime<Utc>) -> impl Future<Output = Result<Pull, ProtocolError>> + Send;

    /// Makes the next pull a full seed.
    fn request_seed(&mut self);

    fn diagnostics(&self) -> Diagnostics;

    /// Drops any upstream connection.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
