//! Live Field Day scoreboard fed by a contest logger's TCP interface.
//!
//! A single driver loop polls the logger, upserts contacts into an
//! in-memory store, rebuilds statistics, scores them, and publishes one
//! immutable snapshot per cycle for any number of readers.
//!
//! # Examples
//!
//! Decoding a logger response and scoring it without the runtime:
//! ```
//! use chrono::Utc;
//! use fdscore::{
//!     core::store::ContactStore,
//!     engine::{aggregate::{AggregateSettings, recompute}, scoring::{self, ScoringRules}},
//!     protocol::{dialect::Dialect, n3fjp::N3fjp},
//! };
//!
//! let response = "<CMD><LISTRESPONSE><FLDPRIMARYKEY>1</FLDPRIMARYKEY><CALL>W1AW</CALL>\
//!                 <BAND>20</BAND><MODE>CW</MODE></LISTRESPONSE></CMD>";
//! let decoded = N3fjp::default().decode(response, Utc::now());
//!
//! let mut store = ContactStore::new();
//! for record in decoded.records {
//!     store.upsert(record).expect("no conflicts");
//! }
//! let aggregate = recompute(&store, &AggregateSettings::default(), None, Utc::now());
//! let score = scoring::compute(aggregate.total_points, &ScoringRules::default());
//! assert_eq!(score.final_score, 2);
//! ```
//!
//! Running the full loop against the configured logger:
//! ```no_run
//! use fdscore::{config::Config, runtime::handle::spawn_from_config};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = Config::load("config.json").expect("config");
//! let handle = spawn_from_config(&config, CancellationToken::new());
//! let snapshot = handle.latest();
//! println!("{} contacts", snapshot.aggregate.total_contacts);
//! handle.shutdown(std::time::Duration::from_secs(5)).await.expect("shutdown");
//! # }
//! ```

/// Configuration document and validation.
pub mod config;
/// Canonical contact records.
pub mod contact;
/// Contact store and index helpers.
pub mod core;
/// Aggregation, milestones, rates, and scoring.
pub mod engine;
/// Logger TCP client and wire dialects.
pub mod protocol;
/// Single-writer runtime, publisher, and events.
pub mod runtime;
/// HTTP surface.
pub mod server;
/// Shared primitive types and enums.
pub mod types;
