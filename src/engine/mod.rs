//! Aggregation and scoring over the contact store.

/// Per-cycle statistics rebuilt from the store.
pub mod aggregate;
/// Milestone detection against the previous snapshot.
pub mod milestone;
/// Rate windows and hourly timeline.
pub mod rates;
/// Score breakdown from points, multipliers, and bonuses.
pub mod scoring;
