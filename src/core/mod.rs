//! In-memory contact store and index helpers.

/// Helper index types.
pub mod indices;
/// Idempotent contact store.
pub mod store;
