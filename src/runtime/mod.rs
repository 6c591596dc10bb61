//! Single-writer driver loop, snapshot publication, and event stream.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle and driver loop implementation.
pub mod handle;
/// Watch-based snapshot publication.
pub mod publisher;
