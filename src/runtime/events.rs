//! Runtime event stream payloads.

use serde::Serialize;

use crate::{engine::milestone::Milestone, types::ConnectionHealth};

/// Events emitted from the driver loop. Delivery is best-effort: a
/// subscriber that falls behind loses the oldest events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RuntimeEvent {
    /// A new snapshot is available.
    Published {
        /// Snapshot version.
        version: u64,
        /// Contact total in that snapshot.
        total_contacts: u64,
    },
    /// A milestone was crossed in the snapshot with this version.
    Milestone {
        /// Snapshot version.
        version: u64,
        /// What was reached.
        milestone: Milestone,
    },
    /// Upstream connection status changed.
    HealthChanged {
        /// Previous status.
        from: ConnectionHealth,
        /// New status.
        to: ConnectionHealth,
    },
    /// The contact store was cleared by an administrator.
    Reset {
        /// New reset generation.
        generation: u64,
    },
}
