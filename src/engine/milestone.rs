//! Milestone detection between consecutive snapshots.

use serde::{Deserialize, Serialize};

use crate::types::Band;

/// Default total-contact thresholds.
pub const DEFAULT_THRESHOLDS: [u64; 12] = [50, 100, 250, 500, 750, 1000, 1500, 2000, 2500, 3000, 4000, 5000];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Milestone {
    /// Total contact count reached `threshold`.
    TotalContacts { threshold: u64 },
    /// First contact logged on `band`.
    FirstContactOnBand { band: Band },
}

/// Counts a snapshot carries for comparison with the next one.
#[derive(Debug, Clone, Copy)]
pub struct MilestoneBaseline<'a> {
    pub total_contacts: u64,
    /// Sorted.
    pub bands_worked: &'a [Band],
}

/// Milestones crossed going from `previous` to `current`.
///
/// With no previous snapshot there is nothing to compare against, so the
/// first snapshot of a session (or after a reset) never reports any.
pub fn detect(
    previous: Option<MilestoneBaseline<'_>>,
    current: MilestoneBaseline<'_>,
    thresholds: &[u64],
) -> Vec<Milestone> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let mut out: Vec<Milestone> = thresholds
        .iter()
        .copied()
        .filter(|&t| previous.total_contacts < t && t <= current.total_contacts)
        .map(|threshold| Milestone::TotalContacts { threshold })
        .collect();

    out.extend(
        current
            .bands_worked
            .iter()
            .filter(|band| previous.bands_worked.binary_search(*band).is_err())
            .map(|&band| Milestone::FirstContactOnBand { band }),
    );
    out
}
