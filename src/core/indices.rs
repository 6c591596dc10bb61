use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::ContactId;

/// Position of a record in time order: contact time, then arrival sequence.
///
/// Untimed records sort ahead of every timed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderKey {
    pub timestamp: Option<DateTime<Utc>>,
    pub seq: u64,
}

pub type OrderIndex = BTreeMap<OrderKey, ContactId>;
