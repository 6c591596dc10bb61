//! Canonical contact record and its mutable annotations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Band, ContactId, GeoPoint, ModeCategory};

/// Location details that may be refined after a contact is first logged.
///
/// These are the only fields an upsert of an already-known id may change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactAnnotations {
    /// US state or Canadian province.
    pub state: Option<String>,
    /// ARRL/RAC section.
    pub section: Option<String>,
    /// Country name.
    pub country: Option<String>,
    /// Continent code.
    pub continent: Option<String>,
    /// Station location, when the logger has looked it up.
    pub location: Option<GeoPoint>,
}

impl ContactAnnotations {
    /// Overlays every present field of `incoming`. Absent fields never erase.
    ///
    /// Returns true when anything changed.
    pub fn merge_from(&mut self, incoming: &ContactAnnotations) -> bool {
        let mut changed = false;
        changed |= merge_field(&mut self.state, &incoming.state);
        changed |= merge_field(&mut self.section, &incoming.section);
        changed |= merge_field(&mut self.country, &incoming.country);
        changed |= merge_field(&mut self.continent, &incoming.continent);
        changed |= merge_field(&mut self.location, &incoming.location);
        changed
    }
}

fn merge_field<T: Clone + PartialEq>(slot: &mut Option<T>, incoming: &Option<T>) -> bool {
    match incoming {
        Some(v) if slot.as_ref() != Some(v) => {
            *slot = Some(v.clone());
            true
        }
        _ => false,
    }
}

/// One logged contact in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    /// Stable identity within the store.
    pub id: ContactId,
    /// Worked callsign, upper case.
    pub callsign: String,
    /// Band bucket.
    pub band: Band,
    /// Mode as logged (`SSB`, `CW`, `FT8`, ...).
    pub mode: String,
    /// Scoring category of `mode`.
    pub category: ModeCategory,
    /// Contact time, when the logger's date/time columns parsed.
    pub timestamp: Option<DateTime<Utc>>,
    /// Date and time text exactly as logged.
    pub logged_at: String,
    /// Operator who made the contact.
    pub operator: String,
    /// Operating position.
    pub station: String,
    /// Contact points.
    pub points: u32,
    /// Refinable location details.
    pub annotations: ContactAnnotations,
}

/// Immutable field names, used when reporting conflicting updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImmutableField {
    /// Worked callsign.
    Callsign,
    /// Contact time.
    Timestamp,
    /// Operating position.
    Station,
}

impl std::fmt::Display for ImmutableField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Callsign => "callsign",
            Self::Timestamp => "timestamp",
            Self::Station => "station",
        })
    }
}

impl ContactRecord {
    /// Returns the first immutable field on which `other` disagrees with `self`.
    pub fn immutable_conflict(&self, other: &ContactRecord) -> Option<ImmutableField> {
        if self.callsign != other.callsign {
            Some(ImmutableField::Callsign)
        } else if self.timestamp != other.timestamp {
            Some(ImmutableField::Timestamp)
        } else if self.station != other.station {
            Some(ImmutableField::Station)
        } else {
            None
        }
    }
}
