//! Derived statistics over the whole contact store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    contact::ContactRecord,
    core::store::ContactStore,
    types::{Band, ContactId, GeoPoint},
};

use super::{
    milestone::{self, Milestone, MilestoneBaseline},
    rates::{RateAccumulator, RateStats},
};

/// Recent contacts kept per station.
pub const STATION_RECENT_LEN: usize = 5;

/// Configuration the aggregator reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSettings {
    /// Per-band target contact counts. Zero goals are never stored.
    pub band_goals: BTreeMap<Band, u64>,
    /// Ascending total-contact thresholds.
    pub milestones: Vec<u64>,
    /// Origin for map distances.
    pub home: Option<GeoPoint>,
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            band_goals: BTreeMap::new(),
            milestones: milestone::DEFAULT_THRESHOLDS.to_vec(),
            home: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountRow {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub count: u64,
    /// Sorted.
    pub list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandGoal {
    pub band: Band,
    pub goal: u64,
    pub contacts: u64,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    pub id: ContactId,
    pub callsign: String,
    pub band: Band,
    pub mode: String,
    pub location: GeoPoint,
    /// Great-circle distance from home, when home is configured.
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentContact {
    pub id: ContactId,
    pub callsign: String,
    pub operator: String,
    pub band: Band,
    pub mode: String,
    pub logged_at: String,
}

/// One operating position, as of its most recent contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationState {
    pub station: String,
    pub operator: String,
    pub band: Band,
    pub mode: String,
    pub contacts: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub logged_at: String,
    /// Newest first, at most [`STATION_RECENT_LEN`].
    pub recent: Vec<RecentContact>,
}

/// Everything derived from the store in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub total_contacts: u64,
    pub total_points: u64,
    /// Contacts whose time could not be parsed. Counted in totals only.
    pub undated_contacts: u64,
    pub contacts_by_operator: Vec<CountRow>,
    pub points_by_operator: Vec<CountRow>,
    pub contacts_by_band: Vec<CountRow>,
    pub points_by_band: Vec<CountRow>,
    pub contacts_by_mode: Vec<CountRow>,
    pub points_by_mode: Vec<CountRow>,
    pub contacts_by_station: Vec<CountRow>,
    pub contacts_by_continent: Vec<CountRow>,
    pub contacts_by_state: Vec<CountRow>,
    pub contacts_by_country: Vec<CountRow>,
    pub sections: SectionSummary,
    /// Sorted.
    pub bands_worked: Vec<Band>,
    pub band_goals: Vec<BandGoal>,
    pub rates: RateStats,
    /// Crossed since the previous snapshot.
    pub milestones: Vec<Milestone>,
    pub map_points: Vec<MapPoint>,
    /// Sorted by station name.
    pub stations: Vec<StationState>,
}

impl AggregateSnapshot {
    fn baseline(&self) -> MilestoneBaseline<'_> {
        MilestoneBaseline {
            total_contacts: self.total_contacts,
            bands_worked: &self.bands_worked,
        }
    }

    pub fn band_contacts(&self, band: Band) -> u64 {
        self.contacts_by_band
            .iter()
            .find(|row| row.key == band.label())
            .map_or(0, |row| row.count)
    }
}

#[derive(Default)]
struct Tally(HashMap<String, u64>);

impl Tally {
    fn add(&mut self, key: &str, n: u64) {
        *self.0.entry_ref(key).or_insert(0) += n;
    }

    /// Count descending, then key ascending.
    fn into_rows(self) -> Vec<CountRow> {
        let mut rows: Vec<CountRow> = self
            .0
            .into_iter()
            .map(|(key, count)| CountRow { key, count })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        rows
    }
}

#[derive(Default)]
struct Tallies {
    contacts_by_operator: Tally,
    points_by_operator: Tally,
    contacts_by_band: Tally,
    points_by_band: Tally,
    contacts_by_mode: Tally,
    points_by_mode: Tally,
    contacts_by_station: Tally,
    contacts_by_continent: Tally,
    contacts_by_state: Tally,
    contacts_by_country: Tally,
}

impl Tallies {
    fn observe(&mut self, r: &ContactRecord) {
        let pts = u64::from(r.points);
        self.contacts_by_operator.add(&r.operator, 1);
        self.points_by_operator.add(&r.operator, pts);
        self.contacts_by_band.add(r.band.label(), 1);
        self.points_by_band.add(r.band.label(), pts);
        self.contacts_by_mode.add(&r.mode, 1);
        self.points_by_mode.add(&r.mode, pts);
        self.contacts_by_station.add(&r.station, 1);

        let a = &r.annotations;
        if let Some(v) = a.continent.as_deref() {
            self.contacts_by_continent.add(v, 1);
        }
        if let Some(v) = a.state.as_deref() {
            self.contacts_by_state.add(v, 1);
        }
        if let Some(v) = a.country.as_deref() {
            self.contacts_by_country.add(v, 1);
        }
    }
}

fn observe_station(stations: &mut HashMap<String, StationState>, r: &ContactRecord) {
    let entry = stations
        .entry_ref(r.station.as_str())
        .or_insert_with(|| StationState {
            station: r.station.clone(),
            operator: String::new(),
            band: r.band,
            mode: String::new(),
            contacts: 0,
            last_update: None,
            logged_at: String::new(),
            recent: Vec::with_capacity(STATION_RECENT_LEN),
        });

    // Whoever logged most recently is the current operator.
    entry.operator.clone_from(&r.operator);
    entry.band = r.band;
    entry.mode.clone_from(&r.mode);
    entry.contacts += 1;
    entry.last_update = r.timestamp.or(entry.last_update);
    entry.logged_at.clone_from(&r.logged_at);

    entry.recent.insert(
        0,
        RecentContact {
            id: r.id.clone(),
            callsign: r.callsign.clone(),
            operator: r.operator.clone(),
            band: r.band,
            mode: r.mode.clone(),
            logged_at: r.logged_at.clone(),
        },
    );
    entry.recent.truncate(STATION_RECENT_LEN);
}

/// Builds a fresh snapshot from the store.
///
/// Pure apart from `now`, which only moves the rate windows. Milestones are
/// found by comparing against `previous`, which the caller owns.
pub fn recompute(
    store: &ContactStore,
    settings: &AggregateSettings,
    previous: Option<&AggregateSnapshot>,
    now: DateTime<Utc>,
) -> AggregateSnapshot {
    let mut total_contacts = 0u64;
    let mut total_points = 0u64;
    let mut undated_contacts = 0u64;
    let mut tallies = Tallies::default();
    let mut sections = BTreeSet::new();
    let mut bands = BTreeSet::new();
    let mut band_counts: BTreeMap<Band, u64> = BTreeMap::new();
    let mut rates = RateAccumulator::new(now);
    let mut stations: HashMap<String, StationState> = HashMap::new();
    let mut map_points = Vec::new();

    for r in store.all() {
        total_contacts += 1;
        total_points += u64::from(r.points);
        if r.timestamp.is_none() {
            undated_contacts += 1;
        }

        tallies.observe(r);
        bands.insert(r.band);
        *band_counts.entry(r.band).or_default() += 1;
        if let Some(section) = r.annotations.section.as_deref() {
            sections.insert(section.to_string());
        }

        rates.observe(r);
        observe_station(&mut stations, r);

        if let Some(location) = r.annotations.location {
            map_points.push(MapPoint {
                id: r.id.clone(),
                callsign: r.callsign.clone(),
                band: r.band,
                mode: r.mode.clone(),
                location,
                distance_km: settings.home.map(|h| h.distance_km(&location)),
            });
        }
    }

    let band_goals = settings
        .band_goals
        .iter()
        .filter(|(_, goal)| **goal > 0)
        .map(|(&band, &goal)| {
            let contacts = band_counts.get(&band).copied().unwrap_or(0);
            BandGoal {
                band,
                goal,
                contacts,
                met: contacts >= goal,
            }
        })
        .collect();

    let mut stations: Vec<StationState> = stations.into_values().collect();
    stations.sort_by(|a, b| a.station.cmp(&b.station));

    let mut snapshot = AggregateSnapshot {
        total_contacts,
        total_points,
        undated_contacts,
        contacts_by_operator: tallies.contacts_by_operator.into_rows(),
        points_by_operator: tallies.points_by_operator.into_rows(),
        contacts_by_band: tallies.contacts_by_band.into_rows(),
        points_by_band: tallies.points_by_band.into_rows(),
        contacts_by_mode: tallies.contacts_by_mode.into_rows(),
        points_by_mode: tallies.points_by_mode.into_rows(),
        contacts_by_station: tallies.contacts_by_station.into_rows(),
        contacts_by_continent: tallies.contacts_by_continent.into_rows(),
        contacts_by_state: tallies.contacts_by_state.into_rows(),
        contacts_by_country: tallies.contacts_by_country.into_rows(),
        sections: SectionSummary {
            count: sections.len() as u64,
            list: sections.into_iter().collect(),
        },
        bands_worked: bands.into_iter().collect(),
        band_goals,
        rates: rates.finish(),
        milestones: Vec::new(),
        map_points,
        stations,
    };

    snapshot.milestones = milestone::detect(
        previous.map(AggregateSnapshot::baseline),
        snapshot.baseline(),
        &settings.milestones,
    );
    snapshot
}
