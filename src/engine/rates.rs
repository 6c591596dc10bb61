//! Moving-window rates and the hourly timeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{contact::ContactRecord, types::Band};

/// Short rate window, in minutes.
pub const SHORT_WINDOW_MINUTES: i64 = 20;
/// Long rate window, in minutes.
pub const LONG_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandRate {
    pub band: Band,
    /// Contacts per hour over the long window.
    pub rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    /// Start of the UTC hour.
    pub hour: DateTime<Utc>,
    pub contacts: u64,
    pub by_band: BTreeMap<Band, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RateStats {
    /// Per-hour equivalent of the last 20 minutes.
    pub rate_20min: u64,
    /// Contacts in the last 60 minutes.
    pub rate_60min: u64,
    /// Highest first.
    pub band_rates: Vec<BandRate>,
    /// Ascending by hour.
    pub hourly: Vec<HourBucket>,
    pub best_hour: Option<HourBucket>,
    pub active_hours: u64,
}

/// Accumulates rate figures in one pass over the store.
///
/// Records without a timestamp are skipped entirely.
pub(crate) struct RateAccumulator {
    now: DateTime<Utc>,
    short: u64,
    long: u64,
    long_by_band: BTreeMap<Band, u64>,
    hours: BTreeMap<DateTime<Utc>, HourBucket>,
}

impl RateAccumulator {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            short: 0,
            long: 0,
            long_by_band: BTreeMap::new(),
            hours: BTreeMap::new(),
        }
    }

    pub(crate) fn observe(&mut self, record: &ContactRecord) {
        let Some(ts) = record.timestamp else {
            return;
        };

        let age = self.now.signed_duration_since(ts);
        if within(age, SHORT_WINDOW_MINUTES) {
            self.short += 1;
        }
        if within(age, LONG_WINDOW_MINUTES) {
            self.long += 1;
            *self.long_by_band.entry(record.band).or_default() += 1;
        }

        let hour = ts.duration_trunc(TimeDelta::hours(1)).unwrap_or(ts);
        let bucket = self.hours.entry(hour).or_insert_with(|| HourBucket {
            hour,
            contacts: 0,
            by_band: BTreeMap::new(),
        });
        bucket.contacts += 1;
        *bucket.by_band.entry(record.band).or_default() += 1;
    }

    pub(crate) fn finish(self) -> RateStats {
        let mut band_rates: Vec<BandRate> = self
            .long_by_band
            .into_iter()
            .map(|(band, count)| BandRate {
                band,
                rate: per_hour(count, LONG_WINDOW_MINUTES),
            })
            .collect();
        band_rates.sort_by(|a, b| b.rate.cmp(&a.rate).then(a.band.cmp(&b.band)));

        let hourly: Vec<HourBucket> = self.hours.into_values().collect();
        // Earliest hour wins a tie.
        let best_hour = hourly
            .iter()
            .fold(None::<&HourBucket>, |best, h| match best {
                Some(b) if b.contacts >= h.contacts => Some(b),
                _ => Some(h),
            })
            .cloned();

        RateStats {
            rate_20min: per_hour(self.short, SHORT_WINDOW_MINUTES),
            rate_60min: per_hour(self.long, LONG_WINDOW_MINUTES),
            band_rates,
            active_hours: hourly.len() as u64,
            hourly,
            best_hour,
        }
    }
}

/// Contacts logged up to `minutes` ago (inclusive). Future-dated contacts count.
fn within(age: Duration, minutes: i64) -> bool {
    age <= Duration::minutes(minutes)
}

fn per_hour(count: u64, window_minutes: i64) -> u64 {
    count * 60 / window_minutes as u64
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        contact::ContactAnnotations,
        types::{ContactId, ModeCategory},
    };

    fn at(id: u64, ts: Option<DateTime<Utc>>, band: Band) -> ContactRecord {
        ContactRecord {
            id: ContactId::Key(id),
            callsign: format!("W{id}X"),
            band,
            mode: "SSB".to_string(),
            category: ModeCategory::Phone,
            timestamp: ts,
            logged_at: String::new(),
            operator: "OP".to_string(),
            station: "A".to_string(),
            points: 1,
            annotations: ContactAnnotations::default(),
        }
    }

    #[test]
    fn windows_and_extrapolation() {
        let now = Utc.with_ymd_and_hms(2025, 6, 28, 20, 0, 0).unwrap();
        let mut acc = RateAccumulator::new(now);
        acc.observe(&at(1, Some(now - Duration::minutes(5)), Band::B20m));
        acc.observe(&at(2, Some(now - Duration::minutes(19)), Band::B20m));
        acc.observe(&at(3, Some(now - Duration::minutes(45)), Band::B40m));
        acc.observe(&at(4, Some(now - Duration::minutes(61)), Band::B40m));
        acc.observe(&at(5, None, Band::B40m));
        let stats = acc.finish();

        assert_eq!(stats.rate_20min, 6);
        assert_eq!(stats.rate_60min, 3);
        assert_eq!(
            stats.band_rates,
            vec![
                BandRate { band: Band::B20m, rate: 2 },
                BandRate { band: Band::B40m, rate: 1 },
            ]
        );
        // 18:59, 19:15, 19:41, 19:55 span two hours; the untimed record is absent.
        assert_eq!(stats.active_hours, 2);
        assert_eq!(stats.hourly.iter().map(|h| h.contacts).sum::<u64>(), 4);
        let best = stats.best_hour.unwrap();
        assert_eq!(best.hour, Utc.with_ymd_and_hms(2025, 6, 28, 19, 0, 0).unwrap());
        assert_eq!(best.contacts, 3);
    }

    #[test]
    fn empty_input_yields_zero_rates() {
        let now = Utc.with_ymd_and_hms(2025, 6, 28, 20, 0, 0).unwrap();
        assert_eq!(RateAccumulator::new(now).finish(), RateStats::default());
    }
}
