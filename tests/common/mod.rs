#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use fdscore::{
    contact::{ContactAnnotations, ContactRecord},
    types::{Band, ContactId, GeoPoint, ModeCategory},
};

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 28, h, m, 0).unwrap()
}

pub fn record(key: u64, call: &str, band: Band, mode: &str, ts: Option<DateTime<Utc>>) -> ContactRecord {
    let category = ModeCategory::from_mode(mode);
    ContactRecord {
        id: ContactId::Key(key),
        callsign: call.to_string(),
        band,
        mode: mode.to_string(),
        category,
        timestamp: ts,
        logged_at: ts.map(|t| t.format("%Y/%m/%d %H:%M").to_string()).unwrap_or_default(),
        operator: "K1OP".to_string(),
        station: "GOTA".to_string(),
        points: category.points(),
        annotations: ContactAnnotations::default(),
    }
}

pub fn located(mut r: ContactRecord, lat: f64, lon: f64) -> ContactRecord {
    r.annotations.location = GeoPoint::checked(lat, lon);
    r
}

/// `n` phone contacts on 20m, one minute apart, ending at `end`.
pub fn batch(start_key: u64, n: u64, end: DateTime<Utc>) -> Vec<ContactRecord> {
    (0..n)
        .map(|i| {
            let key = start_key + i;
            let ts = end - Duration::minutes((n - 1 - i) as i64);
            record(key, &format!("W{key}X"), Band::B20m, "SSB", Some(ts))
        })
        .collect()
}
