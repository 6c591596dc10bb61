//! Shared primitive IDs and contest-related enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Stable identity of a logged contact.
///
/// The upstream logger assigns a numeric primary key to every row; records
/// that arrive without one fall back to a composite key built from the
/// fields that never change once a contact is logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContactId {
    /// Source-assigned primary key.
    Key(u64),
    /// `CALL|DATE|TIME|BAND|MODE|STATION` composite.
    Composite(String),
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "#{k}"),
            Self::Composite(c) => f.write_str(c),
        }
    }
}

/// Amateur band bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    /// 160 meters.
    #[serde(rename = "160m")]
    B160m,
    /// 80 meters.
    #[serde(rename = "80m")]
    B80m,
    /// 60 meters.
    #[serde(rename = "60m")]
    B60m,
    /// 40 meters.
    #[serde(rename = "40m")]
    B40m,
    /// 30 meters.
    #[serde(rename = "30m")]
    B30m,
    /// 20 meters.
    #[serde(rename = "20m")]
    B20m,
    /// 17 meters.
    #[serde(rename = "17m")]
    B17m,
    /// 15 meters.
    #[serde(rename = "15m")]
    B15m,
    /// 12 meters.
    #[serde(rename = "12m")]
    B12m,
    /// 10 meters.
    #[serde(rename = "10m")]
    B10m,
    /// 6 meters.
    #[serde(rename = "6m")]
    B6m,
    /// 2 meters.
    #[serde(rename = "2m")]
    B2m,
    /// 1.25 meters.
    #[serde(rename = "1.25m")]
    B125cm,
    /// 70 centimeters.
    #[serde(rename = "70cm")]
    B70cm,
    /// Satellite contacts, logged as their own band.
    #[serde(rename = "sat")]
    Satellite,
    /// Anything the logger reports that is not a known band.
    #[serde(rename = "other")]
    Other,
}

impl Band {
    /// Display label, matching the serialized form.
    pub fn label(self) -> &'static str {
        match self {
            Self::B160m => "160m",
            Self::B80m => "80m",
            Self::B60m => "60m",
            Self::B40m => "40m",
            Self::B30m => "30m",
            Self::B20m => "20m",
            Self::B17m => "17m",
            Self::B15m => "15m",
            Self::B12m => "12m",
            Self::B10m => "10m",
            Self::B6m => "6m",
            Self::B2m => "2m",
            Self::B125cm => "1.25m",
            Self::B70cm => "70cm",
            Self::Satellite => "sat",
            Self::Other => "other",
        }
    }

    /// Lenient parse of logger band text: `20`, `20M`, `20m`, `70CM`, `440`, `SAT`.
    ///
    /// Unrecognized non-empty text maps to [`Band::Other`]; empty text is `None`.
    pub fn parse_lenient(text: &str) -> Option<Self> {
        let t = text.trim().to_ascii_uppercase();
        if t.is_empty() {
            return None;
        }
        let digits = t.strip_suffix('M').unwrap_or(&t);
        let band = match digits {
            "160" => Self::B160m,
            "80" | "75" => Self::B80m,
            "60" => Self::B60m,
            "40" => Self::B40m,
            "30" => Self::B30m,
            "20" => Self::B20m,
            "17" => Self::B17m,
            "15" => Self::B15m,
            "12" => Self::B12m,
            "10" => Self::B10m,
            "6" => Self::B6m,
            "2" => Self::B2m,
            "1.25" | "222" => Self::B125cm,
            "70C" | "440" | "432" => Self::B70cm,
            "SAT" | "SATELLITE" => Self::Satellite,
            _ => Self::Other,
        };
        Some(band)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Band {
    type Err = String;

    /// Strict parse used for configuration keys: `Other` is not accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parse_lenient(s) {
            Some(Self::Other) | None => Err(format!("unknown band `{s}`")),
            Some(band) => Ok(band),
        }
    }
}

/// Scoring bucket for an emission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeCategory {
    /// Continuous Wave.
    Cw,
    /// Voice modes.
    Phone,
    /// Any digital mode.
    Digital,
    /// Unclassified.
    Other,
}

impl ModeCategory {
    /// Classifies the logger's `MODETEST` column (`PH`, `CW`, `DIG`).
    pub fn from_mode_test(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "PH" => Some(Self::Phone),
            "CW" => Some(Self::Cw),
            "DIG" => Some(Self::Digital),
            "" => None,
            _ => Some(Self::Other),
        }
    }

    /// Classifies a free-form mode name.
    pub fn from_mode(text: &str) -> Self {
        match text.trim().to_ascii_uppercase().as_str() {
            "CW" => Self::Cw,
            "SSB" | "USB" | "LSB" | "FM" | "AM" | "PH" | "PHONE" | "DV" => Self::Phone,
            "FT8" | "FT4" | "RTTY" | "PSK" | "PSK31" | "PSK63" | "JS8" | "DIG" | "DATA"
            | "OLIVIA" | "MFSK" | "JT65" | "JT9" | "Q65" | "MSK144" | "PKT" | "VARA" => {
                Self::Digital
            }
            _ => Self::Other,
        }
    }

    /// Contact points earned in this category.
    pub fn points(self) -> u32 {
        match self {
            Self::Phone => 1,
            Self::Cw | Self::Digital => 2,
            Self::Other => 0,
        }
    }
}

/// Upstream connection status surfaced to display clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionHealth {
    /// Last pull succeeded.
    Connected,
    /// No live connection; connecting or waiting out a backoff.
    #[default]
    Reconnecting,
    /// Connection is up but the last pull did not complete.
    Degraded,
}

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoPoint {
    /// Latitude, -90..=90.
    pub lat: f64,
    /// Longitude, -180..=180.
    pub lon: f64,
}

impl GeoPoint {
    /// Returns the point when both coordinates are in range.
    pub fn checked(lat: f64, lon: f64) -> Option<Self> {
        let ok = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        ok.then_some(Self { lat, lon })
    }

    /// Great-circle distance in kilometers.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}
