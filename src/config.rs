//! Scoreboard configuration document.
//!
//! A JSON object; unknown keys are ignored and missing optional keys take
//! their defaults. Validation happens once, in [`RawConfig::validate`], and
//! produces the immutable [`Config`] the rest of the process reads.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    engine::{
        aggregate::AggregateSettings,
        milestone::DEFAULT_THRESHOLDS,
        scoring::{BonusCategory, NtsRules, ScoringRules, class_multiplier},
    },
    protocol::client::{ClientSettings, PullSettings},
    types::{Band, GeoPoint},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("required config key `{0}` is missing")]
    MissingField(&'static str),
    #[error("config key `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

/// The document as written, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub n3fjp_host: Option<String>,
    pub n3fjp_port: u16,
    pub seed_count: usize,
    pub tail_count: usize,
    pub refresh_seconds: u64,
    pub seed_total_timeout_secs: u64,
    pub seed_idle_timeout_ms: u64,
    pub poll_total_timeout_secs: u64,
    pub poll_idle_timeout_ms: u64,
    pub connect_timeout_secs: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_secs: u64,
    pub stale_after_secs: Option<u64>,

    pub web_host: String,
    pub web_port: u16,

    pub club_name: String,
    pub callsign: String,
    pub event_name: String,
    pub home_location: String,
    pub home_lat: Option<f64>,
    pub home_lon: Option<f64>,
    pub weather_enabled: bool,

    pub field_day_class: String,
    pub emergency_power: bool,
    pub media_publicity: bool,
    pub public_location: bool,
    pub public_information_table: bool,
    pub satellite_qso: bool,
    pub w1aw_bulletin: bool,
    pub educational_activity: bool,
    pub social_media: bool,
    pub youth_participation: bool,
    pub site_visit_official: bool,
    pub bonus_points_per_category: u64,
    pub nts_message_originated: u64,
    pub nts_message_handled: u64,
    pub nts_points_per_message: u64,
    pub nts_points_cap: u64,

    pub band_goals: BTreeMap<String, u64>,
    pub milestones: Vec<u64>,
}

impl Default for RawConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let nts = NtsRules::default();
        Self {
            n3fjp_host: None,
            n3fjp_port: client.port,
            seed_count: client.seed.count,
            tail_count: client.poll.count,
            refresh_seconds: 3,
            seed_total_timeout_secs: client.seed.total_timeout.as_secs(),
            seed_idle_timeout_ms: 1750,
            poll_total_timeout_secs: client.poll.total_timeout.as_secs(),
            poll_idle_timeout_ms: 750,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            backoff_initial_ms: 500,
            backoff_max_secs: client.backoff_max.as_secs(),
            stale_after_secs: None,
            web_host: "0.0.0.0".to_string(),
            web_port: 8080,
            club_name: "Amateur Radio Club".to_string(),
            callsign: "N0CALL".to_string(),
            event_name: "Field Day".to_string(),
            home_location: String::new(),
            home_lat: None,
            home_lon: None,
            weather_enabled: false,
            field_day_class: "1A".to_string(),
            emergency_power: false,
            media_publicity: false,
            public_location: false,
            public_information_table: false,
            satellite_qso: false,
            w1aw_bulletin: false,
            educational_activity: false,
            social_media: false,
            youth_participation: false,
            site_visit_official: false,
            bonus_points_per_category: 100,
            nts_message_originated: nts.originated,
            nts_message_handled: nts.handled,
            nts_points_per_message: nts.points_per_message,
            nts_points_cap: nts.points_cap,
            band_goals: BTreeMap::new(),
            milestones: DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSettings {
    pub host: String,
    pub port: u16,
}

/// Strings and toggles only the presentation layer uses.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub club_name: String,
    pub callsign: String,
    pub event_name: String,
    pub home_location: String,
    pub home: Option<GeoPoint>,
    pub weather_enabled: bool,
}

/// Validated, read-only session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: ClientSettings,
    pub refresh: Duration,
    pub stale_after: Duration,
    pub web: WebSettings,
    pub display: DisplaySettings,
    pub scoring: ScoringRules,
    pub aggregate: AggregateSettings,
}

/// The `/api/config` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationConfig {
    pub club_name: String,
    pub callsign: String,
    pub event_name: String,
    pub home_lat: f64,
    pub home_lon: f64,
    pub home_location: String,
    pub weather_enabled: bool,
    pub band_goals: BTreeMap<String, u64>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<RawConfig>(text)?.validate()
    }

    pub fn presentation(&self) -> PresentationConfig {
        let home = self.display.home.unwrap_or_default();
        PresentationConfig {
            club_name: self.display.club_name.clone(),
            callsign: self.display.callsign.clone(),
            event_name: self.display.event_name.clone(),
            home_lat: home.lat,
            home_lon: home.lon,
            home_location: self.display.home_location.clone(),
            weather_enabled: self.display.weather_enabled,
            band_goals: self
                .aggregate
                .band_goals
                .iter()
                .map(|(band, goal)| (band.label().to_string(), *goal))
                .collect(),
        }
    }
}

impl RawConfig {
    pub fn validate(self) -> Result<Config, ConfigError> {
        let host = self
            .n3fjp_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingField("n3fjp_host"))?
            .to_string();

        if self.n3fjp_port == 0 {
            return Err(invalid("n3fjp_port", "must be non-zero"));
        }
        if self.refresh_seconds == 0 {
            return Err(invalid("refresh_seconds", "must be at least 1"));
        }
        if self.seed_count == 0 {
            return Err(invalid("seed_count", "must be at least 1"));
        }
        if self.tail_count == 0 {
            return Err(invalid("tail_count", "must be at least 1"));
        }
        if self.backoff_initial_ms == 0 {
            return Err(invalid("backoff_initial_ms", "must be at least 1"));
        }

        let home = match (self.home_lat, self.home_lon) {
            (None, None) => None,
            (Some(lat), Some(lon)) => Some(
                GeoPoint::checked(lat, lon)
                    .ok_or_else(|| invalid("home_lat", format!("({lat}, {lon}) is not a coordinate")))?,
            ),
            (Some(_), None) => return Err(ConfigError::MissingField("home_lon")),
            (None, Some(_)) => return Err(ConfigError::MissingField("home_lat")),
        };

        let mut band_goals = BTreeMap::new();
        for (label, goal) in &self.band_goals {
            let band: Band = label
                .parse()
                .map_err(|_| invalid("band_goals", format!("unknown band `{label}`")))?;
            if *goal > 0 {
                band_goals.insert(band, *goal);
            }
        }

        let mut milestones = self.milestones.clone();
        milestones.retain(|t| *t > 0);
        milestones.sort_unstable();
        milestones.dedup();

        if class_multiplier(&self.field_day_class).is_none() {
            warn!(
                class = %self.field_day_class,
                "unrecognized field day class, scoring with multiplier 1"
            );
        }

        let refresh = Duration::from_secs(self.refresh_seconds);
        let stale_after = Duration::from_secs(
            self.stale_after_secs
                .unwrap_or(self.refresh_seconds.saturating_mul(3)),
        );

        let source = ClientSettings {
            host,
            port: self.n3fjp_port,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            seed: PullSettings {
                count: self.seed_count,
                total_timeout: Duration::from_secs(self.seed_total_timeout_secs.max(1)),
                idle_timeout: Duration::from_millis(self.seed_idle_timeout_ms.max(1)),
            },
            poll: PullSettings {
                count: self.tail_count,
                total_timeout: Duration::from_secs(self.poll_total_timeout_secs.max(1)),
                idle_timeout: Duration::from_millis(self.poll_idle_timeout_ms.max(1)),
            },
            backoff_initial: Duration::from_millis(self.backoff_initial_ms),
            backoff_max: Duration::from_secs(self.backoff_max_secs),
        };

        let scoring = ScoringRules {
            earned: self.earned_bonuses(),
            class: self.field_day_class.trim().to_ascii_uppercase(),
            emergency_power: self.emergency_power,
            points_per_bonus: self.bonus_points_per_category,
            nts: NtsRules {
                originated: self.nts_message_originated,
                handled: self.nts_message_handled,
                points_per_message: self.nts_points_per_message,
                points_cap: self.nts_points_cap,
            },
        };

        Ok(Config {
            source,
            refresh,
            stale_after,
            web: WebSettings {
                host: self.web_host,
                port: self.web_port,
            },
            display: DisplaySettings {
                club_name: self.club_name,
                callsign: self.callsign,
                event_name: self.event_name,
                home_location: self.home_location,
                home,
                weather_enabled: self.weather_enabled,
            },
            scoring,
            aggregate: AggregateSettings {
                band_goals,
                milestones,
                home,
            },
        })
    }

    fn earned_bonuses(&self) -> std::collections::BTreeSet<BonusCategory> {
        [
            (self.emergency_power, BonusCategory::EmergencyPower),
            (self.media_publicity, BonusCategory::MediaPublicity),
            (self.public_location, BonusCategory::PublicLocation),
            (self.public_information_table, BonusCategory::PublicInformationTable),
            (self.satellite_qso, BonusCategory::SatelliteQso),
            (self.w1aw_bulletin, BonusCategory::W1awBulletin),
            (self.educational_activity, BonusCategory::EducationalActivity),
            (self.social_media, BonusCategory::SocialMedia),
            (self.youth_participation, BonusCategory::YouthParticipation),
            (self.site_visit_official, BonusCategory::SiteVisitOfficial),
        ]
        .into_iter()
        .filter_map(|(on, category)| on.then_some(category))
        .collect()
    }
}
