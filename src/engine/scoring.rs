//! Field Day score from QSO points, multipliers, and bonus categories.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A fixed-point award for completing a qualifying activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BonusCategory {
    EmergencyPower,
    MediaPublicity,
    PublicLocation,
    PublicInformationTable,
    NtsMessages,
    SatelliteQso,
    W1awBulletin,
    EducationalActivity,
    SocialMedia,
    YouthParticipation,
    SiteVisitOfficial,
}

impl BonusCategory {
    /// Every category in display order.
    pub const ALL: [BonusCategory; 11] = [
        Self::EmergencyPower,
        Self::MediaPublicity,
        Self::PublicLocation,
        Self::PublicInformationTable,
        Self::NtsMessages,
        Self::SatelliteQso,
        Self::W1awBulletin,
        Self::EducationalActivity,
        Self::SocialMedia,
        Self::YouthParticipation,
        Self::SiteVisitOfficial,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::EmergencyPower => "100% Emergency Power",
            Self::MediaPublicity => "Media Publicity",
            Self::PublicLocation => "Public Location",
            Self::PublicInformationTable => "Public Information Table",
            Self::NtsMessages => "NTS Messages",
            Self::SatelliteQso => "Satellite QSO",
            Self::W1awBulletin => "W1AW Bulletin Copy",
            Self::EducationalActivity => "Educational Activity",
            Self::SocialMedia => "Social Media",
            Self::YouthParticipation => "Youth Participation",
            Self::SiteVisitOfficial => "Site Visit by Official",
        }
    }
}

/// NTS message traffic. Not gated by a flag; originated and handled messages
/// each earn points up to their own cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NtsRules {
    pub originated: u64,
    pub handled: u64,
    pub points_per_message: u64,
    pub points_cap: u64,
}

impl NtsRules {
    pub fn message_count(&self) -> u64 {
        self.originated.saturating_add(self.handled)
    }

    pub fn points(&self) -> u64 {
        let capped = |count: u64| count.saturating_mul(self.points_per_message).min(self.points_cap);
        capped(self.originated).saturating_add(capped(self.handled))
    }
}

impl Default for NtsRules {
    fn default() -> Self {
        Self {
            originated: 0,
            handled: 0,
            points_per_message: 10,
            points_cap: 100,
        }
    }
}

/// Validated scoring inputs taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRules {
    /// Entry class, e.g. `2A`.
    pub class: String,
    /// Operating on 100% emergency power.
    pub emergency_power: bool,
    /// Flag-gated categories the club has earned. `NtsMessages` is ignored here.
    pub earned: BTreeSet<BonusCategory>,
    /// Award for each earned flag-gated category.
    pub points_per_bonus: u64,
    pub nts: NtsRules,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            class: "1A".to_string(),
            emergency_power: false,
            earned: BTreeSet::new(),
            points_per_bonus: 100,
            nts: NtsRules::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusItem {
    pub category: BonusCategory,
    pub name: String,
    pub points: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub qso_points: u64,
    pub class: String,
    pub class_multiplier: u64,
    pub power_multiplier: u64,
    /// One entry per category, zero when not earned.
    pub bonuses: Vec<BonusItem>,
    pub bonus_points: u64,
    pub final_score: u64,
}

/// Class multiplier: the transmitter count leading a Field Day class
/// (`1A`, `2O`, `12F`). `None` for strings that are not a class.
pub fn class_multiplier(class: &str) -> Option<u64> {
    let class = class.trim().to_ascii_uppercase();
    let split = class.find(|c: char| !c.is_ascii_digit())?;
    let (count, category) = class.split_at(split);
    let valid_category = matches!(category, "A" | "AB" | "B" | "C" | "D" | "E" | "F" | "O" | "I" | "H");
    let count: u64 = count.parse().ok()?;
    (valid_category && count > 0).then_some(count)
}

pub fn power_multiplier(emergency_power: bool) -> u64 {
    if emergency_power { 2 } else { 1 }
}

/// `qso_points × class × power + bonuses`, exact in integers.
///
/// Unknown class strings score with multiplier 1; configuration loading is
/// where they get reported.
pub fn compute(qso_points: u64, rules: &ScoringRules) -> ScoreBreakdown {
    let class_mult = class_multiplier(&rules.class).unwrap_or(1);
    let power_mult = power_multiplier(rules.emergency_power);

    let bonuses: Vec<BonusItem> = BonusCategory::ALL
        .iter()
        .map(|&category| {
            let points = match category {
                BonusCategory::NtsMessages => rules.nts.points(),
                BonusCategory::EmergencyPower if rules.emergency_power => rules.points_per_bonus,
                c if rules.earned.contains(&c) => rules.points_per_bonus,
                _ => 0,
            };
            let name = match category {
                BonusCategory::NtsMessages => {
                    format!("{} ({})", category.name(), rules.nts.message_count())
                }
                _ => category.name().to_string(),
            };
            BonusItem {
                category,
                name,
                points,
            }
        })
        .collect();

    let bonus_points = bonuses
        .iter()
        .fold(0u64, |acc, b| acc.saturating_add(b.points));
    let final_score = qso_points
        .saturating_mul(class_mult)
        .saturating_mul(power_mult)
        .saturating_add(bonus_points);

    ScoreBreakdown {
        qso_points,
        class: rules.class.clone(),
        class_multiplier: class_mult,
        power_multiplier: power_mult,
        bonuses,
        bonus_points,
        final_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_table() {
        assert_eq!(class_multiplier("1A"), Some(1));
        assert_eq!(class_multiplier("2o"), Some(2));
        assert_eq!(class_multiplier("12F"), Some(12));
        assert_eq!(class_multiplier("A"), None);
        assert_eq!(class_multiplier("0A"), None);
        assert_eq!(class_multiplier("3Z"), None);
        assert_eq!(class_multiplier(""), None);
    }

    #[test]
    fn unknown_class_scores_with_unit_multiplier() {
        let rules = ScoringRules {
            class: "bogus".to_string(),
            ..ScoringRules::default()
        };
        let score = compute(10, &rules);
        assert_eq!(score.class_multiplier, 1);
        assert_eq!(score.final_score, 10);
    }

    #[test]
    fn emergency_power_doubles_and_earns_bonus() {
        let rules = ScoringRules {
            emergency_power: true,
            ..ScoringRules::default()
        };
        let score = compute(100, &rules);
        assert_eq!(score.power_multiplier, 2);
        assert_eq!(score.bonus_points, 100);
        assert_eq!(score.final_score, 300);
    }

    #[test]
    fn every_category_is_itemized() {
        let score = compute(0, &ScoringRules::default());
        assert_eq!(score.bonuses.len(), BonusCategory::ALL.len());
        assert!(score.bonuses.iter().all(|b| b.points == 0));
        assert_eq!(score.final_score, 0);
    }
}
