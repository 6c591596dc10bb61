use std::collections::BTreeSet;

use fdscore::{
    config::Config,
    engine::scoring::{BonusCategory, NtsRules, ScoringRules, compute},
};

#[test]
fn reference_score() {
    let rules = ScoringRules {
        class: "2A".to_string(),
        emergency_power: true,
        earned: BTreeSet::from([
            BonusCategory::MediaPublicity,
            BonusCategory::PublicLocation,
            BonusCategory::PublicInformationTable,
            BonusCategory::SocialMedia,
            BonusCategory::EducationalActivity,
            BonusCategory::W1awBulletin,
        ]),
        ..ScoringRules::default()
    };
    let score = compute(2175, &rules);
    assert_eq!(score.class_multiplier, 2);
    assert_eq!(score.power_multiplier, 2);
    assert_eq!(score.bonus_points, 700);
    assert_eq!(score.final_score, 9400);
    assert_eq!(score.bonuses.len(), BonusCategory::ALL.len());
}

#[test]
fn nothing_earned_scores_zero() {
    let score = compute(0, &ScoringRules::default());
    assert_eq!(score.final_score, 0);
    assert!(score.bonuses.iter().all(|b| b.points == 0));
}

fn nts_points(originated: u64, handled: u64) -> u64 {
    let rules = ScoringRules {
        nts: NtsRules {
            originated,
            handled,
            points_per_message: 10,
            points_cap: 100,
        },
        ..ScoringRules::default()
    };
    let score = compute(0, &rules);
    let nts = score
        .bonuses
        .iter()
        .find(|b| b.category == BonusCategory::NtsMessages)
        .unwrap();
    assert_eq!(score.final_score, nts.points);
    nts.points
}

#[test]
fn nts_points_are_capped() {
    assert_eq!(nts_points(15, 0), 100);
    assert_eq!(nts_points(0, 15), 100);
}

#[test]
fn nts_originated_and_handled_are_capped_separately() {
    assert_eq!(nts_points(10, 5), 150);
    assert_eq!(nts_points(10, 10), 200);
    assert_eq!(nts_points(25, 30), 200);
}

#[test]
fn unknown_class_scores_with_multiplier_one() {
    let rules = ScoringRules {
        class: "QRP".to_string(),
        ..ScoringRules::default()
    };
    assert_eq!(compute(50, &rules).final_score, 50);
}

#[test]
fn configured_flags_flow_into_the_score() {
    let config = Config::from_json_str(
        r#"{
            "n3fjp_host": "127.0.0.1",
            "field_day_class": "3A",
            "emergency_power": false,
            "public_location": true,
            "youth_participation": true,
            "nts_message_handled": 3
        }"#,
    )
    .unwrap();
    let score = compute(100, &config.scoring);
    assert_eq!(score.final_score, 100 * 3 + 200 + 30);
}
