use std::sync::Arc;

use chrono::Utc;

use fdscore::{
    engine::{
        aggregate::AggregateSnapshot,
        scoring::{ScoringRules, compute},
    },
    runtime::publisher::{HealthReport, PublishedSnapshot, SnapshotPublisher},
};

fn snapshot(total: u64) -> PublishedSnapshot {
    PublishedSnapshot {
        version: 0,
        reset_generation: 0,
        generated_at: Utc::now(),
        health: HealthReport::default(),
        aggregate: AggregateSnapshot {
            total_contacts: total,
            total_points: total,
            ..AggregateSnapshot::default()
        },
        score: compute(total, &ScoringRules::default()),
    }
}

#[test]
fn late_subscriber_gets_current_snapshot() {
    let publisher = SnapshotPublisher::new(snapshot(0));
    assert_eq!(publisher.feed().latest().version, 0);

    publisher.publish(snapshot(10));
    publisher.publish(snapshot(20));

    let late = publisher.feed();
    let current = late.latest();
    assert_eq!(current.version, 2);
    assert_eq!(current.aggregate.total_contacts, 20);
}

#[tokio::test]
async fn slow_reader_skips_ahead_never_back() {
    let publisher = SnapshotPublisher::new(snapshot(0));
    let mut fast = publisher.feed();
    let mut slow = publisher.feed();

    let mut seen = Vec::new();
    for total in [5, 6, 7] {
        publisher.publish(snapshot(total));
        seen.push(fast.next().await.unwrap().version);
    }
    assert_eq!(seen, [1, 2, 3]);

    let caught_up = slow.next().await.unwrap();
    assert_eq!(caught_up.version, 3);
    assert_eq!(caught_up.aggregate.total_contacts, 7);
}

#[tokio::test]
async fn newer_than_returns_immediately_when_already_newer() {
    let publisher = SnapshotPublisher::new(snapshot(0));
    publisher.publish(snapshot(1));
    let mut feed = publisher.feed();
    let snap = feed.newer_than(0).await.unwrap();
    assert_eq!(snap.version, 1);
}

#[tokio::test]
async fn feed_ends_when_publisher_drops() {
    let publisher = SnapshotPublisher::new(snapshot(0));
    let mut feed = publisher.feed();
    drop(publisher);
    assert!(feed.next().await.is_none());
    assert_eq!(feed.latest().version, 0);
}

#[test]
fn held_snapshot_is_unaffected_by_later_publication() {
    let publisher = SnapshotPublisher::new(snapshot(0));
    let held = publisher.publish(snapshot(42));
    let other_ref = Arc::clone(&held);

    publisher.publish(snapshot(43));
    publisher.publish(snapshot(44));

    assert_eq!(held.aggregate.total_contacts, 42);
    assert_eq!(held.version, 1);
    assert_eq!(*held, *other_ref);
    assert_eq!(publisher.latest().version, 3);
}
