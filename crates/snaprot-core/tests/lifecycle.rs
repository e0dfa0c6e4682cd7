//! End-to-end cycles over a simulated backup root.

use std::num::NonZeroU32;

use snaprot_core::{
    Generation, Mode, Move, MoveKind, RetentionPolicy, SlotId, SnapshotBackend, SnaprotError,
};

use fixtures::Site;

fn keep(generation: Generation, count: u32) -> RetentionPolicy {
    RetentionPolicy::default().with_count(generation, NonZeroU32::new(count).expect("non-zero"))
}

fn slot(generation: Generation, index: u32) -> SlotId {
    SlotId::new(generation, index)
}

#[test]
fn hourly_cycle_with_three_retained() {
    let site = Site::new();
    let engine = site.engine(keep(Generation::Hourly, 3), Mode::Live);
    engine.init().expect("init");
    site.seed(slot(Generation::Hourly, 1));
    site.set_state("v1");

    let report = engine.run_cycle(Generation::Hourly).expect("cycle");

    assert_eq!(
        report.moves,
        vec![
            Move {
                from: slot(Generation::Hourly, 1),
                to: slot(Generation::Hourly, 2),
                kind: MoveKind::Rename,
            },
            Move {
                from: slot(Generation::Hourly, 0),
                to: slot(Generation::Hourly, 1),
                kind: MoveKind::Snapshot,
            },
        ]
    );
    assert!(report.pre_pruned.is_empty());
    assert!(report.post_pruned.is_empty());
    assert_eq!(engine.store().occupied(Generation::Hourly), vec![0, 1, 2]);
    assert_eq!(site.read("hourly.2/origin"), "hourly.1");
    assert_eq!(site.read("hourly.1/data/state"), "v0");
    assert_eq!(site.read("hourly.0/data/state"), "v1");
}

#[test]
fn full_window_promotes_before_pruning() {
    let site = Site::new();
    let engine = site.engine(keep(Generation::Daily, 3), Mode::Live);
    engine.init().expect("init");
    for index in 0..3 {
        site.seed(slot(Generation::Daily, index));
    }

    let report = engine.run_cycle(Generation::Daily).expect("cycle");

    assert!(report.pre_pruned.is_empty());
    assert_eq!(report.moves.len(), 3);
    assert_eq!(report.moves[0].from, slot(Generation::Daily, 2));
    assert_eq!(report.post_pruned, vec![slot(Generation::Daily, 3)]);
    assert_eq!(engine.store().occupied(Generation::Daily), vec![0, 1, 2]);
    assert_eq!(site.read("daily.2/origin"), "daily.1");
    assert_eq!(site.read("daily.1/origin"), "daily.0");
    assert_eq!(site.read("daily.0/data/state"), "v0");
}

#[test]
fn leftover_past_the_window_is_pruned_first() {
    let site = Site::new();
    let engine = site.engine(keep(Generation::Weekly, 2), Mode::Live);
    site.seed(slot(Generation::Daily, 0));
    site.seed(slot(Generation::Weekly, 2));

    let report = engine.run_cycle(Generation::Weekly).expect("cycle");
    assert_eq!(report.pre_pruned, vec![slot(Generation::Weekly, 2)]);
    assert_eq!(engine.store().occupied(Generation::Weekly), vec![0]);
}

#[test]
fn lowered_retention_drops_everything_past_the_new_window() {
    let site = Site::new();
    let engine = site.engine(keep(Generation::Daily, 3), Mode::Live);
    engine.init().expect("init");
    for index in 0..7 {
        site.seed(slot(Generation::Daily, index));
    }

    let report = engine.run_cycle(Generation::Daily).expect("cycle");
    assert_eq!(
        report.pre_pruned,
        (3..7).rev().map(|index| slot(Generation::Daily, index)).collect::<Vec<_>>()
    );
    assert_eq!(report.post_pruned, vec![slot(Generation::Daily, 3)]);
    assert_eq!(engine.store().occupied(Generation::Daily), vec![0, 1, 2]);
    assert_eq!(site.read("daily.2/origin"), "daily.1");
}

#[test]
fn daily_is_promoted_from_the_newest_hourly() {
    let site = Site::new();
    let engine = site.engine(RetentionPolicy::default(), Mode::Live);
    site.seed(slot(Generation::Hourly, 4));
    site.seed(slot(Generation::Hourly, 2));

    let report = engine.run_cycle(Generation::Daily).expect("cycle");
    assert_eq!(report.created.slot, slot(Generation::Daily, 0));
    assert_eq!(report.created.promoted_from, Some(slot(Generation::Hourly, 2)));
    assert_eq!(site.read("daily.0/origin"), "hourly.2");
    assert!(site.sim.is_snapshot(&site.root().join("daily.0")));
}

#[test]
fn state_cascades_through_every_generation() {
    let site = Site::new();
    let engine = site.engine(RetentionPolicy::default(), Mode::Live);
    engine.init().expect("init");

    for generation in Generation::ALL {
        engine.run_cycle(generation).expect("cycle");
    }
    site.set_state("v1");
    engine.run_cycle(Generation::Hourly).expect("refresh");

    for status in engine.status() {
        assert_eq!(status.occupied.first(), Some(&0), "{} has slot 0", status.generation);
        assert!(status.overflow().is_empty());
    }
    assert_eq!(site.read("yearly.0/data/state"), "v0");
    assert_eq!(site.read("hourly.0/data/state"), "v1");
}

#[test]
fn missing_predecessor_aborts_without_creating() {
    let site = Site::new();
    let engine = site.engine(RetentionPolicy::default(), Mode::Live);
    engine.init().expect("init");

    let err = engine.run_cycle(Generation::Monthly).unwrap_err();
    assert!(matches!(
        err,
        SnaprotError::NoPredecessor {
            generation: Generation::Monthly,
            predecessor: Generation::Weekly
        }
    ));
    assert!(err.is_fatal());
    assert!(engine.store().occupied(Generation::Monthly).is_empty());
}

#[test]
fn foreign_directory_in_the_window_is_fatal() {
    let site = Site::new();
    let engine = site.engine(RetentionPolicy::default(), Mode::Live);
    engine.init().expect("init");
    site.seed(slot(Generation::Daily, 0));
    std::fs::create_dir(site.root().join("daily.1")).expect("mkdir");

    let err = engine.run_cycle(Generation::Daily).unwrap_err();
    assert!(matches!(err, SnaprotError::Corrupted { .. }));
    assert_eq!(engine.store().occupied(Generation::Daily), vec![0, 1]);
    assert_eq!(site.read("daily.0/origin"), "daily.0");
}

#[test]
fn removing_an_absent_slot_is_a_no_op() {
    let site = Site::new();
    let engine = site.engine(RetentionPolicy::default(), Mode::Live);
    engine.init().expect("init");

    let removed = engine.remove(slot(Generation::Daily, 2)).expect("remove");
    assert!(!removed);
    let audited: Vec<_> = engine
        .ops()
        .audit()
        .intents()
        .into_iter()
        .filter(|intent| intent.to_string().starts_with("delete"))
        .collect();
    assert!(audited.is_empty());
}
