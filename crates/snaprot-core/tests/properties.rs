use std::num::NonZeroU32;

use proptest::prelude::*;
use snaprot_core::{Generation, Mode, RetentionPolicy, SlotId};

use fixtures::Site;

fn policy(keep: u32) -> RetentionPolicy {
    RetentionPolicy::default().with_count(Generation::Daily, NonZeroU32::new(keep).expect("non-zero"))
}

/// A site with a live `hourly.0` and the given daily indices occupied.
fn site_with(daily: impl IntoIterator<Item = u32>) -> Site {
    let site = Site::new();
    site.engine(RetentionPolicy::default(), Mode::Live)
        .init()
        .expect("init");
    for index in daily {
        site.seed(SlotId::new(Generation::Daily, index));
    }
    site
}

proptest! {
    // Every case builds a real directory tree; keep the count modest.
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn cycles_keep_daily_a_contiguous_prefix(
        keep in 1u32..6,
        initial in 0u32..8,
        cycles in 1usize..4,
    ) {
        let site = site_with(0..initial);
        let engine = site.engine(policy(keep), Mode::Live);

        for _ in 0..cycles {
            engine.run_cycle(Generation::Daily).expect("cycle");
            let occupied = engine.store().occupied(Generation::Daily);
            let expected: Vec<u32> = (0..occupied.len() as u32).collect();
            prop_assert_eq!(&occupied, &expected);
            prop_assert!(occupied.len() as u32 <= keep);
        }
    }

    #[test]
    fn cycles_never_leave_a_slot_past_the_window(
        keep in 1u32..6,
        initial in proptest::collection::btree_set(0u32..10, 0..10),
    ) {
        let max_index = keep - 1;
        let site = site_with(initial.iter().copied());
        let engine = site.engine(policy(keep), Mode::Live);

        let report = engine.run_cycle(Generation::Daily).expect("cycle");
        prop_assert!(report.warnings.is_empty());

        let occupied = engine.store().occupied(Generation::Daily);
        prop_assert!(occupied.iter().all(|index| *index <= max_index));
        prop_assert_eq!(occupied.first().copied(), Some(0));
    }

    #[test]
    fn prune_twice_equals_prune_once(keep in 1u32..6, initial in 0u32..8) {
        let site = site_with(0..initial);
        let engine = site.engine(policy(keep), Mode::Live);

        engine.prune(Generation::Daily).expect("first");
        let after_first = site.tree();
        prop_assert!(engine.prune(Generation::Daily).expect("second").is_empty());
        prop_assert_eq!(site.tree(), after_first);
    }
}
