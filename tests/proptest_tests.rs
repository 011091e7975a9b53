//! Property-based tests for fleetrecap
//!
//! These tests use proptest to check invariants over generated inputs:
//! - Host list folding is lossless and order independent
//! - Run counters stay consistent whatever the event order
//! - Grouping does not depend on how hosts interleave

use std::collections::BTreeSet;

use fleetrecap::callback::{Event, HostResult, OutcomeKind, PlaybookRun};
use fleetrecap::config::{RenderConfig, RendererKind};
use fleetrecap::hostlist::{expand, fold};
use fleetrecap::output::RecordingSink;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Host names in the foldable subset: no brackets or commas.
fn host_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}[0-9]{1,3}",
        "[a-z]{1,4}-[a-z]{1,4}",
        "[a-z]{1,3}0[0-9]{2}",
        "[a-z.]{1,8}",
    ]
}

fn host_set() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(host_name(), 1..40)
}

fn outcome() -> impl Strategy<Value = OutcomeKind> {
    prop_oneof![
        Just(OutcomeKind::Ok),
        Just(OutcomeKind::Changed),
        Just(OutcomeKind::Failed),
        Just(OutcomeKind::Unreachable),
        Just(OutcomeKind::Skipped),
        Just(OutcomeKind::Ignored),
        Just(OutcomeKind::Rescued),
    ]
}

/// One step of a generated run, over hosts `h0..h5`.
#[derive(Debug, Clone)]
enum Step {
    Task,
    Start(usize),
    Result(usize, OutcomeKind),
    Item(usize, OutcomeKind),
    Interrupt,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => Just(Step::Task),
        2 => (0..6usize).prop_map(Step::Start),
        6 => (0..6usize, outcome()).prop_map(|(h, o)| Step::Result(h, o)),
        2 => (0..6usize, outcome()).prop_map(|(h, o)| Step::Item(h, o)),
        1 => Just(Step::Interrupt),
    ]
}

fn to_event(step: &Step, n: usize) -> Event {
    let host = |h: usize| format!("h{}", h);
    match step {
        Step::Task => Event::TaskStart {
            name: format!("task {}", n),
            hosts: None,
        },
        Step::Start(h) => Event::HostStart { host: host(*h) },
        Step::Result(h, kind) => Event::HostResult {
            host: host(*h),
            result: HostResult::new(*kind).with_msg(kind.as_str()),
        },
        Step::Item(h, kind) => Event::ItemResult {
            host: host(*h),
            item: format!("item{}", n % 3),
            result: HostResult::new(*kind),
        },
        Step::Interrupt => Event::Interrupt,
    }
}

fn new_run(renderer: RendererKind) -> PlaybookRun<RecordingSink> {
    let mut config = RenderConfig::plain(renderer);
    config.width = Some(60);
    PlaybookRun::new(config, RecordingSink::new()).unwrap()
}

// ============================================================================
// Host List Folding
// ============================================================================

mod folding_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: expanding a folded set gives back exactly the set
        #[test]
        fn fold_expand_round_trip(hosts in host_set()) {
            let folded = fold(&hosts);
            let expanded: BTreeSet<String> = expand(&folded).unwrap().into_iter().collect();
            let original: BTreeSet<String> = hosts.into_iter().collect();
            prop_assert_eq!(expanded, original, "folded: {}", folded);
        }

        /// Property: folding does not depend on input order
        #[test]
        fn fold_is_order_independent(hosts in host_set(), seed in any::<u64>()) {
            let mut shuffled = hosts.clone();
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();
            prop_assert_eq!(fold(&hosts), fold(&shuffled));
        }

        /// Property: a contiguous run printed with one padding width folds to a
        /// single range, even when it crosses a power of ten
        #[test]
        fn contiguous_run_folds_to_one_range(
            prefix in "[a-z]{1,5}",
            width in 1usize..5,
            start in 0u64..120,
            len in 2u64..150,
        ) {
            let end = start + len - 1;
            let hosts: Vec<String> = (start..=end)
                .map(|n| format!("{}{:0width$}", prefix, n, width = width))
                .collect();
            let expected = format!(
                "{}[{:0width$}-{:0width$}]",
                prefix,
                start,
                end,
                width = width
            );
            prop_assert_eq!(fold(&hosts), expected);
        }

        /// Property: folding never panics, whatever the names look like
        #[test]
        fn fold_never_panics(hosts in prop::collection::vec("\\PC{0,20}", 0..20)) {
            let _ = fold(&hosts);
        }

        /// Property: expanding arbitrary text never panics
        #[test]
        fn expand_never_panics(pattern in "\\PC{0,60}") {
            let _ = expand(&pattern);
        }
    }
}

// ============================================================================
// Run Counters
// ============================================================================

mod counter_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        /// Property: dispatched == running + resolved after every event
        #[test]
        fn counters_consistent_after_every_event(
            steps in prop::collection::vec(step(), 0..60),
            tally in any::<bool>(),
        ) {
            let renderer = if tally { RendererKind::Tally } else { RendererKind::Classic };
            let mut run = new_run(renderer);
            run.handle(Event::PlayStart {
                name: "generated".into(),
                hosts: (0..4).map(|h| format!("h{}", h)).collect(),
            }).unwrap();

            for (n, step) in steps.iter().enumerate() {
                run.handle(to_event(step, n)).unwrap();
                let counters = run.counters();
                prop_assert!(counters.is_consistent());
                prop_assert_eq!(counters.dispatched(), counters.running() + counters.resolved());
            }

            run.finish().unwrap();
            prop_assert!(run.counters().is_consistent());
            prop_assert_eq!(run.counters().running(), 0);
        }

        /// Property: every resolved host-task pair shows up in the recap once
        #[test]
        fn recap_totals_match_counters(steps in prop::collection::vec(step(), 0..60)) {
            let mut run = new_run(RendererKind::Classic);
            run.handle(Event::PlayStart {
                name: "generated".into(),
                hosts: (0..4).map(|h| format!("h{}", h)).collect(),
            }).unwrap();
            for (n, step) in steps.iter().enumerate() {
                run.handle(to_event(step, n)).unwrap();
            }
            run.finish().unwrap();

            for kind in OutcomeKind::ALL {
                let recap: u64 = run.recap().values().map(|stats| stats.get(kind)).sum();
                prop_assert_eq!(recap, run.counters().get(kind), "{}", kind);
            }
        }
    }
}

// ============================================================================
// Grouping
// ============================================================================

mod grouping_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: the first host to report a result is the one the others
        /// point back to
        #[test]
        fn duplicates_point_to_first_arrival(order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()) {
            let mut run = new_run(RendererKind::Classic);
            run.handle(Event::PlayStart {
                name: "p".into(),
                hosts: (0..6).map(|h| format!("h{}", h)).collect(),
            }).unwrap();
            run.handle(Event::TaskStart { name: "t".into(), hosts: None }).unwrap();
            for h in &order {
                let msg = if h % 2 == 0 { "even" } else { "odd" };
                run.handle(Event::HostResult {
                    host: format!("h{}", h),
                    result: HostResult::ok(msg),
                }).unwrap();
            }

            let lines = run.sink().lines();
            let first_even = order.iter().find(|h| *h % 2 == 0).unwrap();
            for h in order.iter().filter(|h| *h % 2 == 0 && *h != first_even) {
                let expected = format!("ok: h{} => same result as h{}", h, first_even);
                prop_assert!(lines.contains(&expected), "missing {:?} in {:?}", expected, lines);
            }
        }
    }
}
