use proptest::prelude::*;
use tack_core::order::{OutOfRangePolicy, UnknownItemPolicy};
use tack_sim::workload::Workload;
use tack_sim::{SimulationConfig, Simulator};

fn arb_config() -> impl Strategy<Value = SimulationConfig> {
    (
        any::<u64>(),
        1_usize..=3,
        1_usize..=3,
        0_usize..=5,
        0_u8..=40,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(seed, boards, lists_per_board, cards_per_list, stray, clamp, strict)| {
                SimulationConfig {
                    seed,
                    boards,
                    lists_per_board,
                    cards_per_list,
                    steps: 40,
                    workload: Workload {
                        stray_percent: stray,
                        ..Workload::default()
                    },
                    out_of_range: if clamp {
                        OutOfRangePolicy::Clamp
                    } else {
                        OutOfRangePolicy::Reject
                    },
                    unknown_items: if strict {
                        UnknownItemPolicy::Reject
                    } else {
                        UnknownItemPolicy::Skip
                    },
                }
            },
        )
}

proptest! {
    // Each case seeds a store and runs 40 steps; keep the count modest.
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    #[test]
    fn any_seed_keeps_positions_dense(config in arb_config()) {
        let result = Simulator::new(config)
            .and_then(|mut sim| sim.run())
            .map_err(|err| TestCaseError::fail(format!("{err:#}")))?;
        let rendered: Vec<String> = result
            .violations
            .iter()
            .map(|v| result.alias_text(&tack_sim::campaign::format_violation(v)))
            .collect();
        prop_assert!(result.passed(), "seed {} failed: {:?}", result.seed, rendered);
    }

    #[test]
    fn stats_account_for_every_step(seed in any::<u64>()) {
        let config = SimulationConfig { seed, steps: 30, ..SimulationConfig::default() };
        let result = Simulator::new(config)
            .and_then(|mut sim| sim.run())
            .map_err(|err| TestCaseError::fail(format!("{err:#}")))?;
        prop_assert_eq!(result.stats.applied + result.stats.rejected, result.trace.len());
        prop_assert!(result.stats.noops <= result.stats.applied);
    }
}
