//! Determinism testing utilities.
//!
//! Battles are seeded: the seed drives terrain generation and the enemy
//! slot shuffle, and everything after deployment is a pure function of the
//! squads, the field and the strategy. Two battles built from the same setup
//! and seed must therefore end in the same state.
//!
//! # Sources of divergence
//!
//! - **Unseeded setups**: a setup without a seed draws a fresh one.
//! - **Float math**: combat rates are integer percents, scores are fixed-point.
//! - **Hash iteration order**: squads always act in arena order; the
//!   occupancy set is only ever queried, never iterated.

use std::thread;

use broadside_core::battle::BattleInstance;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u32,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that all runs produced the same hash.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine several times and compare final hashes.
///
/// Generic over the state so the harness itself can be tested without a
/// battle.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u32,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a battle `runs` times to completion (at most `max_ticks` steps each)
/// and compare final state hashes.
///
/// # Example
///
/// ```ignore
/// use broadside_test_utils::determinism::verify_battle_determinism;
/// use broadside_test_utils::fixtures::{mixed_armies, rolled_battle};
///
/// verify_battle_determinism(3, 60, || rolled_battle(&mixed_armies(7)))
///     .assert_deterministic();
/// ```
pub fn verify_battle_determinism<F>(runs: usize, max_ticks: u32, setup_fn: F) -> DeterminismResult
where
    F: Fn() -> BattleInstance,
{
    verify_determinism(
        runs,
        max_ticks,
        setup_fn,
        |battle| {
            battle.step();
        },
        BattleInstance::state_hash,
    )
}

/// Run N battles on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_battles<F>(setup_fn: F, num_battles: usize, max_ticks: u32) -> DeterminismResult
where
    F: Fn() -> BattleInstance + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_battles)
            .map(|_| {
                s.spawn(|| {
                    let mut battle = setup_fn();
                    for _ in 0..max_ticks {
                        battle.step();
                    }
                    battle.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: max_ticks,
    }
}

/// Step two battles side by side and report the first tick where they differ.
///
/// `None` if they agree for all `max_ticks` ticks; `Some(0)` if they differ
/// right after deployment.
pub fn find_first_divergence<F>(setup_fn: F, max_ticks: u32) -> Option<u32>
where
    F: Fn() -> BattleInstance,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=max_ticks {
        a.step();
        b.step();
        if a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Proptest strategies for battle inputs.
pub mod strategies {
    use std::collections::BTreeMap;

    use broadside_core::formation::FormationPolicy;
    use broadside_core::squad::RosterEntry;
    use broadside_core::strategy::{ChargeMode, KiteMode, StrategyConfig, TargetMode};
    use broadside_core::terrain::TerrainKind;
    use broadside_core::troop::TroopKind;
    use proptest::prelude::*;

    /// Any troop key, including one the table does not know.
    pub fn arb_troop_key() -> impl Strategy<Value = String> {
        prop_oneof![
            9 => proptest::sample::select(TroopKind::ALL.to_vec()).prop_map(|k| k.key().to_string()),
            1 => Just("unknown".to_string()),
        ]
    }

    /// A roster entry with headcount 1-10 and level 0.1-5.0.
    pub fn arb_roster_entry() -> impl Strategy<Value = RosterEntry> {
        (arb_troop_key(), 1u32..=10, 1u32..=50)
            .prop_map(|(troop, headcount, tenths)| {
                RosterEntry::new(troop, headcount, tenths as f32 / 10.0)
            })
    }

    /// A roster of up to `max_len` entries (possibly empty).
    pub fn arb_roster(max_len: usize) -> impl Strategy<Value = Vec<RosterEntry>> {
        proptest::collection::vec(arb_roster_entry(), 0..=max_len)
    }

    /// A base terrain.
    pub fn arb_terrain() -> impl Strategy<Value = TerrainKind> {
        proptest::sample::select(TerrainKind::ALL.to_vec())
    }

    /// A valid ally strategy.
    pub fn arb_strategy() -> impl Strategy<Value = StrategyConfig> {
        (
            proptest::sample::select(vec![
                TargetMode::Type,
                TargetMode::Hp,
                TargetMode::Rear,
                TargetMode::Close,
                TargetMode::Strong,
            ]),
            proptest::sample::select(vec![KiteMode::Kite, KiteMode::Retreat, KiteMode::None]),
            proptest::sample::select(vec![ChargeMode::Cavalry, ChargeMode::All, ChargeMode::None]),
            1u8..=100,
        )
            .prop_map(|(target, kite, charge, threshold)| {
                StrategyConfig::default()
                    .with_target_mode(target)
                    .with_kite_mode(kite)
                    .with_charge_mode(charge)
                    .with_retreat_threshold(threshold)
            })
    }

    /// Any ally formation policy, custom pins included.
    pub fn arb_formation() -> impl Strategy<Value = FormationPolicy> {
        prop_oneof![
            Just(FormationPolicy::Balance),
            Just(FormationPolicy::Assault),
            Just(FormationPolicy::Defense),
            proptest::collection::btree_map(0usize..20, 0usize..24, 0..6)
                .prop_map(|pins: BTreeMap<usize, usize>| FormationPolicy::Custom(pins)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{infantry_mirror, mixed_armies, rolled_battle, uniform_battle};
    use broadside_core::terrain::TerrainKind;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_detects_non_determinism() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_mirror_battle_determinism() {
        verify_battle_determinism(3, 60, || uniform_battle(&infantry_mirror(5), TerrainKind::Plain))
            .assert_deterministic();
    }

    #[test]
    fn test_rolled_terrain_determinism() {
        verify_battle_determinism(3, 60, || rolled_battle(&mixed_armies(77))).assert_deterministic();
    }

    #[test]
    fn test_parallel_battles_agree() {
        run_parallel_battles(|| rolled_battle(&mixed_armies(13)), 4, 60).assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(|| rolled_battle(&mixed_armies(3)), 60), None);
    }

    #[test]
    fn test_different_seeds_diverge_at_deployment() {
        let seed = std::cell::Cell::new(0u64);
        let divergence = find_first_divergence(
            || {
                seed.set(seed.get() + 1);
                rolled_battle(&mixed_armies(seed.get()))
            },
            10,
        );
        assert_eq!(divergence, Some(0));
    }
}
