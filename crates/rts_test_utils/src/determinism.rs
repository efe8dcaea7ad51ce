//! Determinism testing utilities.
//!
//! Provides a harness for verifying that [`rts_core::simulation::Simulation`]
//! produces identical results given identical inputs.
//!
//! # Sources of non-determinism this guards against
//!
//! - **Floating-point math**: `rts_core` uses fixed-point arithmetic
//!   ([`rts_core::math::Fixed`]) throughout, never `f32`/`f64`, for exactly
//!   this reason.
//! - **HashMap iteration order**: entity/player/faction tables are keyed by
//!   stable integer ids; nothing in the tick loop depends on a `HashMap`'s
//!   iteration order producing a particular *sequence* of effects (only
//!   which entries exist).
//! - **System randomness**: combat's stochastic rolls (§4.4) draw from
//!   [`rts_core::rng::DeterministicRng`], seeded once at construction and
//!   advanced only inside the tick loop — never from the OS or wall clock.
//!
//! # Test levels
//!
//! 1. Unit tests inside each `rts_core` module (movement, combat, ...).
//! 2. Property tests here: random inputs must still replay identically.
//! 3. Integration scenarios here: full tick sequences across movement,
//!    combat, and production must reproduce bit-for-bit.
//! 4. Parallel runs here: N simulations started from the same seed, run on
//!    separate threads, must all agree.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use rts_core::interfaces::NullSink;
use rts_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\nRuns: {}\nTicks: {}\nUnique hashes: {} (expected 1)\nAll hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\nSimulations: {}\nTicks: {}\nUnique hashes: {}\nAll hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism. Generic over any
/// state/step/hash triple, not just [`Simulation`] — used directly by the
/// property tests below with closures that build a fresh `Simulation` each
/// run.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
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
    DeterminismResult { is_deterministic, hashes, ticks }
}

/// Hash a [`Simulation`] by bincode-encoding it and hashing the resulting
/// bytes. Avoids requiring `Hash` on every nested field (several, like
/// [`rts_core::math::Fixed`], don't implement it) while still catching any
/// divergence bincode's encoding would notice.
#[must_use]
pub fn simulation_state_hash(sim: &Simulation) -> u64 {
    let bytes = bincode::serialize(sim).expect("Simulation always serializes");
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Advance `sim` by one tick with no-op render/audio sinks.
pub fn tick_headless(sim: &mut Simulation) {
    let mut render = NullSink;
    let mut audio = NullSink;
    sim.tick(&mut render, &mut audio);
}

/// Simplified determinism verification for [`Simulation`]: build two
/// instances from `setup_fn`, run each for `num_ticks`, and compare final
/// state hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(2, num_ticks, &setup_fn, |sim| tick_headless(sim), simulation_state_hash).is_deterministic
}

/// Run N simulations in parallel (one per scoped thread) and collect final
/// state hashes. Useful for catching non-determinism that only manifests
/// under thread scheduling or memory layout differences — even though the
/// simulation itself never runs on more than one thread in production, this
/// confirms a single setup closure yields bit-identical runs regardless of
/// which core executed it.
pub fn run_parallel_simulations_scoped<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        tick_headless(&mut sim);
                    }
                    simulation_state_hash(&sim)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult { hashes, ticks: num_ticks, num_sims }
}

/// Compare two simulation runs tick-by-tick, finding the first divergence.
/// Returns `None` if deterministic, `Some(tick)` otherwise.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if simulation_state_hash(&sim1) != simulation_state_hash(&sim2) {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        tick_headless(&mut sim1);
        tick_headless(&mut sim2);
        if simulation_state_hash(&sim1) != simulation_state_hash(&sim2) {
            return Some(tick);
        }
    }
    None
}

/// Verify that a bincode serialize/deserialize round-trip preserves
/// simulation state exactly — critical for save/load (§6) and for replay
/// reproducibility.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..num_ticks {
        tick_headless(&mut sim);
    }
    let hash_before = simulation_state_hash(&sim);

    let Ok(bytes) = bincode::serialize(&sim) else { return false };
    let Ok(restored): Result<Simulation, _> = bincode::deserialize(&bytes) else { return false };
    simulation_state_hash(&restored) == hash_before
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing against `rts_core` types.
pub mod strategies {
    use proptest::prelude::*;
    use rts_core::interfaces::Command;
    use rts_core::math::{Fixed, Vec2Fixed};

    /// Generate a fixed-point number in a reasonable range for positions
    /// (map size up to 10000 world units).
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-10000i32..10000i32).prop_map(Fixed::from_num)
    }

    /// Generate a fixed-point number for speeds (1 to 20 units/tick).
    pub fn arb_fixed_speed() -> impl Strategy<Value = Fixed> {
        (1i32..20i32).prop_map(Fixed::from_num)
    }

    /// Generate a fixed-point 2D vector for positions.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate a `MoveTo` command for a single unit id.
    pub fn arb_move_command(unit: rts_core::entity::EntityId) -> impl Strategy<Value = Command> {
        arb_vec2_position().prop_map(move |destination| Command::MoveTo { units: vec![unit], destination })
    }

    /// Generate health values (1-1000).
    pub fn arb_health() -> impl Strategy<Value = i32> {
        1i32..1000i32
    }

    /// Generate damage values (1-100).
    pub fn arb_damage() -> impl Strategy<Value = i32> {
        1i32..100i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rts_core::entity::{EntityId, PlayerEntityCommon, Unit, UnitKind, Weapon};
    use rts_core::grid::{self, Grid, GridPosition, TerrainCost};
    use rts_core::interfaces::Command;
    use rts_core::math::{Fixed, Vec2Fixed};
    use rts_core::player::{FactionId, Player, PlayerId};
    use rts_core::production::BlueprintRegistry;
    use std::collections::HashSet;

    fn flat_grid(size: u32) -> Grid {
        Grid::new(size, size, vec![TerrainCost::Ground; (size * size) as usize])
    }

    fn sample_unit(position: Vec2Fixed, player_id: PlayerId, faction_id: FactionId) -> Unit {
        Unit {
            common: PlayerEntityCommon {
                id: EntityId::new(0),
                player_id,
                faction_id,
                position,
                health: 100,
                max_health: 100,
                cover: Fixed::ZERO,
                visibility_radius: Fixed::from_num(5),
                known_enemies: HashSet::new(),
                enemy_assigned_by_player: None,
                targeted_enemy: None,
                immortal: false,
            },
            kind: UnitKind::Vehicle,
            unit_type: "test_unit".to_string(),
            current_node: grid::position_to_grid(position),
            reserved_node: None,
            facing_direction: 0,
            turret_facing_direction: None,
            virtual_angle: Fixed::ZERO,
            max_speed: Fixed::from_num(8),
            rotation_speed: Fixed::from_num(180),
            path: std::collections::VecDeque::new(),
            awaited_path: None,
            path_wait_deadline: None,
            armour: 0,
            attack_radius: Fixed::ZERO,
            weapons: Vec::new(),
            permanent_units_group: None,
            navigating_group: None,
            outside: true,
            forced_destination: false,
        }
    }

    fn new_simulation(seed: u64) -> Simulation {
        Simulation::new(flat_grid(20), BlueprintRegistry::default(), seed)
    }

    #[test]
    fn empty_simulation_is_deterministic() {
        assert!(verify_simulation_determinism(|| new_simulation(1), 100));
    }

    #[test]
    fn single_unit_movement_is_deterministic() {
        let is_det = verify_simulation_determinism(
            || {
                let mut sim = new_simulation(2);
                let player = PlayerId::new(0);
                let faction = FactionId::new(0);
                sim.add_player(Player::new(player, faction, (255, 0, 0)));
                let start = grid::grid_to_position(GridPosition::new(0, 0));
                let unit_id = sim.spawn_unit(sample_unit(start, player, faction));
                sim.push_command(Command::MoveTo {
                    units: vec![unit_id],
                    destination: grid::grid_to_position(GridPosition::new(10, 10)),
                });
                sim
            },
            300,
        );
        assert!(is_det);
    }

    #[test]
    fn deterministic_sim_has_no_divergence() {
        let divergence = find_first_divergence(
            || {
                let mut sim = new_simulation(3);
                let player = PlayerId::new(0);
                let faction = FactionId::new(0);
                sim.add_player(Player::new(player, faction, (0, 255, 0)));
                sim.spawn_unit(sample_unit(Vec2Fixed::ZERO, player, faction));
                sim
            },
            100,
        );
        assert!(divergence.is_none(), "expected no divergence, got {divergence:?}");
    }

    #[test]
    fn serialization_round_trip_preserves_empty_sim() {
        assert!(verify_serialization_determinism(|| new_simulation(4), 0));
    }

    #[test]
    fn serialization_round_trip_preserves_populated_sim() {
        assert!(verify_serialization_determinism(
            || {
                let mut sim = new_simulation(5);
                let player = PlayerId::new(0);
                let faction = FactionId::new(0);
                sim.add_player(Player::new(player, faction, (0, 0, 255)));
                for i in 0..10 {
                    let position = grid::grid_to_position(GridPosition::new(i, 0));
                    sim.spawn_unit(sample_unit(position, player, faction));
                }
                sim
            },
            50,
        ));
    }

    fn setup_combat_scenario(seed: u64) -> Simulation {
        let mut sim = new_simulation(seed);
        let attacker_player = PlayerId::new(0);
        let attacker_faction = FactionId::new(0);
        let victim_player = PlayerId::new(1);
        let victim_faction = FactionId::new(1);
        sim.add_player(Player::new(attacker_player, attacker_faction, (255, 0, 0)));
        sim.add_player(Player::new(victim_player, victim_faction, (0, 0, 255)));
        sim.declare_war(attacker_faction, victim_faction).unwrap();

        let position = grid::grid_to_position(GridPosition::new(5, 5));
        let mut attacker = sample_unit(position, attacker_player, attacker_faction);
        attacker.weapons.push(Weapon {
            name: "cannon".to_string(),
            damage: 15,
            penetration: 5,
            accuracy: Fixed::from_num(60),
            range: Fixed::from_num(300),
            rate_of_fire: Fixed::from_num(1),
            next_firing_time: 0,
        });
        sim.spawn_unit(attacker);
        sim.spawn_unit(sample_unit(position, victim_player, victim_faction));
        sim
    }

    #[test]
    fn combat_scenario_is_deterministic() {
        let result = verify_determinism(5, 200, || setup_combat_scenario(7), tick_headless, simulation_state_hash);
        result.assert_deterministic();
    }

    #[test]
    fn parallel_combat_simulations_agree() {
        let result = run_parallel_simulations_scoped(|| setup_combat_scenario(9), 4, 200);
        result.assert_deterministic();
    }

    #[test]
    fn parallel_movement_simulations_agree() {
        let result = run_parallel_simulations_scoped(
            || {
                let mut sim = new_simulation(11);
                let player = PlayerId::new(0);
                let faction = FactionId::new(0);
                sim.add_player(Player::new(player, faction, (255, 255, 0)));
                let start = grid::grid_to_position(GridPosition::new(0, 0));
                let unit_id = sim.spawn_unit(sample_unit(start, player, faction));
                sim.push_command(Command::MoveTo {
                    units: vec![unit_id],
                    destination: grid::grid_to_position(GridPosition::new(15, 15)),
                });
                sim
            },
            4,
            500,
        );
        result.assert_deterministic();
    }

    proptest! {
        /// Any random spawn position should produce deterministic results —
        /// catches floating-point contamination in position handling.
        #[test]
        fn prop_random_spawn_positions_are_deterministic(
            gx in 0u32..20,
            gy in 0u32..20,
        ) {
            let setup = move || {
                let mut sim = new_simulation(100);
                let player = PlayerId::new(0);
                let faction = FactionId::new(0);
                sim.add_player(Player::new(player, faction, (255, 0, 0)));
                let position = grid::grid_to_position(GridPosition::new(gx, gy));
                sim.spawn_unit(sample_unit(position, player, faction));
                sim
            };
            let result = verify_determinism(2, 50, setup, tick_headless, simulation_state_hash);
            prop_assert!(result.is_deterministic);
        }

        /// Random movement destinations should produce deterministic results.
        #[test]
        fn prop_random_destinations_are_deterministic(
            dest_x in 0u32..20,
            dest_y in 0u32..20,
        ) {
            let setup = move || {
                let mut sim = new_simulation(101);
                let player = PlayerId::new(0);
                let faction = FactionId::new(0);
                sim.add_player(Player::new(player, faction, (0, 255, 0)));
                let start = grid::grid_to_position(GridPosition::new(0, 0));
                let unit_id = sim.spawn_unit(sample_unit(start, player, faction));
                sim.push_command(Command::MoveTo {
                    units: vec![unit_id],
                    destination: grid::grid_to_position(GridPosition::new(dest_x, dest_y)),
                });
                sim
            };
            let result = verify_determinism(2, 100, setup, tick_headless, simulation_state_hash);
            prop_assert!(result.is_deterministic);
        }

        /// Serialization round-trip should always preserve state exactly
        /// regardless of how many entities or ticks have elapsed.
        #[test]
        fn prop_serialization_roundtrip_is_exact(
            num_entities in 1usize..10,
            num_ticks in 0u64..50,
        ) {
            let setup = move || {
                let mut sim = new_simulation(102);
                let player = PlayerId::new(0);
                let faction = FactionId::new(0);
                sim.add_player(Player::new(player, faction, (255, 255, 255)));
                for i in 0..num_entities {
                    let position = grid::grid_to_position(GridPosition::new(i as u32 % 20, (i as u32 * 3) % 20));
                    sim.spawn_unit(sample_unit(position, player, faction));
                }
                sim
            };
            prop_assert!(verify_serialization_determinism(setup, num_ticks));
        }
    }

    #[test]
    #[ignore = "long-running stress test"]
    fn stress_test_many_units() {
        let setup = || {
            let mut sim = new_simulation(200);
            let player = PlayerId::new(0);
            let faction = FactionId::new(0);
            sim.add_player(Player::new(player, faction, (255, 0, 0)));
            for i in 0..100 {
                let position = grid::grid_to_position(GridPosition::new(i % 20, i / 20));
                let unit_id = sim.spawn_unit(sample_unit(position, player, faction));
                sim.push_command(Command::MoveTo {
                    units: vec![unit_id],
                    destination: grid::grid_to_position(GridPosition::new(10, 10)),
                });
            }
            sim
        };
        let result = verify_determinism(5, 1000, setup, tick_headless, simulation_state_hash);
        result.assert_deterministic();
    }
}
