//! The bounded, watchdog-guarded loop that drives a [`Simulation`] from a
//! loaded [`Scenario`] to completion — victory, elimination, or time limit.
//!
//! Grounded in the teacher's own `game_runner.rs`/`runner.rs`: explicit
//! resource-limit constants, a per-tick watchdog, and periodic progress
//! logging rather than a silent unbounded loop. Unlike the teacher, this
//! driver never touches an ECS world directly — it only ever talks to
//! `Simulation` through [`rts_core::interfaces::Command`] and its read-only
//! accessors; target acquisition and weapons fire resolve automatically
//! inside `Simulation::tick`, so the AI turn below only issues
//! strategic-level orders.
//!
//! # Defensive Coding Principles (JPL-style)
//!
//! - All loops are bounded with explicit maximum iterations
//! - Resource usage (live entity count) is tracked and capped
//! - Progress is logged at regular intervals
//! - Failure modes are explicit (a `Result`), never a panic

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rts_core::entity::{Building, EntityId, PlayerEntityCommon, Unit, UnitKind, Weapon};
use rts_core::error::{Result, SimError};
use rts_core::grid::grid_to_position;
use rts_core::interfaces::{Command, NullSink};
use rts_core::math::{Fixed, Vec2Fixed};
use rts_core::player::{FactionId, Player, PlayerId, ResourceKind};
use rts_core::production::{BlueprintRegistry, BuildingBlueprint, ProductionState, UnitBlueprint};
use rts_core::simulation::Simulation;
use rts_core::triggers::{Condition, Event, EventTrigger, Scenario as TriggerScenario};

use crate::scenario::{AiController, Scenario};
use crate::strategies::{BuildOrderItem, Strategy, StrategyExecutor};

/// Hard ceiling on live entities. A scenario whose spawns exceed this is
/// rejected rather than degrade silently.
pub const MAX_ENTITIES: usize = 10_000;
/// Ticks between progress log lines for long runs.
pub const PROGRESS_LOG_INTERVAL: u64 = 1_000;
/// A single tick taking longer than this is logged as slow.
pub const SLOW_TICK_THRESHOLD: Duration = Duration::from_millis(100);
/// Wall-clock budget for an entire run; exceeding it aborts the run rather
/// than hang a test suite.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(120);
/// How often, in ticks, the sandbox AI re-evaluates build orders and
/// tactical decisions.
const AI_DECISION_INTERVAL_TICKS: u64 = 300;
/// Passive per-second resource trickle given to every player, standing in
/// for the harvester-driven map-resource economy the distilled config
/// schema has no columns for yet (see `DESIGN.md`).
const BASELINE_YIELD_PER_SECOND: i64 = 12;

/// Configuration for one headless run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Deterministic PRNG seed.
    pub seed: u64,
    /// Tick ceiling; the run ends in a draw if reached with no winner.
    pub max_ticks: u64,
    /// Scenario to instantiate.
    pub scenario: Scenario,
    /// Blueprint registry; falls back to [`builtin_blueprint_registry`] when `None`.
    pub blueprints: Option<BlueprintRegistry>,
}

/// Outcome of one completed or aborted run.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    /// Winning faction's config id, if the run produced a winner.
    pub winner: Option<String>,
    /// Ticks actually simulated.
    pub ticks_elapsed: u64,
    /// Victory points accumulated per faction id at the end of the run.
    pub victory_points: HashMap<String, u32>,
    /// Live unit/building counts per faction id at the end of the run.
    pub final_faction_strength: HashMap<String, (usize, usize)>,
    /// True if the run ended because `max_ticks` was reached without a winner.
    pub timed_out: bool,
}

/// Runs `config` to completion and reports the outcome. Bounded by
/// `config.max_ticks` and by [`RUN_TIMEOUT`] wall-clock time; logs progress
/// every [`PROGRESS_LOG_INTERVAL`] ticks and warns on any tick slower than
/// [`SLOW_TICK_THRESHOLD`].
pub fn run_game(config: GameConfig) -> Result<GameResult> {
    let blueprints = config.blueprints.clone().unwrap_or_else(builtin_blueprint_registry);
    let (mut sim, faction_names) = build_simulation(&config.scenario, blueprints.clone(), config.seed)?;

    let mut executors: HashMap<FactionId, StrategyExecutor> = HashMap::new();
    for (index, setup) in config.scenario.factions.iter().enumerate() {
        match &setup.ai_controller {
            AiController::Sandbox => {
                executors.insert(FactionId::new(index as u32), StrategyExecutor::new(Strategy::default()));
            }
            AiController::Scripted(name) => {
                executors.insert(FactionId::new(index as u32), StrategyExecutor::new(strategy_by_name(name)));
            }
            AiController::None => {}
        }
    }

    let run_start = Instant::now();
    let mut render = NullSink;
    let mut audio = NullSink;
    let mut timed_out = false;

    for tick in 0..config.max_ticks {
        if run_start.elapsed() > RUN_TIMEOUT {
            tracing::warn!(tick, "run exceeded wall-clock timeout, aborting");
            timed_out = true;
            break;
        }

        let live_entities = sim.units().count() + sim.buildings().count();
        if live_entities > MAX_ENTITIES {
            return Err(SimError::Structural(format!(
                "entity count {live_entities} exceeded MAX_ENTITIES ({MAX_ENTITIES})"
            )));
        }

        if tick % AI_DECISION_INTERVAL_TICKS == 0 {
            for (&faction_id, executor) in &mut executors {
                issue_ai_commands(&mut sim, faction_id, executor, &blueprints);
            }
        }

        let tick_start = Instant::now();
        sim.tick(&mut render, &mut audio);
        let tick_elapsed = tick_start.elapsed();
        if tick_elapsed > SLOW_TICK_THRESHOLD {
            tracing::warn!(tick, ms = tick_elapsed.as_millis(), "slow tick");
        }

        if tick % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!(tick, entities = live_entities, "progress");
        }

        if sim.scenario().and_then(|s| s.outcome).is_some() {
            break;
        }
    }

    if !timed_out && sim.scenario().and_then(|s| s.outcome).is_none() {
        timed_out = true;
    }

    Ok(summarize(&sim, &faction_names, timed_out))
}

/// Build a [`Simulation`] from a loaded scenario: grid, players/factions
/// (at war with every other faction, the default free-for-all setup),
/// starting resources, and starting unit/building placements. Returns the
/// simulation alongside a `FactionId -> config-key` name table used when
/// reporting results.
fn build_simulation(scenario: &Scenario, blueprints: BlueprintRegistry, seed: u64) -> Result<(Simulation, HashMap<FactionId, String>)> {
    let grid = scenario.build_grid();
    let mut sim = Simulation::new(grid, blueprints, seed);
    let mut faction_names = HashMap::new();

    for (index, setup) in scenario.factions.iter().enumerate() {
        let player_id = PlayerId::new(index as u32);
        let faction_id = FactionId::new(index as u32);
        faction_names.insert(faction_id, setup.faction_id.clone());

        let mut player = Player::new(player_id, faction_id, palette_color(index));
        for (&kind, &amount) in &setup.starting_resources {
            let account = player.resources.account_mut(kind);
            account.stock = amount;
            account.yield_per_second = BASELINE_YIELD_PER_SECOND;
        }
        sim.add_player(player);

        for placement in &setup.starting_buildings {
            let building = build_building(player_id, faction_id, grid_to_position(placement.position), &placement.kind);
            sim.spawn_building(building);
        }
        for placement in &setup.starting_units {
            for i in 0..placement.count {
                let offset = Vec2Fixed::new(Fixed::from_num(i as i32) * Fixed::from_num(2), Fixed::ZERO);
                let position = grid_to_position(placement.position) + offset;
                let unit = build_unit(player_id, faction_id, position, &placement.kind);
                sim.spawn_unit(unit);
            }
        }
    }

    for a in 0..scenario.factions.len() {
        for b in (a + 1)..scenario.factions.len() {
            sim.declare_war(FactionId::new(a as u32), FactionId::new(b as u32))?;
        }
    }

    sim.set_scenario(install_scenario_triggers(scenario));
    Ok((sim, faction_names))
}

/// Translate [`crate::scenario::VictoryConditions`] into the live
/// [`TriggerScenario`] the core's event scheduler evaluates each second.
/// Elimination victory is one `NoUnitsLeftFaction` trigger per opposing
/// faction pair; the overall time limit is enforced by [`run_game`]'s own
/// tick budget rather than a trigger (a `TimePassed` event can't express
/// "whoever has the most left wins" on its own).
fn install_scenario_triggers(scenario: &Scenario) -> TriggerScenario {
    let mut triggers = Vec::new();
    if scenario.victory_conditions.elimination {
        for i in 0..scenario.factions.len() {
            let this_player = PlayerId::new(i as u32);
            for j in 0..scenario.factions.len() {
                if i == j {
                    continue;
                }
                let other_faction = FactionId::new(j as u32);
                triggers.push(EventTrigger::new(
                    Condition::NoUnitsLeftFaction { faction: other_faction },
                    vec![Event::Victory { player: this_player }],
                ));
            }
        }
    }
    TriggerScenario {
        player_ids: (0..scenario.factions.len()).map(|i| PlayerId::new(i as u32)).collect(),
        triggers,
        ..Default::default()
    }
}

fn strategy_by_name(name: &str) -> Strategy {
    match name {
        "rush" => Strategy::rush(),
        "economic" => Strategy::economic(),
        "turtle" => Strategy::turtle(),
        "fast_expand" => Strategy::fast_expand(),
        "harassment" => Strategy::harassment(),
        "all_in" => Strategy::all_in(),
        other => {
            tracing::warn!(strategy = other, "unknown scripted strategy, falling back to balanced");
            Strategy::default()
        }
    }
}

fn palette_color(index: usize) -> (u8, u8, u8) {
    const PALETTE: [(u8, u8, u8); 4] = [(200, 60, 60), (60, 90, 200), (60, 180, 90), (200, 170, 60)];
    PALETTE[index % PALETTE.len()]
}

/// Issue this tick's strategic orders for one sandbox/scripted faction:
/// advance its build order (production only — placing new buildings needs
/// a placement-validity model this headless runner doesn't have) and, once
/// attack timing fires, send every combat unit toward the nearest known
/// enemy.
fn issue_ai_commands(sim: &mut Simulation, faction_id: FactionId, executor: &mut StrategyExecutor, blueprints: &BlueprintRegistry) {
    let Some(player_id) = sim.players().find(|p| p.faction_id == faction_id).map(|p| p.id) else {
        return;
    };

    let unit_counts: HashMap<String, u32> = {
        let mut counts = HashMap::new();
        for (_, unit) in sim.units() {
            if unit.common.faction_id == faction_id {
                *counts.entry(unit.unit_type.clone()).or_insert(0) += 1;
            }
        }
        counts
    };
    let steel_stock = sim.player(player_id).map_or(0, |p| p.resources.account(ResourceKind::Steel).stock);
    let current_tick = sim.tick_count();

    if let Some(BuildOrderItem::Unit(unit_type)) = executor.next_item(current_tick, steel_stock, &unit_counts) {
        if blueprints.unit(&unit_type).is_some() {
            let producer = sim.buildings().find(|(_, b)| b.common.faction_id == faction_id && b.production.is_some()).map(|(id, _)| id);
            if let Some(building_id) = producer {
                sim.push_command(Command::StartProduction { building: building_id, unit_type });
            }
        }
    }

    if executor.should_attack(current_tick) {
        let own_units: Vec<EntityId> = sim
            .units()
            .filter(|(_, u)| u.common.faction_id == faction_id && !u.weapons.is_empty())
            .map(|(id, _)| id)
            .collect();
        if own_units.is_empty() {
            return;
        }
        let target = sim
            .buildings()
            .find(|(_, b)| b.common.faction_id != faction_id)
            .map(|(_, b)| b.common.position)
            .or_else(|| sim.units().find(|(_, u)| u.common.faction_id != faction_id).map(|(_, u)| u.common.position));
        if let Some(destination) = target {
            sim.push_command(Command::AttackMove { units: own_units, destination });
        }
    }
}

fn summarize(sim: &Simulation, faction_names: &HashMap<FactionId, String>, timed_out: bool) -> GameResult {
    let mut victory_points = HashMap::new();
    let mut winner = None;
    if let Some(scenario) = sim.scenario() {
        for (&player_id, &points) in &scenario.victory_points {
            if let Some(name) = player_faction_name(sim, faction_names, player_id) {
                victory_points.insert(name, points);
            }
        }
        if let Some(rts_core::triggers::ScenarioOutcome::Victory { player }) = scenario.outcome {
            winner = player_faction_name(sim, faction_names, player);
        }
    }

    let mut final_faction_strength = HashMap::new();
    for faction in sim.factions() {
        if let Some(name) = faction_names.get(&faction.id) {
            final_faction_strength.insert(name.clone(), (faction.units.len(), faction.buildings.len()));
        }
    }

    if winner.is_none() && timed_out {
        let alive: Vec<&String> = final_faction_strength
            .iter()
            .filter(|(_, &(units, buildings))| units + buildings > 0)
            .map(|(name, _)| name)
            .collect();
        if alive.len() == 1 {
            winner = Some(alive[0].clone());
        }
    }

    GameResult {
        winner,
        ticks_elapsed: sim.tick_count(),
        victory_points,
        final_faction_strength,
        timed_out,
    }
}

fn player_faction_name(sim: &Simulation, faction_names: &HashMap<FactionId, String>, player_id: PlayerId) -> Option<String> {
    let faction_id = sim.player(player_id)?.faction_id;
    faction_names.get(&faction_id).cloned()
}

/// Built-in unit/building blueprints (cost, production time) for scenarios
/// that don't supply a config-loaded [`BlueprintRegistry`] of their own
/// (§10.4/§10.7's CSV loader is the real path; this is the headless
/// runner's zero-config fallback).
#[must_use]
pub fn builtin_blueprint_registry() -> BlueprintRegistry {
    let mut registry = BlueprintRegistry::default();
    registry.register_unit(UnitBlueprint {
        id: "harvester".to_string(),
        cost: HashMap::from([(ResourceKind::Steel, 80)]),
        production_time_seconds: Fixed::from_num(8),
    });
    registry.register_unit(UnitBlueprint {
        id: "scout".to_string(),
        cost: HashMap::from([(ResourceKind::Steel, 40)]),
        production_time_seconds: Fixed::from_num(4),
    });
    registry.register_unit(UnitBlueprint {
        id: "infantry".to_string(),
        cost: HashMap::from([(ResourceKind::Conscripts, 1), (ResourceKind::Steel, 30)]),
        production_time_seconds: Fixed::from_num(6),
    });
    registry.register_unit(UnitBlueprint {
        id: "ranger".to_string(),
        cost: HashMap::from([(ResourceKind::Conscripts, 1), (ResourceKind::Steel, 50), (ResourceKind::Electronics, 10)]),
        production_time_seconds: Fixed::from_num(10),
    });
    registry.register_building(BuildingBlueprint {
        id: "command_center".to_string(),
        cost: HashMap::from([(ResourceKind::Steel, 400)]),
        construction_time_seconds: Fixed::from_num(60),
    });
    registry.register_building(BuildingBlueprint {
        id: "barracks".to_string(),
        cost: HashMap::from([(ResourceKind::Steel, 150)]),
        construction_time_seconds: Fixed::from_num(30),
    });
    registry.register_building(BuildingBlueprint {
        id: "turret".to_string(),
        cost: HashMap::from([(ResourceKind::Steel, 100), (ResourceKind::Electronics, 20)]),
        construction_time_seconds: Fixed::from_num(20),
    });
    registry.register_building(BuildingBlueprint {
        id: "supply_depot".to_string(),
        cost: HashMap::from([(ResourceKind::Steel, 100)]),
        construction_time_seconds: Fixed::from_num(15),
    });
    registry
}

struct WeaponSpec {
    name: &'static str,
    damage: u32,
    penetration: u32,
    range: Fixed,
}

fn mounted_weapon(spec: Option<WeaponSpec>, rate_of_fire: Fixed, accuracy: Fixed) -> Vec<Weapon> {
    spec.map(|s| {
        vec![Weapon {
            name: s.name.to_string(),
            damage: s.damage,
            penetration: s.penetration,
            accuracy,
            range: s.range,
            rate_of_fire,
            next_firing_time: 0,
        }]
    })
    .unwrap_or_default()
}

/// Combat/movement stats for one built-in unit type, keyed by
/// `unit_type`. Unknown types fall back to an unarmed scout-speed default
/// rather than fail the spawn outright.
fn build_unit(player_id: PlayerId, faction_id: FactionId, position: Vec2Fixed, unit_type: &str) -> Unit {
    let (kind, max_health, max_speed, armour, weapon) = match unit_type {
        "scout" => (UnitKind::Vehicle, 60, Fixed::from_num(14), 0, None),
        "harvester" => (UnitKind::Vehicle, 90, Fixed::from_num(8), 2, None),
        "infantry" => (
            UnitKind::Soldier,
            100,
            Fixed::from_num(6),
            0,
            Some(WeaponSpec { name: "rifle", damage: 10, penetration: 0, range: Fixed::from_num(8) }),
        ),
        "ranger" => (
            UnitKind::Soldier,
            75,
            Fixed::from_num(6),
            0,
            Some(WeaponSpec { name: "marksman_rifle", damage: 14, penetration: 2, range: Fixed::from_num(16) }),
        ),
        "tank" => (
            UnitKind::VehicleWithTurret,
            220,
            Fixed::from_num(7),
            6,
            Some(WeaponSpec { name: "cannon", damage: 35, penetration: 10, range: Fixed::from_num(12) }),
        ),
        other => {
            tracing::warn!(unit_type = other, "unknown unit type, spawning unarmed placeholder");
            (UnitKind::Vehicle, 50, Fixed::from_num(10), 0, None)
        }
    };

    let weapons = mounted_weapon(weapon, Fixed::from_num(1), Fixed::from_num(70));

    Unit {
        common: PlayerEntityCommon {
            id: EntityId::new(0),
            player_id,
            faction_id,
            position,
            health: max_health,
            max_health,
            cover: Fixed::ZERO,
            visibility_radius: Fixed::from_num(6),
            known_enemies: Default::default(),
            enemy_assigned_by_player: None,
            targeted_enemy: None,
            immortal: false,
        },
        kind,
        unit_type: unit_type.to_string(),
        current_node: rts_core::grid::position_to_grid(position),
        reserved_node: None,
        facing_direction: 0,
        turret_facing_direction: None,
        virtual_angle: Fixed::ZERO,
        max_speed,
        rotation_speed: Fixed::from_num(180),
        path: Default::default(),
        awaited_path: None,
        path_wait_deadline: None,
        armour,
        attack_radius: weapons.first().map_or(Fixed::ZERO, |w| w.range),
        weapons,
        permanent_units_group: None,
        navigating_group: None,
        outside: true,
        forced_destination: false,
    }
}

/// Construction/defensive stats for one built-in building type. Buildings
/// that can produce units get a fresh [`ProductionState`]; defensive
/// buildings get a mounted weapon instead.
fn build_building(player_id: PlayerId, faction_id: FactionId, position: Vec2Fixed, building_type: &str) -> Building {
    let (max_health, armour, produces, weapon) = match building_type {
        "command_center" => (1000, 10, true, None),
        "barracks" => (600, 5, true, None),
        "turret" => (
            300,
            8,
            false,
            Some(WeaponSpec { name: "auto_cannon", damage: 18, penetration: 4, range: Fixed::from_num(18) }),
        ),
        "supply_depot" => (400, 2, false, None),
        other => {
            tracing::warn!(building_type = other, "unknown building type, spawning inert placeholder");
            (200, 0, false, None)
        }
    };

    let weapons = mounted_weapon(weapon, Fixed::from_num(2), Fixed::from_num(80));
    let attack_radius = weapons.first().map_or(Fixed::ZERO, |w| w.range);
    let mut occupied_nodes = std::collections::HashSet::new();
    occupied_nodes.insert(rts_core::grid::position_to_grid(position));

    Building {
        common: PlayerEntityCommon {
            id: EntityId::new(0),
            player_id,
            faction_id,
            position,
            health: max_health,
            max_health,
            cover: Fixed::ZERO,
            visibility_radius: Fixed::from_num(8),
            known_enemies: Default::default(),
            enemy_assigned_by_player: None,
            targeted_enemy: None,
            immortal: false,
        },
        building_type: building_type.to_string(),
        occupied_nodes,
        energy_consumption: 0,
        energy_production: 0,
        power_ratio: Fixed::ONE,
        production: if produces { Some(ProductionState::default()) } else { None },
        extractor: None,
        research: None,
        garrison: None,
        deployment_point: None,
        spawn_point: position,
        armour,
        weapons,
        attack_radius,
    }
}
