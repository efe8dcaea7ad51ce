//! The per-tick game loop (C10, §2, §4.10).
//!
//! `Simulation` owns every arena this crate defines — the [`Grid`], the
//! [`QuadTree`], unit/building tables, player/faction tables, the
//! [`Pathfinder`], [`FogOfWar`], [`EventScheduler`], an optional [`Scenario`],
//! and a [`DeterministicRng`] — and drives them through one [`Simulation::tick`]
//! call per frame, in the order §2 specifies: scheduler → scenario triggers →
//! factions/players → pathfinder → units → buildings → fog of war →
//! collaborators read the result.
//!
//! Cross-references between entities are resolved through [`EntityId`]
//! rather than pointers (§9's arena-plus-id indirection), so the simulation
//! itself is the only thing allowed to walk two entities' state at once —
//! every other module in this crate operates on at most one entity (plus
//! shared read-only structures like the `Grid`) per call.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::combat::{self, HitChanceContext, ShotOutcome};
use crate::entity::{Building, EntityId, PlayerEntityCommon, PlayerEntityRef, Unit, UnitKind, Weapon};
use crate::error::{Result, SimError};
use crate::fog_of_war::{self, FogOfWar};
use crate::grid::{self, Grid, GridPosition};
use crate::interfaces::{AudioSink, Command, CommandQueue, RenderSink};
use crate::math::{Fixed, Vec2Fixed};
use crate::movement::{self, CollisionResolution, CollisionScan, FollowPathAction};
use crate::pathfinding::{self, PathResult, Pathfinder, WaypointsQueue};
use crate::player::{start_war_with, Faction, FactionId, Player, PlayerId, ResourceKind};
use crate::production::{BlueprintRegistry, ProductionTick};
use crate::rng::DeterministicRng;
use crate::scheduler::{EventScheduler, MethodTag, ScheduledEvent};
use crate::triggers::{ConditionContext, Event, Scenario};

/// Fixed simulation tick rate (§5: "one simulation thread advances ticks at
/// a fixed rate (default 60 Hz)").
pub const TICKS_PER_SECOND: u64 = 60;

/// How often the scheduler re-evaluates scenario triggers, in ticks (§4.9:
/// "the scheduler periodically (default 1 s)").
const TRIGGER_EVALUATION_INTERVAL_TICKS: u64 = TICKS_PER_SECOND;

/// How often per-player resources accrue, in ticks (§4.7: "every second").
const RESOURCE_ACCRUAL_INTERVAL_TICKS: u64 = TICKS_PER_SECOND;

/// Monotonic id allocator for units and buildings alike — both arenas draw
/// from the same counter so an `EntityId` is never ambiguous between them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    fn allocate(&mut self) -> EntityId {
        let id = EntityId::new(self.next);
        self.next += 1;
        id
    }
}

/// Everything the simulation needs to know about a player's placement of a
/// newly spawned unit (§4.7's "spawn(u) at spawn_point ... if
/// deployment_point set, is ordered there").
#[derive(Debug, Clone)]
pub struct SpawnedUnit {
    /// The new unit's id.
    pub unit: EntityId,
    /// Where it appeared.
    pub spawn_point: Vec2Fixed,
    /// Where it should be ordered to move, if the producer has a
    /// deployment point set.
    pub deployment_point: Option<Vec2Fixed>,
}

/// The full simulation state for one running scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    tick: u64,
    ids: EntityIdAllocator,

    grid: Grid,
    quadtree: crate::quadtree::QuadTree,

    units: HashMap<EntityId, Unit>,
    buildings: HashMap<EntityId, Building>,

    players: HashMap<PlayerId, Player>,
    factions: HashMap<FactionId, Faction>,

    pathfinder: Pathfinder,
    navigating_groups: HashMap<u32, crate::pathfinding::NavigatingGroup>,
    waypoint_queues: HashMap<EntityId, WaypointsQueue>,
    fog_of_war: FogOfWar,
    scheduler: EventScheduler,
    scenario: Option<Scenario>,
    blueprints: BlueprintRegistry,
    rng: DeterministicRng,

    commands: CommandQueue,
    paused: bool,
    /// Set by [`MethodTag::EvaluateEventTriggers`], consumed by
    /// [`Self::evaluate_scenario_triggers_if_due`] (§4.9's "scheduler
    /// notifies, triggers evaluate on the next tick boundary").
    triggers_due: bool,
}

impl Simulation {
    /// Construct a fresh simulation over `grid`, seeded for deterministic
    /// combat rolls. Schedules the two standing recurring events every
    /// scenario needs: resource accrual and trigger evaluation (§4.7, §4.9).
    #[must_use]
    pub fn new(grid: Grid, blueprints: BlueprintRegistry, seed: u64) -> Self {
        let quadtree = crate::quadtree::QuadTree::new(Self::world_bounds(&grid));
        let fog_of_war = FogOfWar::new(&grid);

        let mut scheduler = EventScheduler::new();
        scheduler.schedule(ScheduledEvent {
            tag: MethodTag::AccruePlayerResources,
            delay_ticks: RESOURCE_ACCRUAL_INTERVAL_TICKS,
            repeat: -1,
        });
        scheduler.schedule(ScheduledEvent {
            tag: MethodTag::EvaluateEventTriggers,
            delay_ticks: TRIGGER_EVALUATION_INTERVAL_TICKS,
            repeat: -1,
        });

        Self {
            tick: 0,
            ids: EntityIdAllocator::default(),
            grid,
            quadtree,
            units: HashMap::new(),
            buildings: HashMap::new(),
            players: HashMap::new(),
            factions: HashMap::new(),
            pathfinder: Pathfinder::new(),
            navigating_groups: HashMap::new(),
            waypoint_queues: HashMap::new(),
            fog_of_war,
            scheduler,
            scenario: None,
            blueprints,
            rng: DeterministicRng::new(seed),
            commands: CommandQueue::new(),
            paused: false,
            triggers_due: false,
        }
    }

    fn world_bounds(grid: &Grid) -> crate::quadtree::Rect {
        let width = grid::tile_width() * crate::math::Fixed::from_num(grid.columns);
        let height = grid::tile_height() * crate::math::Fixed::from_num(grid.rows);
        crate::quadtree::Rect::new(width / crate::math::Fixed::from_num(2), height / crate::math::Fixed::from_num(2), width, height)
    }

    /// Elapsed ticks since construction.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Read-only access to the tile map.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Read-only access to the fog of war.
    #[must_use]
    pub const fn fog_of_war(&self) -> &FogOfWar {
        &self.fog_of_war
    }

    /// Read-only access to the active scenario, if any.
    #[must_use]
    pub const fn scenario(&self) -> Option<&Scenario> {
        self.scenario.as_ref()
    }

    /// Install a scenario (trigger set, victory conditions).
    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.scenario = Some(scenario);
    }

    /// Look up a unit by id.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Look up a building by id.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Look up a player by id.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Look up a faction by id.
    #[must_use]
    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    /// Iterate every live unit (id, data), arena order unspecified.
    pub fn units(&self) -> impl Iterator<Item = (EntityId, &Unit)> {
        self.units.iter().map(|(&id, unit)| (id, unit))
    }

    /// Iterate every live building (id, data), arena order unspecified.
    pub fn buildings(&self) -> impl Iterator<Item = (EntityId, &Building)> {
        self.buildings.iter().map(|(&id, building)| (id, building))
    }

    /// Iterate every registered player.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Iterate every registered faction.
    pub fn factions(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values()
    }

    /// Register a player, creating its faction entry if this is the
    /// faction's first player.
    pub fn add_player(&mut self, player: Player) {
        self.factions
            .entry(player.faction_id)
            .or_insert_with(|| Faction::new(player.faction_id, player.id));
        self.players.insert(player.id, player);
    }

    /// Declare war between two factions (symmetric, atomic — §5). A no-op
    /// if `a` and `b` are the same faction.
    pub fn declare_war(&mut self, a: FactionId, b: FactionId) -> Result<()> {
        if a == b {
            return Ok(());
        }
        let mut fa = self
            .factions
            .remove(&a)
            .ok_or_else(|| SimError::Structural(format!("unknown faction in declare_war({a:?}, {b:?})")))?;
        let result = match self.factions.get_mut(&b) {
            Some(fb) => {
                start_war_with(&mut fa, fb);
                Ok(())
            }
            None => Err(SimError::Structural(format!("unknown faction in declare_war({a:?}, {b:?})"))),
        };
        self.factions.insert(a, fa);
        result
    }

    /// Spawn a unit, inserting it into the unit arena, the grid, and the
    /// quadtree. Returns the new entity's id.
    pub fn spawn_unit(&mut self, mut unit: Unit) -> EntityId {
        let id = self.ids.allocate();
        unit.common.id = id;
        unit.current_node = grid::position_to_grid(unit.common.position);
        self.grid.set_unit(unit.current_node, Some(id));
        self.quadtree.insert(crate::quadtree::IndexedEntity {
            id,
            faction_id: unit.common.faction_id,
            position: unit.common.position,
        });
        if let Some(faction) = self.factions.get_mut(&unit.common.faction_id) {
            faction.units.insert(id);
        }
        self.units.insert(id, unit);
        id
    }

    /// Spawn a building, occupying every node in `occupied_nodes`.
    pub fn spawn_building(&mut self, mut building: Building) -> EntityId {
        let id = self.ids.allocate();
        building.common.id = id;
        for node in &building.occupied_nodes {
            self.grid.set_building(*node, Some(id));
        }
        self.quadtree.insert(crate::quadtree::IndexedEntity {
            id,
            faction_id: building.common.faction_id,
            position: building.common.position,
        });
        if let Some(faction) = self.factions.get_mut(&building.common.faction_id) {
            faction.buildings.insert(id);
        }
        self.buildings.insert(id, building);
        id
    }

    /// Kill a unit: detach it from player/faction bookkeeping, clear its
    /// grid node, and remove it from the quadtree (§4.4's `kill()`
    /// contract). A no-op if `id` isn't a live unit (idempotence, §8).
    pub fn kill_unit(&mut self, id: EntityId) {
        let Some(unit) = self.units.remove(&id) else {
            return;
        };
        self.grid.set_unit(unit.current_node, None);
        self.quadtree.remove(unit.common.faction_id, id);
        if let Some(faction) = self.factions.get_mut(&unit.common.faction_id) {
            faction.units.remove(&id);
        }
        self.pathfinder.cancel_unit_path_requests(id);
    }

    /// Kill a building: unblock its occupied nodes and remove it from the
    /// spatial index (§4.4). A no-op if `id` isn't a live building.
    pub fn kill_building(&mut self, id: EntityId) {
        let Some(building) = self.buildings.remove(&id) else {
            return;
        };
        for node in &building.occupied_nodes {
            self.grid.set_building(*node, None);
        }
        self.quadtree.remove(building.common.faction_id, id);
        if let Some(faction) = self.factions.get_mut(&building.common.faction_id) {
            faction.buildings.remove(&id);
        }
    }

    /// Push a decoded command onto the queue; picked up at the start of the
    /// next [`Self::tick`].
    pub fn push_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Toggle simulation pause. While paused, [`Self::tick`] still drains
    /// commands (so `TogglePause` itself can un-pause) but advances nothing
    /// else.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Advance the simulation by exactly one tick, following §2's per-tick
    /// data-flow order. `render`/`audio` receive every collaborator
    /// notification this tick produced; pass [`crate::interfaces::NullSink`]
    /// for headless runs that don't care.
    pub fn tick<R: RenderSink, A: AudioSink>(&mut self, render: &mut R, audio: &mut A) {
        self.process_commands(audio);
        if self.paused {
            return;
        }

        self.tick += 1;

        self.run_scheduler(audio);
        self.evaluate_scenario_triggers_if_due();
        self.clear_known_enemies();
        self.advance_pathfinder();
        self.update_units(render, audio);
        self.update_buildings();
        let delta = self.fog_of_war.update();
        render.on_fog_delta(&delta);
    }

    fn process_commands<A: AudioSink>(&mut self, audio: &mut A) {
        let commands: Vec<Command> = self.commands.drain().collect();
        for command in commands {
            match command {
                // Selection and placeable-tool state are UI-collaborator
                // concerns (§6) the core never tracks.
                Command::SelectUnits(_) | Command::AttachPlaceableGameObject(_) => {}
                Command::MoveTo { units, destination } | Command::AttackMove { units, destination } => {
                    self.handle_move_to(units, destination);
                }
                Command::Attack { units, target } => {
                    for unit_id in units {
                        if let Some(unit) = self.units.get_mut(&unit_id) {
                            unit.common.enemy_assigned_by_player = Some(target);
                        }
                    }
                }
                Command::EnqueueWaypoint { units, destination } => {
                    let waypoint = grid::position_to_grid(destination);
                    for unit_id in units {
                        self.waypoint_queues.entry(unit_id).or_default().enqueue(waypoint);
                    }
                }
                Command::Stop(units) => {
                    for unit_id in units {
                        if let Some(unit) = self.units.get_mut(&unit_id) {
                            unit.stop_completely();
                        }
                        self.waypoint_queues.remove(&unit_id);
                    }
                }
                Command::PlaceBuilding { player, building_type, at } => {
                    self.handle_place_building(audio, player, building_type, at);
                }
                Command::StartProduction { building, unit_type } => {
                    self.handle_start_production(audio, building, unit_type);
                }
                Command::CancelProduction { building, unit_type } => {
                    self.handle_cancel_production(building, unit_type);
                }
                Command::TogglePause => self.toggle_pause(),
            }
        }
    }

    /// `MoveTo`/`AttackMove` handler (§4.3). A single unit gets a direct A*
    /// request; more than one uses [`Pathfinder::group_navigate`]'s shared
    /// long path sliced into per-unit waypoint rings, so a squad doesn't
    /// collapse onto one exact tile. `AttackMove` is dispatched identically:
    /// combat's own known-enemies scan already engages anything encountered
    /// en route regardless of how the unit got its path, and
    /// `forced_destination` (not a separate attack-move flag) is what keeps
    /// the order from being abandoned mid-route.
    fn handle_move_to(&mut self, units: Vec<EntityId>, destination: Vec2Fixed) {
        if units.is_empty() {
            return;
        }
        let dest_node = grid::position_to_grid(destination);

        if units.len() == 1 {
            let unit_id = units[0];
            if let Some(unit) = self.units.get_mut(&unit_id) {
                unit.stop_completely();
                unit.forced_destination = true;
                self.pathfinder.request_path(unit_id, unit.current_node, dest_node);
            }
            return;
        }

        let lead_start = self
            .units
            .get(&units[0])
            .map(|u| u.current_node)
            .unwrap_or(dest_node);
        let group = self.pathfinder.group_navigate(&self.grid, units.clone(), lead_start, dest_node);
        let group_id = group.id;
        self.navigating_groups.insert(group_id, group);

        for unit_id in units {
            if let Some(unit) = self.units.get_mut(&unit_id) {
                unit.stop_completely();
                unit.forced_destination = true;
                unit.navigating_group = Some(group_id);
            }
            self.advance_group_waypoint(unit_id, group_id);
        }
    }

    /// Pop `unit_id`'s next leg off navigating group `group_id` and request
    /// the A* path to it; drops the group membership once its waypoint list
    /// is exhausted.
    fn advance_group_waypoint(&mut self, unit_id: EntityId, group_id: u32) {
        let Some(group) = self.navigating_groups.get_mut(&group_id) else {
            return;
        };
        let next_waypoint = group.waypoints.get_mut(&unit_id).and_then(Vec::pop);
        let Some(next_waypoint) = next_waypoint else {
            self.navigating_groups.remove(&group_id);
            if let Some(unit) = self.units.get_mut(&unit_id) {
                unit.navigating_group = None;
            }
            return;
        };
        if let Some(unit) = self.units.get(&unit_id) {
            self.pathfinder.request_path(unit_id, unit.current_node, next_waypoint);
        }
    }

    /// `PlaceBuilding` handler (§4.7, §7's resource-deficit contract). Costs
    /// are validated in full before anything is deducted; a short fall on
    /// any one resource plays `"not-enough-resource"` and places nothing.
    /// Combat stats (armour, weapons) for the spawned building are not part
    /// of [`BuildingBlueprint`] (§10.4's distilled config schema has no
    /// column for them yet) — placed buildings spawn unarmed, a known
    /// simplification recorded in DESIGN.md.
    fn handle_place_building<A: AudioSink>(
        &mut self,
        audio: &mut A,
        player: PlayerId,
        building_type: String,
        at: GridPosition,
    ) {
        let Some(blueprint) = self.blueprints.building(&building_type).cloned() else {
            tracing::warn!(building_type, "unknown building blueprint");
            return;
        };
        let Some(player_state) = self.players.get(&player) else {
            return;
        };
        for (&kind, &amount) in &blueprint.cost {
            if !player_state.resources.has_at_least(kind, amount) {
                audio.play_sound("not-enough-resource");
                return;
            }
        }
        if let Some(player_state) = self.players.get_mut(&player) {
            for (&kind, &amount) in &blueprint.cost {
                player_state.resources.deduct(kind, amount);
            }
        }

        let faction_id = self.players.get(&player).map_or(FactionId::new(0), |p| p.faction_id);
        let position = grid::grid_to_position(at);
        let building = Building {
            common: PlayerEntityCommon {
                id: EntityId::new(0),
                player_id: player,
                faction_id,
                position,
                health: 100,
                max_health: 100,
                cover: Fixed::ZERO,
                visibility_radius: Fixed::from_num(6),
                known_enemies: HashSet::new(),
                enemy_assigned_by_player: None,
                targeted_enemy: None,
                immortal: false,
            },
            building_type,
            occupied_nodes: std::iter::once(at).collect(),
            energy_consumption: 0,
            energy_production: 0,
            power_ratio: Fixed::ONE,
            production: None,
            extractor: None,
            research: None,
            garrison: None,
            deployment_point: None,
            spawn_point: position,
            armour: 0,
            weapons: Vec::new(),
            attack_radius: Fixed::ZERO,
        };
        self.spawn_building(building);
        audio.play_sound("building-placed");
    }

    /// `StartProduction` handler (§4.7). Deducts cost up front, matching
    /// `ProductionState::start_production`'s immediate-transition-if-idle
    /// contract.
    fn handle_start_production<A: AudioSink>(&mut self, audio: &mut A, building: EntityId, unit_type: String) {
        let Some(blueprint) = self.blueprints.unit(&unit_type).cloned() else {
            tracing::warn!(unit_type, "unknown unit blueprint");
            return;
        };
        let Some(player_id) = self.buildings.get(&building).map(|b| b.common.player_id) else {
            return;
        };
        let Some(player_state) = self.players.get(&player_id) else {
            return;
        };
        for (&kind, &amount) in &blueprint.cost {
            if !player_state.resources.has_at_least(kind, amount) {
                audio.play_sound("not-enough-resource");
                return;
            }
        }
        if let Some(player_state) = self.players.get_mut(&player_id) {
            for (&kind, &amount) in &blueprint.cost {
                player_state.resources.deduct(kind, amount);
            }
        }

        let time_ticks = blueprint.production_time_seconds * Fixed::from_num(TICKS_PER_SECOND);
        if let Some(building_mut) = self.buildings.get_mut(&building) {
            if let Some(production) = building_mut.production.as_mut() {
                production.start_production(unit_type, time_ticks);
                audio.play_sound("production-started");
            }
        }
    }

    /// `CancelProduction` handler (§4.7). Refunds the fraction
    /// [`crate::production::ProductionState::cancel_production`] reports,
    /// then re-derives the now-front item's tick budget from its own
    /// blueprint (that call leaves `production_time` at zero since it has no
    /// blueprint lookup of its own).
    fn handle_cancel_production(&mut self, building: EntityId, unit_type: String) {
        let Some(building_mut) = self.buildings.get_mut(&building) else {
            return;
        };
        let Some(production) = building_mut.production.as_mut() else {
            return;
        };
        let Some(refund_fraction) = production.cancel_production(&unit_type) else {
            return;
        };
        let player_id = building_mut.common.player_id;

        if let Some(blueprint) = self.blueprints.unit(&unit_type) {
            let refunds: Vec<(ResourceKind, i64)> = blueprint
                .cost
                .iter()
                .map(|(&kind, &amount)| (kind, (Fixed::from_num(amount) * refund_fraction).to_num::<i64>()))
                .collect();
            if let Some(player_state) = self.players.get_mut(&player_id) {
                for (kind, amount) in refunds {
                    player_state.resources.credit(kind, amount);
                }
            }
        }

        if let Some(building_mut) = self.buildings.get_mut(&building) {
            if let Some(production) = building_mut.production.as_mut() {
                if production.production_time() == Fixed::ZERO {
                    if let Some(next_type) = production.currently_produced().map(str::to_string) {
                        if let Some(bp) = self.blueprints.unit(&next_type) {
                            let time_ticks = bp.production_time_seconds * Fixed::from_num(TICKS_PER_SECOND);
                            production.set_production_time(time_ticks);
                        }
                    }
                }
            }
        }
    }

    /// Drain this tick's due scheduler entries and dispatch each by tag
    /// (§4.8). `EvaluateEventTriggers` only flips a flag: the actual
    /// evaluation runs later in the tick's data-flow order (§2), after
    /// units/buildings have updated, so a trigger firing this tick sees
    /// up-to-date counts.
    fn run_scheduler<A: AudioSink>(&mut self, audio: &mut A) {
        let due = self.scheduler.update();
        for tag in due {
            match tag {
                MethodTag::AccruePlayerResources => {
                    for player in self.players.values_mut() {
                        player.resources.accrue_one_second();
                    }
                }
                MethodTag::EvaluateEventTriggers => self.triggers_due = true,
                MethodTag::RetryAwaitedPath { unit } => self.retry_awaited_path(unit),
                MethodTag::CreditExtractedResource { player, kind, amount } => {
                    if let Some(player_state) = self.players.get_mut(&player) {
                        player_state.resources.credit(kind, amount);
                    }
                }
            }
        }
        let _ = audio;
    }

    /// Escalation for a unit that has been waiting out a collision for a
    /// full second (§4.5, §5's 1 s backoff): rather than let
    /// [`crate::movement::follow_path`]'s own deadline check extend the wait
    /// forever, force a brand new A* request to the awaited path's final
    /// destination. A no-op if the unit already resumed on its own (deadline
    /// cleared) before this fired.
    fn retry_awaited_path(&mut self, unit_id: EntityId) {
        let Some(unit) = self.units.get_mut(&unit_id) else {
            return;
        };
        if unit.path_wait_deadline.is_none() {
            return;
        }
        let Some(awaited) = unit.awaited_path.take() else {
            return;
        };
        let destination = awaited.back().copied();
        unit.path_wait_deadline = None;
        if let Some(destination) = destination {
            let start = unit.current_node;
            self.pathfinder.request_path(unit_id, start, destination);
        }
    }

    /// Start-of-tick known-enemies clear, ahead of this tick's vision scan
    /// repopulating it (§2: "Factions/Players update (economy, known-enemies
    /// clear)").
    fn clear_known_enemies(&mut self) {
        for player in self.players.values_mut() {
            player.clear_known_enemies();
        }
        for faction in self.factions.values_mut() {
            faction.known_enemies.clear();
        }
        for unit in self.units.values_mut() {
            unit.common.known_enemies.clear();
        }
        for building in self.buildings.values_mut() {
            building.common.known_enemies.clear();
        }
    }

    /// Process at most one outstanding path request and apply its result to
    /// the waiting unit (§4.3, §5's one-path-step-per-tick budget).
    fn advance_pathfinder(&mut self) {
        let Some(result) = self.pathfinder.update(&self.grid) else {
            return;
        };
        match result {
            PathResult::Found { unit, path } => {
                if let Some(unit) = self.units.get_mut(&unit) {
                    unit.path = path.into_iter().collect();
                    unit.awaited_path = None;
                    unit.path_wait_deadline = None;
                }
            }
            PathResult::NotFound { unit } => {
                if let Some(unit) = self.units.get_mut(&unit) {
                    unit.path.clear();
                }
            }
        }
    }

    /// Per-entity vision radius in world-space units (§4.6's radius is
    /// expressed in tiles; the quadtree works in world-space, so this
    /// converts using the tile width — tiles are not square, but a single
    /// scalar scan radius needs one axis to anchor to).
    fn vision_world_radius(visibility_radius: Fixed) -> Fixed {
        visibility_radius * grid::tile_width()
    }

    /// Advance every unit's movement/collision/vision/combat state machine
    /// by one tick, in §4.5's ordered steps, interleaved with the
    /// quadtree/fog-of-war bookkeeping only the simulation can do (each
    /// unit is briefly removed from `self.units` so its processing can read
    /// other units and the shared `Grid`/`QuadTree` without aliasing a
    /// second mutable borrow of the same map).
    fn update_units<R: RenderSink, A: AudioSink>(&mut self, render: &mut R, audio: &mut A) {
        let unit_ids: Vec<EntityId> = self.units.keys().copied().collect();
        let now = self.tick;

        for id in unit_ids {
            let Some(mut unit) = self.units.remove(&id) else {
                continue;
            };

            let old_row = unit.current_node.row;
            let moved = movement::update_current_node(&mut unit, &mut self.grid);
            if moved {
                self.quadtree.remove(unit.common.faction_id, id);
                self.quadtree.insert(crate::quadtree::IndexedEntity {
                    id,
                    faction_id: unit.common.faction_id,
                    position: unit.common.position,
                });
                render.on_entity_moved(id, unit.current_node.row != old_row);
            }
            movement::reserve_lookahead(&mut unit);

            let revealed = fog_of_war::observed_area(&self.grid, unit.current_node, unit.common.visibility_radius);
            self.fog_of_war.reveal_nodes(&revealed);

            let hostile_factions = self
                .factions
                .get(&unit.common.faction_id)
                .map_or_else(HashSet::new, |f| f.enemies.clone());
            if !hostile_factions.is_empty() {
                let radius = Self::vision_world_radius(unit.common.visibility_radius);
                let seen = self.quadtree.find_visible_entities_in_circle(
                    unit.common.position.x,
                    unit.common.position.y,
                    radius,
                    &hostile_factions,
                );
                unit.common.known_enemies = seen.iter().map(|e| e.id).collect();
                if let Some(player) = self.players.get_mut(&unit.common.player_id) {
                    player.known_enemies.extend(unit.common.known_enemies.iter().copied());
                }
                if let Some(faction) = self.factions.get_mut(&unit.common.faction_id) {
                    faction.known_enemies.extend(unit.common.known_enemies.iter().copied());
                }
            }

            match movement::collision_scan(&unit, &self.grid) {
                CollisionScan::Clear => {}
                CollisionScan::BlockedByObstacle => {
                    if let Some(&destination) = unit.path.back() {
                        self.pathfinder.request_path(id, unit.current_node, destination);
                    }
                    unit.path.clear();
                }
                CollisionScan::BlockedByUnit(blocker_id) => {
                    let (blocker_is_moving, blocker_is_enemy, blocker_adjacent) = self
                        .units
                        .get(&blocker_id)
                        .map(|blocker| {
                            (
                                !blocker.path.is_empty(),
                                hostile_factions.contains(&blocker.common.faction_id),
                                self.grid
                                    .walkable_adjacent_at(blocker.current_node)
                                    .into_iter()
                                    .map(|n| n.grid)
                                    .collect::<Vec<_>>(),
                            )
                        })
                        .unwrap_or((false, false, Vec::new()));

                    match movement::decide_collision_avoidance(
                        &unit,
                        blocker_id,
                        blocker_is_moving,
                        blocker_is_enemy,
                        &blocker_adjacent,
                        &self.grid,
                    ) {
                        CollisionResolution::Wait { blocker: _ } => {
                            unit.awaited_path = Some(std::mem::take(&mut unit.path));
                            unit.path_wait_deadline = Some(now + TICKS_PER_SECOND);
                            self.scheduler.schedule(ScheduledEvent {
                                tag: MethodTag::RetryAwaitedPath { unit: id },
                                delay_ticks: TICKS_PER_SECOND,
                                repeat: 0,
                            });
                        }
                        CollisionResolution::Reroute { via } => unit.path.push_front(via),
                        CollisionResolution::OrderBlockerToMove { blocker, destination } => {
                            if let Some(blocker_unit) = self.units.get_mut(&blocker) {
                                blocker_unit.path.push_back(destination);
                            }
                        }
                        CollisionResolution::RequestFreshPath => {
                            if let Some(&destination) = unit.path.back() {
                                self.pathfinder.request_path(id, unit.current_node, destination);
                            }
                            unit.path.clear();
                        }
                    }
                }
            }

            let health_ratio = unit.common.health_ratio();
            let action = movement::follow_path(&mut unit, &self.grid, now, TICKS_PER_SECOND, health_ratio);
            if let FollowPathAction::Move { velocity } = action {
                unit.common.position = unit.common.position + velocity;
            }

            let needs_next_leg = action == FollowPathAction::WaypointReached && unit.path.is_empty();
            let group_id = unit.navigating_group;
            if needs_next_leg && group_id.is_none() {
                if let Some(queue) = self.waypoint_queues.get_mut(&id) {
                    if let Some(next) = queue.consume_next() {
                        self.pathfinder.request_path(id, unit.current_node, next);
                    }
                }
            }

            self.units.insert(id, unit);
            if needs_next_leg {
                if let Some(group_id) = group_id {
                    self.advance_group_waypoint(id, group_id);
                }
            }
        }

        let (dead_units, dead_buildings) = self.resolve_combat(audio);
        for id in dead_units {
            self.kill_unit(id);
        }
        for id in dead_buildings {
            self.kill_building(id);
        }
    }

    /// Resolve one tick's weapons fire for every armed unit and defensive
    /// building (§4.4's `attack(enemy)`/`on_being_damaged` contract).
    /// Returns the ids that died this tick so the caller can run `kill_unit`/
    /// `kill_building` after both arenas have finished firing (a building's
    /// defensive weapon and a unit's weapon might kill the same target in
    /// the same tick; removing entities mid-scan would make the `shooter_id`
    /// removal above this function unsound for the other collection).
    fn resolve_combat<A: AudioSink>(&mut self, audio: &mut A) -> (Vec<EntityId>, Vec<EntityId>) {
        let mut dead_units = Vec::new();
        let mut dead_buildings = Vec::new();
        let now = self.tick;

        let unit_shooters: Vec<EntityId> = self.units.keys().copied().collect();
        for shooter_id in unit_shooters {
            let Some(mut shooter) = self.units.remove(&shooter_id) else {
                continue;
            };
            self.fire_weapons(&mut shooter.weapons, &mut shooter.common, now, audio, &mut dead_units, &mut dead_buildings);
            self.units.insert(shooter_id, shooter);
        }

        let building_shooters: Vec<EntityId> = self
            .buildings
            .iter()
            .filter(|(_, b)| !b.weapons.is_empty())
            .map(|(id, _)| *id)
            .collect();
        for shooter_id in building_shooters {
            let Some(mut shooter) = self.buildings.remove(&shooter_id) else {
                continue;
            };
            self.fire_weapons(&mut shooter.weapons, &mut shooter.common, now, audio, &mut dead_units, &mut dead_buildings);
            self.buildings.insert(shooter_id, shooter);
        }

        (dead_units, dead_buildings)
    }

    /// Fire every ready weapon in `weapons` at `shooter_common`'s selected
    /// target (§4.4's target-selection then per-weapon `shoot` loop).
    /// `shooter`/target are never both borrowed from the same map at once:
    /// the caller already removed the shooter, and candidate/target lookups
    /// below only ever read or mutate the *other* entity's map entry.
    fn fire_weapons<A: AudioSink>(
        &mut self,
        weapons: &mut [Weapon],
        shooter_common: &mut PlayerEntityCommon,
        now: u64,
        audio: &mut A,
        dead_units: &mut Vec<EntityId>,
        dead_buildings: &mut Vec<EntityId>,
    ) {
        if weapons.is_empty() || shooter_common.known_enemies.is_empty() {
            return;
        }

        let candidates: Vec<(EntityId, bool, i32)> = shooter_common
            .known_enemies
            .iter()
            .filter_map(|&enemy_id| {
                self.units
                    .get(&enemy_id)
                    .map(|u| (enemy_id, !u.weapons.is_empty(), u.common.health))
                    .or_else(|| self.buildings.get(&enemy_id).map(|b| (enemy_id, !b.weapons.is_empty(), b.common.health)))
            })
            .collect();
        let Some(target_id) = combat::select_target(&candidates, shooter_common.enemy_assigned_by_player) else {
            return;
        };
        shooter_common.targeted_enemy = Some(target_id);

        let target_is_building = self.buildings.contains_key(&target_id);
        let target_armour = self
            .units
            .get(&target_id)
            .map_or(0, |u| u.armour)
            .max(self.buildings.get(&target_id).map_or(0, |b| b.armour));
        let target_cover = self
            .units
            .get(&target_id)
            .map_or(Fixed::ZERO, |u| u.common.cover)
            .max(self.buildings.get(&target_id).map_or(Fixed::ZERO, |b| b.common.cover));
        let ctx = HitChanceContext {
            target_is_building,
            target_cover,
            ..Default::default()
        };

        for weapon_index in combat::ready_weapon_indices(weapons, now) {
            let outcome = combat::shoot(&mut weapons[weapon_index], now, target_armour, &ctx, &mut self.rng);
            if outcome != ShotOutcome::Hit {
                continue;
            }
            let damage = weapons[weapon_index].damage;
            let penetration = weapons[weapon_index].penetration;
            let killed = if let Some(target) = self.units.get_mut(&target_id) {
                combat::apply_damage(&mut target.common, damage, penetration, target_armour, combat::DEFAULT_DAMAGE_RANDOMNESS_STD_DEV, &mut self.rng)
            } else if let Some(target) = self.buildings.get_mut(&target_id) {
                combat::apply_damage(&mut target.common, damage, penetration, target_armour, combat::DEFAULT_DAMAGE_RANDOMNESS_STD_DEV, &mut self.rng)
            } else {
                false
            };
            if killed {
                audio.play_sound("unit-lost");
                if self.units.contains_key(&target_id) {
                    dead_units.push(target_id);
                } else {
                    dead_buildings.push(target_id);
                }
            }
        }
    }

    /// Advance every building's production/extraction/research state
    /// machines by one tick (§4.7), defensive-building vision, and spawn any
    /// unit whose production completed this tick.
    fn update_buildings(&mut self) {
        let building_ids: Vec<EntityId> = self.buildings.keys().copied().collect();
        let mut completions: Vec<(EntityId, String)> = Vec::new();
        let mut direct_credits: Vec<(PlayerId, ResourceKind, i64)> = Vec::new();

        for id in building_ids {
            let Some(mut building) = self.buildings.remove(&id) else {
                continue;
            };

            let hostile_factions = self
                .factions
                .get(&building.common.faction_id)
                .map_or_else(HashSet::new, |f| f.enemies.clone());
            if !hostile_factions.is_empty() && !building.weapons.is_empty() {
                let radius = Self::vision_world_radius(building.common.visibility_radius);
                let seen = self.quadtree.find_visible_entities_in_circle(
                    building.common.position.x,
                    building.common.position.y,
                    radius,
                    &hostile_factions,
                );
                building.common.known_enemies = seen.iter().map(|e| e.id).collect();
                if let Some(player) = self.players.get_mut(&building.common.player_id) {
                    player.known_enemies.extend(building.common.known_enemies.iter().copied());
                }
                if let Some(faction) = self.factions.get_mut(&building.common.faction_id) {
                    faction.known_enemies.extend(building.common.known_enemies.iter().copied());
                }
            }

            let health_percentage = building.common.health_ratio() * Fixed::from_num(100);
            if let Some(production) = building.production.as_mut() {
                let blueprints = &self.blueprints;
                let next_time = || {
                    production
                        .queue()
                        .front()
                        .and_then(|next_id| blueprints.unit(next_id))
                        .map_or(Fixed::ZERO, |bp| bp.production_time_seconds * Fixed::from_num(TICKS_PER_SECOND))
                };
                if let ProductionTick::Completed { unit_type } = production.tick(health_percentage, next_time) {
                    completions.push((id, unit_type));
                }
            }

            if let Some(extractor) = building.extractor.as_mut() {
                if let Some(amount) = extractor.tick() {
                    direct_credits.push((building.common.player_id, extractor.resource_kind, amount));
                }
            }

            let research_snapshot = building.research.clone();
            if let Some(research) = research_snapshot {
                if let Some(tech_id) = research.active_technology.clone() {
                    if let Some(tech_blueprint) = self.blueprints.tech(&tech_id) {
                        if let Some(player) = self.players.get_mut(&building.common.player_id) {
                            let progress = player.current_research.entry(tech_id.clone()).or_insert(Fixed::ZERO);
                            if research.tick(tech_blueprint.difficulty, progress) {
                                player.known_technologies.insert(tech_id.clone());
                                player.current_research.remove(&tech_id);
                                if let Some(r) = building.research.as_mut() {
                                    r.active_technology = None;
                                }
                            }
                        }
                    }
                }
            }

            self.buildings.insert(id, building);
        }

        for (player, kind, amount) in direct_credits {
            if let Some(player_state) = self.players.get_mut(&player) {
                player_state.resources.credit(kind, amount);
            }
        }
        for (building_id, unit_type) in completions {
            self.spawn_produced_unit(building_id, &unit_type);
        }
    }

    /// Spawn a unit completed by `building_id`'s production queue (§4.7:
    /// "spawn(u) at spawn_point ... if deployment_point set, is ordered
    /// there"). Combat stats for the spawned unit are not part of
    /// [`crate::production::UnitBlueprint`] (§10.4's distilled schema has no
    /// column for them) — spawned units get placeholder movement/armour
    /// values and no weapons, a known simplification recorded in DESIGN.md.
    fn spawn_produced_unit(&mut self, building_id: EntityId, unit_type: &str) {
        let Some(building) = self.buildings.get(&building_id) else {
            return;
        };
        let player_id = building.common.player_id;
        let faction_id = building.common.faction_id;
        let spawn_point = building.spawn_point;
        let deployment_point = building.deployment_point;

        let unit = Unit {
            common: PlayerEntityCommon {
                id: EntityId::new(0),
                player_id,
                faction_id,
                position: spawn_point,
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
            unit_type: unit_type.to_string(),
            current_node: grid::position_to_grid(spawn_point),
            reserved_node: None,
            facing_direction: 0,
            turret_facing_direction: None,
            virtual_angle: Fixed::ZERO,
            max_speed: Fixed::from_num(10),
            rotation_speed: Fixed::from_num(90),
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
        };

        let unit_id = self.spawn_unit(unit);
        if let Some(destination) = deployment_point {
            if let Some(unit) = self.units.get_mut(&unit_id) {
                unit.forced_destination = true;
                let start = unit.current_node;
                let destination_node = grid::position_to_grid(destination);
                self.pathfinder.request_path(unit_id, start, destination_node);
            }
        }
    }

    /// Re-evaluate every active scenario trigger once this tick's
    /// `EvaluateEventTriggers` schedule entry fired (§4.9). A no-op unless
    /// [`Self::run_scheduler`] set [`Self::triggers_due`] this tick.
    fn evaluate_scenario_triggers_if_due(&mut self) {
        if !self.triggers_due {
            return;
        }
        self.triggers_due = false;
        self.evaluate_scenario_triggers();
    }

    /// Build a [`ConditionContext`] snapshot from live state, evaluate every
    /// active trigger against it, then apply the events any newly-satisfied
    /// trigger fires (§4.9). Triggers are deactivated before their events
    /// run so a `Victory`/`Defeat` event can't re-enter evaluation this
    /// same pass.
    fn evaluate_scenario_triggers(&mut self) {
        let Some(mut scenario) = self.scenario.take() else {
            return;
        };

        let elapsed_minutes = (self.tick / (TICKS_PER_SECOND * 60)) as u32;
        let map_fully_revealed = self.fog_of_war.is_fully_revealed();

        let mut unit_counts: HashMap<PlayerId, u32> = HashMap::new();
        let mut units_of_type: HashMap<(PlayerId, String), u32> = HashMap::new();
        for unit in self.units.values() {
            *unit_counts.entry(unit.common.player_id).or_insert(0) += 1;
            *units_of_type.entry((unit.common.player_id, unit.unit_type.clone())).or_insert(0) += 1;
        }

        let mut building_counts: HashMap<PlayerId, u32> = HashMap::new();
        let mut buildings_of_type: HashMap<(PlayerId, String), u32> = HashMap::new();
        let mut controlled_buildings: HashMap<PlayerId, Vec<u64>> = HashMap::new();
        for building in self.buildings.values() {
            *building_counts.entry(building.common.player_id).or_insert(0) += 1;
            *buildings_of_type
                .entry((building.common.player_id, building.building_type.clone()))
                .or_insert(0) += 1;
            controlled_buildings
                .entry(building.common.player_id)
                .or_default()
                .push(building.common.id.raw());
        }

        let faction_entity_counts: HashMap<FactionId, u32> = self
            .factions
            .values()
            .map(|f| (f.id, (f.units.len() + f.buildings.len()) as u32))
            .collect();

        let known_technologies: HashMap<PlayerId, HashSet<String>> =
            self.players.values().map(|p| (p.id, p.known_technologies.clone())).collect();

        let mut resource_stock: HashMap<(PlayerId, ResourceKind), i64> = HashMap::new();
        for player in self.players.values() {
            for kind in crate::player::ALL_RESOURCE_KINDS {
                resource_stock.insert((player.id, kind), player.resources.account(kind).stock);
            }
        }

        let mut fired_events = Vec::new();
        {
            let ctx = ConditionContext {
                elapsed_minutes,
                map_fully_revealed,
                unit_counts: &unit_counts,
                building_counts: &building_counts,
                faction_entity_counts: &faction_entity_counts,
                units_of_type: &units_of_type,
                buildings_of_type: &buildings_of_type,
                controlled_buildings: &controlled_buildings,
                known_technologies: &known_technologies,
                resource_stock: &resource_stock,
                victory_points: &scenario.victory_points,
            };
            for trigger in &mut scenario.triggers {
                if trigger.active && trigger.condition.is_satisfied(&ctx) {
                    trigger.active = false;
                    fired_events.extend(trigger.events.iter().cloned());
                }
            }
        }

        for event in fired_events {
            self.apply_scenario_event(&mut scenario, event);
        }

        self.scenario = Some(scenario);
    }

    /// Apply one fired [`Event`] to `scenario` and, where the event affects
    /// player bookkeeping outside the scenario's own state, to `self`.
    fn apply_scenario_event(&mut self, scenario: &mut Scenario, event: Event) {
        match event {
            Event::AddVictoryPoints { player, amount } => scenario.add_victory_points(player, amount),
            Event::Victory { player } => scenario.victory(player),
            Event::Defeat { player } => {
                scenario.eliminate_player(player);
                if let Some(player_state) = self.players.get_mut(&player) {
                    player_state.eliminated = true;
                }
            }
            Event::ShowDialog { dialog_id } => tracing::info!(dialog_id, "scenario dialog triggered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TerrainCost;

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
            unit_type: "test_tank".to_string(),
            current_node: grid::position_to_grid(position),
            reserved_node: None,
            facing_direction: 0,
            turret_facing_direction: None,
            virtual_angle: Fixed::ZERO,
            max_speed: Fixed::from_num(60),
            rotation_speed: Fixed::from_num(360),
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

    fn new_simulation() -> Simulation {
        Simulation::new(flat_grid(20), BlueprintRegistry::default(), 42)
    }

    #[test]
    fn move_to_drives_a_unit_toward_its_destination() {
        let mut sim = new_simulation();
        let player = PlayerId::new(0);
        let faction = FactionId::new(0);
        sim.add_player(Player::new(player, faction, (255, 0, 0)));
        let start = grid::grid_to_position(GridPosition::new(0, 0));
        let unit_id = sim.spawn_unit(sample_unit(start, player, faction));

        let destination = grid::grid_to_position(GridPosition::new(5, 0));
        sim.push_command(Command::MoveTo { units: vec![unit_id], destination });

        let mut render = crate::interfaces::NullSink;
        let mut audio = crate::interfaces::NullSink;
        for _ in 0..600 {
            sim.tick(&mut render, &mut audio);
        }

        let unit = sim.unit(unit_id).unwrap();
        assert!(unit.common.position.distance(destination) < Fixed::from_num(10));
    }

    #[test]
    fn toggle_pause_freezes_everything_but_command_processing() {
        let mut sim = new_simulation();
        let player = PlayerId::new(0);
        let faction = FactionId::new(0);
        sim.add_player(Player::new(player, faction, (0, 255, 0)));
        let start = grid::grid_to_position(GridPosition::new(0, 0));
        let unit_id = sim.spawn_unit(sample_unit(start, player, faction));
        sim.push_command(Command::MoveTo {
            units: vec![unit_id],
            destination: grid::grid_to_position(GridPosition::new(10, 0)),
        });

        let mut render = crate::interfaces::NullSink;
        let mut audio = crate::interfaces::NullSink;
        sim.push_command(Command::TogglePause);
        let tick_before = sim.tick_count();
        sim.tick(&mut render, &mut audio);
        assert_eq!(sim.tick_count(), tick_before);
    }

    #[test]
    fn combat_kills_an_unarmed_target() {
        let mut sim = new_simulation();
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
            damage: 1000,
            penetration: 100,
            accuracy: Fixed::from_num(100),
            range: Fixed::from_num(300),
            rate_of_fire: Fixed::from_num(1),
            next_firing_time: 0,
        });
        let attacker_id = sim.spawn_unit(attacker);

        let mut victim = sample_unit(position, victim_player, victim_faction);
        victim.common.health = 50;
        let victim_id = sim.spawn_unit(victim);
        let _ = attacker_id;

        let mut render = crate::interfaces::NullSink;
        let mut audio = crate::interfaces::NullSink;
        for _ in 0..5 {
            sim.tick(&mut render, &mut audio);
        }

        assert!(sim.unit(victim_id).is_none());
    }

    #[test]
    fn production_completion_spawns_a_unit() {
        let mut sim = new_simulation();
        let player = PlayerId::new(0);
        let faction = FactionId::new(0);
        sim.add_player(Player::new(player, faction, (255, 255, 0)));

        let mut blueprints = BlueprintRegistry::default();
        blueprints.register_unit(crate::production::UnitBlueprint {
            id: "rifleman".to_string(),
            cost: HashMap::new(),
            production_time_seconds: Fixed::from_num(1) / Fixed::from_num(60),
        });
        let mut sim = Simulation::new(flat_grid(20), blueprints, 1);
        sim.add_player(Player::new(player, faction, (255, 255, 0)));

        let spawn_point = grid::grid_to_position(GridPosition::new(10, 10));
        let building = Building {
            common: PlayerEntityCommon {
                id: EntityId::new(0),
                player_id: player,
                faction_id: faction,
                position: spawn_point,
                health: 100,
                max_health: 100,
                cover: Fixed::ZERO,
                visibility_radius: Fixed::from_num(6),
                known_enemies: HashSet::new(),
                enemy_assigned_by_player: None,
                targeted_enemy: None,
                immortal: false,
            },
            building_type: "barracks".to_string(),
            occupied_nodes: std::iter::once(GridPosition::new(10, 10)).collect(),
            energy_consumption: 0,
            energy_production: 0,
            power_ratio: Fixed::ONE,
            production: Some(crate::production::ProductionState::default()),
            extractor: None,
            research: None,
            garrison: None,
            deployment_point: None,
            spawn_point,
            armour: 0,
            weapons: Vec::new(),
            attack_radius: Fixed::ZERO,
        };
        let building_id = sim.spawn_building(building);
        sim.push_command(Command::StartProduction { building: building_id, unit_type: "rifleman".to_string() });

        let mut render = crate::interfaces::NullSink;
        let mut audio = crate::interfaces::NullSink;
        let units_before = sim.units.len();
        for _ in 0..5 {
            sim.tick(&mut render, &mut audio);
        }
        assert!(sim.units.len() > units_before);
    }
}
