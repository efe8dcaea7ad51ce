//! Entity identifiers and the Unit/Building data model (C4, part of the
//! entity taxonomy in §3).
//!
//! `PlayerEntity` is modeled as tagged variants (`Unit`, `Building`) rather
//! than deep inheritance, per the spec's own design note: "prefer tagged
//! variants for entity 'what' and capability traits for 'what it can do'".
//! Shared attributes (health, faction, known enemies, ...) live in
//! [`PlayerEntityCommon`], embedded in both variants; capability-specific
//! state (production, research, extraction, garrison) lives in optional
//! sub-records on [`Building`] rather than being split across separate
//! component tables.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::grid::GridPosition;
use crate::math::{Fixed, Vec2Fixed};
use crate::player::{FactionId, PlayerId};
use crate::production::{ExtractorState, GarrisonState, ProductionState, ResearchState};

/// Stable, monotonically increasing entity identifier, assigned on
/// creation and never reused. Saves reference entities by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw id value. Exposed for tests and save/load; simulation
    /// code should obtain ids from [`crate::simulation::Simulation`]'s
    /// allocator instead of constructing them directly.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer value of this id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Discriminates the capability-polymorphic unit shapes named in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// Ground vehicle with a fixed hull-mounted weapon (if any).
    Vehicle,
    /// Ground vehicle whose turret rotates independently of the hull.
    VehicleWithTurret,
    /// Infantry.
    Soldier,
    /// Naval unit.
    Boat,
    /// Aircraft.
    Air,
}

/// A single mounted weapon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weapon {
    /// Display/config name.
    pub name: String,
    /// Base damage per shot.
    pub damage: u32,
    /// Armor penetration value.
    pub penetration: u32,
    /// Base accuracy contribution to the hit-chance sum (§4.4).
    pub accuracy: Fixed,
    /// Maximum effective range.
    pub range: Fixed,
    /// Seconds between shots.
    pub rate_of_fire: Fixed,
    /// Absolute tick timestamp of this weapon's next allowed shot.
    pub next_firing_time: u64,
}

impl Weapon {
    /// True if enough time has passed since the last shot.
    #[must_use]
    pub fn ready(&self, now: u64) -> bool {
        now >= self.next_firing_time
    }
}

/// Attributes shared by every `PlayerEntity` (units and buildings alike).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerEntityCommon {
    /// This entity's id.
    pub id: EntityId,
    /// Owning player.
    pub player_id: PlayerId,
    /// Owning faction (redundant with the player's faction, cached for
    /// fast hostility checks during quadtree queries and combat).
    pub faction_id: FactionId,
    /// World-space position.
    pub position: Vec2Fixed,
    /// Current health.
    pub health: i32,
    /// Maximum health.
    pub max_health: i32,
    /// Flat damage cover bonus from being in e.g. cover terrain.
    pub cover: Fixed,
    /// Vision radius, in tiles.
    pub visibility_radius: Fixed,
    /// Enemies currently known to this entity (scanned this tick, see
    /// §4.4's enemy-scan contract).
    pub known_enemies: HashSet<EntityId>,
    /// Enemy the player explicitly ordered this entity to engage; takes
    /// priority over automatic target selection.
    pub enemy_assigned_by_player: Option<EntityId>,
    /// Enemy this entity is currently engaging (after target selection).
    pub targeted_enemy: Option<EntityId>,
    /// Immortal entities never take damage and cannot die (§4.4).
    pub immortal: bool,
}

impl PlayerEntityCommon {
    /// Ratio of current to max health, clamped to `[0, 1]`. Used to scale
    /// movement speed and production progress by unit/building condition.
    #[must_use]
    pub fn health_ratio(&self) -> Fixed {
        if self.max_health <= 0 {
            return Fixed::ZERO;
        }
        (Fixed::from_num(self.health.max(0)) / Fixed::from_num(self.max_health))
            .clamp(Fixed::ZERO, Fixed::ONE)
    }

    /// True once health has reached zero.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.health <= 0
    }
}

/// A mobile entity: vehicle, soldier, boat, or aircraft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// Shared entity attributes.
    pub common: PlayerEntityCommon,
    /// Capability-polymorphic unit shape.
    pub kind: UnitKind,
    /// Config id naming this unit's blueprint (mirrors [`Building::building_type`];
    /// used by production spawning and the `HasUnitsOfType` trigger condition).
    pub unit_type: String,
    /// Node the unit currently occupies.
    pub current_node: GridPosition,
    /// Next node along the path, reserved ahead of arrival (two-step
    /// lookahead, §4.5).
    pub reserved_node: Option<GridPosition>,
    /// Discrete facing, one of 16 rotations.
    pub facing_direction: u8,
    /// Independent turret facing, for [`UnitKind::VehicleWithTurret`].
    pub turret_facing_direction: Option<u8>,
    /// Continuous bearing in degrees `[0, 360)`; `facing_direction` is
    /// this value snapped to the nearest of 16 discrete rotations.
    pub virtual_angle: Fixed,
    /// Top speed.
    pub max_speed: Fixed,
    /// Rotation speed, degrees per tick.
    pub rotation_speed: Fixed,
    /// Remaining path, ordered nearest-first.
    pub path: VecDeque<GridPosition>,
    /// Path stashed while waiting out a collision (§4.5).
    pub awaited_path: Option<VecDeque<GridPosition>>,
    /// Absolute tick at which a collision wait should be retried.
    pub path_wait_deadline: Option<u64>,
    /// Flat armor value, reduces incoming damage (§4.4).
    pub armour: u32,
    /// Attack engagement radius.
    pub attack_radius: Fixed,
    /// Mounted weapons.
    pub weapons: Vec<Weapon>,
    /// Group id for a standing (player-named) unit group, if any.
    pub permanent_units_group: Option<u32>,
    /// Transient navigating-group this unit currently belongs to.
    pub navigating_group: Option<u32>,
    /// False while garrisoned inside a building.
    pub outside: bool,
    /// Set when the player issued an explicit move; a forced destination
    /// is not abandoned for spontaneous combat engagement.
    pub forced_destination: bool,
}

impl Unit {
    /// Leaves any navigating group, clears path state, and resets
    /// movement-related flags. Mirrors the "Stop completely" contract in
    /// §4.5.
    pub fn stop_completely(&mut self) {
        self.navigating_group = None;
        self.path.clear();
        self.awaited_path = None;
        self.path_wait_deadline = None;
        self.forced_destination = false;
    }
}

/// A stationary entity: optionally produces units, extracts a resource, is
/// a research facility, and/or garrisons soldiers. Sub-records are `None`
/// when the capability doesn't apply, per the "compose out of optional
/// sub-records" design note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    /// Shared entity attributes.
    pub common: PlayerEntityCommon,
    /// Config id naming this building's blueprint.
    pub building_type: String,
    /// Nodes this building's footprint occupies; each such node has
    /// `pathable == false` for as long as the building stands.
    pub occupied_nodes: HashSet<GridPosition>,
    /// Energy drawn per tick.
    pub energy_consumption: i32,
    /// Energy generated per tick.
    pub energy_production: i32,
    /// `clamp(produced / required, 0, 1)`, `1` if `required == 0`;
    /// recomputed whenever a building is added/removed (§4.7).
    pub power_ratio: Fixed,
    /// Unit-production capability, if this building can build units.
    pub production: Option<ProductionState>,
    /// Resource-extraction capability.
    pub extractor: Option<ExtractorState>,
    /// Research capability.
    pub research: Option<ResearchState>,
    /// Garrison capability (soldiers sheltered inside).
    pub garrison: Option<GarrisonState>,
    /// Where newly produced units are ordered to move after spawning.
    pub deployment_point: Option<Vec2Fixed>,
    /// Where newly produced units physically appear.
    pub spawn_point: Vec2Fixed,
    /// Flat armor value.
    pub armour: u32,
    /// Defensive weapons, if any (turreted defense structures).
    pub weapons: Vec<Weapon>,
    /// Attack engagement radius, for defensive buildings.
    pub attack_radius: Fixed,
}

impl Building {
    /// True if this building is currently able to act at full capacity —
    /// production/research progress scale by `power_ratio`.
    #[must_use]
    pub fn effective_power_ratio(&self) -> Fixed {
        self.power_ratio.clamp(Fixed::ZERO, Fixed::ONE)
    }
}

/// Shared read-only view over a unit or building, used by code that treats
/// `PlayerEntity`s polymorphically (combat, fog of war, quadtree).
#[derive(Debug, Clone, Copy)]
pub enum PlayerEntityRef<'a> {
    /// A unit.
    Unit(&'a Unit),
    /// A building.
    Building(&'a Building),
}

impl<'a> PlayerEntityRef<'a> {
    /// Shared attributes, regardless of variant.
    #[must_use]
    pub const fn common(self) -> &'a PlayerEntityCommon {
        match self {
            Self::Unit(u) => &u.common,
            Self::Building(b) => &b.common,
        }
    }
}
