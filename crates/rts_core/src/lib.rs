//! # RTS Core
//!
//! Deterministic simulation core for a real-time strategy game: tile map +
//! spatial index, A* pathfinder, unit movement/collision avoidance, fog of
//! war, production/resource/research loops, and an event scheduler driving
//! scenario triggers — orchestrated by one fixed-order tick per frame.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering, audio, or input handling.
//! - No filesystem or network IO.
//! - No system randomness — combat's stochastic rolls use a PRNG seeded
//!   once at construction and advanced only from inside the tick loop (see
//!   [`rng`]).
//!
//! Rendering, audio, input, UI, and save-file IO are external collaborators
//! addressed only through the trait-based contracts in [`interfaces`].
//!
//! ## Crate structure
//!
//! - [`grid`] — tile map, adjacency, sectors (C1).
//! - [`quadtree`] — dynamic spatial index over entities (C2).
//! - [`pathfinding`] — A*, request queue, group navigation, waypoints (C3).
//! - [`entity`] — unit/building data model (C4).
//! - [`movement`] — per-unit path following, rotation, collisions (C5).
//! - [`fog_of_war`] — visibility reveal tracking (C6).
//! - [`production`] — production/extraction/research state machines (C7).
//! - [`scheduler`] — tick-countdown scheduled callbacks (C8).
//! - [`triggers`] — scenario predicate/consequence engine (C9).
//! - [`simulation`] — the per-tick game loop (C10).
//! - [`combat`] — attack/hit-chance/damage resolution, part of C4.
//! - [`player`] — players, factions, resource ledgers.
//! - [`math`] — fixed-point vector math.
//! - [`rng`] — seeded deterministic PRNG for combat rolls.
//! - [`config`] — startup config-file loading into blueprint registries.
//! - [`interfaces`] — collaborator boundary contracts (render/audio/input).
//! - [`error`] — the simulation-wide error taxonomy.
//! - [`data`] — raw config record shapes shared with [`config`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod combat;
pub mod config;
pub mod data;
pub mod entity;
pub mod error;
pub mod fog_of_war;
pub mod grid;
pub mod interfaces;
pub mod math;
pub mod movement;
pub mod pathfinding;
pub mod player;
pub mod production;
pub mod quadtree;
pub mod rng;
pub mod scheduler;
pub mod simulation;
pub mod triggers;

/// Re-export of the types most consumers need without chasing module paths.
pub mod prelude {
    pub use crate::combat::{
        apply_damage, hit_chance, ready_weapon_indices, roll_to_hit, select_target, shoot,
        HitChanceContext, ShotOutcome, DEFAULT_DAMAGE_RANDOMNESS_STD_DEV,
    };
    pub use crate::config::{ConfigError, ConfigResult};
    pub use crate::data::{BuildingData, FactionData, StartingEntity, TechData, TechEffect, TechEffectType, UnitData};
    pub use crate::entity::{Building, EntityId, PlayerEntityCommon, PlayerEntityRef, Unit, UnitKind, Weapon};
    pub use crate::error::{Result, SimError};
    pub use crate::fog_of_war::FogOfWar;
    pub use crate::grid::{Grid, GridPosition, MapNode, Sector, TerrainCost};
    pub use crate::interfaces::{AudioSink, Command, CommandQueue, FogOfWarDelta, NullSink, RenderSink};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::pathfinding::{NavigatingGroup, PathResult, Pathfinder, WaypointsQueue, OPTIMAL_PATH_LENGTH};
    pub use crate::player::{Faction, FactionId, Player, PlayerId, ResourceKind, ResourceLedger, VictoryConditions};
    pub use crate::production::{
        BlueprintRegistry, BuildingBlueprint, ExtractorState, GarrisonState, ProductionState,
        ProductionTick, ResearchState, TechBlueprint, UnitBlueprint,
    };
    pub use crate::quadtree::{IndexedEntity, QuadTree, Rect, DEFAULT_MAX_ENTITIES};
    pub use crate::rng::DeterministicRng;
    pub use crate::scheduler::{EventScheduler, MethodTag, ScheduleHandle, ScheduledEvent};
    pub use crate::simulation::{Simulation, SpawnedUnit, TICKS_PER_SECOND};
    pub use crate::triggers::{Condition, ConditionContext, Event, EventTrigger, Scenario, ScenarioOutcome};
}
