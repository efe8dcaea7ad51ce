//! Collaborator-boundary contracts (§6).
//!
//! `rts_core` is a library with no rendering/audio/input/UI dependency — the
//! teacher's own `rts_core`/`rts_game` crate split. Input arrives as
//! already-decoded [`Command`] values pushed onto a [`CommandQueue`]; output
//! toward rendering and audio goes through the [`RenderSink`]/[`AudioSink`]
//! traits so the tick loop never assumes anything about how (or whether) a
//! frame gets drawn.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::grid::GridPosition;
use crate::math::Vec2Fixed;

/// A player intent, already decoded from whatever input device produced it
/// (mouse, keyboard, network relay, scripted AI). Mirrors the verbs named in
/// §6: `select_units`, `move_to`, `attach_placeable_gameobject`,
/// `enqueue_waypoint`, `toggle_pause`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Replace the acting player's current selection.
    SelectUnits(Vec<EntityId>),
    /// Move the given units to a destination, issuing one pathfinder
    /// request (individually or as a group, per §4.3).
    MoveTo {
        /// Units ordered to move.
        units: Vec<EntityId>,
        /// World-space destination.
        destination: Vec2Fixed,
    },
    /// Order the given units to attack-move toward a destination, engaging
    /// any enemy encountered en route.
    AttackMove {
        /// Units ordered to attack-move.
        units: Vec<EntityId>,
        /// World-space destination.
        destination: Vec2Fixed,
    },
    /// Order the given units to engage a specific enemy.
    Attack {
        /// Units ordered to attack.
        units: Vec<EntityId>,
        /// The enemy entity to engage.
        target: EntityId,
    },
    /// Append a waypoint to the given units' waypoint queues (§4.3); if it
    /// equals the first queued waypoint the queue closes into a patrol
    /// loop.
    EnqueueWaypoint {
        /// Units whose waypoint queues are extended.
        units: Vec<EntityId>,
        /// Waypoint to enqueue.
        destination: Vec2Fixed,
    },
    /// Stop the given units completely (§4.5's "stop completely" contract).
    Stop(Vec<EntityId>),
    /// Select a placeable blueprint id for subsequent placement input.
    AttachPlaceableGameObject(String),
    /// Place a building of the given blueprint id at a destination.
    PlaceBuilding {
        /// Owning player.
        player: crate::player::PlayerId,
        /// Building blueprint id.
        building_type: String,
        /// Destination grid position.
        at: GridPosition,
    },
    /// Enqueue a unit for production at a specific producer building.
    StartProduction {
        /// The producer building.
        building: EntityId,
        /// Unit blueprint id.
        unit_type: String,
    },
    /// Cancel a queued/in-progress production item.
    CancelProduction {
        /// The producer building.
        building: EntityId,
        /// Unit blueprint id to cancel.
        unit_type: String,
    },
    /// Toggle simulation pause.
    TogglePause,
}

/// FIFO of decoded [`Command`]s awaiting processing by the tick loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandQueue {
    commands: VecDeque<Command>,
}

impl CommandQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command to the back of the queue.
    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    /// Pop the next command, oldest first.
    pub fn pop_front(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Drain every queued command, oldest first.
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, Command> {
        self.commands.drain(..)
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if no commands are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// One tick's worth of fog-of-war state change, emitted for a rendering
/// collaborator to apply to its fog sprites (§4.6). The core never touches
/// sprites itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FogOfWarDelta {
    /// Grids that became visible or explored this tick and should have any
    /// fog sprite removed.
    pub revealed: Vec<GridPosition>,
    /// Grids that left `visible` this tick (but remain `explored`) and
    /// should show a semi-transparent fog sprite.
    pub hidden: Vec<GridPosition>,
}

/// Sink for rendering-relevant notifications (§6). The core calls this
/// whenever an entity's renderable state changes; it never reaches into a
/// renderer's own data structures.
pub trait RenderSink {
    /// Called when `entity` changes grid row (the teacher's convention:
    /// sprite batches are row-ordered for correct draw-order overlap, so a
    /// row change requires a re-sort).
    fn on_entity_moved(&mut self, entity: EntityId, row_changed: bool);

    /// Called once per tick with this tick's fog-of-war delta.
    fn on_fog_delta(&mut self, delta: &FogOfWarDelta);
}

/// Sink for fire-and-forget named sound effects (§6).
pub trait AudioSink {
    /// Play a named effect (e.g. `"production-started"`, `"enemy-detected"`,
    /// `"unit-lost"`, `"not-enough-resource"`).
    fn play_sound(&mut self, name: &str);
}

/// A [`RenderSink`]/[`AudioSink`] that discards every notification. Used by
/// headless runs and tests that don't care about collaborator output.
#[derive(Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn on_entity_moved(&mut self, _entity: EntityId, _row_changed: bool) {}
    fn on_fog_delta(&mut self, _delta: &FogOfWarDelta) {}
}

impl AudioSink for NullSink {
    fn play_sound(&mut self, _name: &str) {}
}
