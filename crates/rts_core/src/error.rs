//! Error taxonomy for the simulation core.
//!
//! Errors are grouped by how the tick loop must react to them, not by which
//! module raised them: structural failures propagate and abort the tick;
//! everything else is recoverable and is handled where it occurs (logged via
//! [`tracing`], never panicking).

use thiserror::Error;

use crate::entity::EntityId;
use crate::grid::GridPosition;
use crate::player::ResourceKind;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// Map/entity bookkeeping inconsistency (e.g. a unit missing from the
    /// spatial index, a node whose back-reference doesn't match its
    /// occupant). Always a programming bug; fail fast with a descriptive
    /// diagnostic rather than continuing on corrupted state.
    #[error("structural inconsistency: {0}")]
    Structural(String),

    /// A producer operation was rejected for lack of resources. No state is
    /// mutated; the caller should notify the local human player (a sound
    /// cue, via the `not-enough-resource` [`crate::AudioSink`] effect).
    #[error("insufficient {kind:?}: need {needed}, have {available}")]
    ResourceDeficit {
        /// Resource kind that was short.
        kind: ResourceKind,
        /// Amount required.
        needed: i64,
        /// Amount on hand.
        available: i64,
    },

    /// A* found no path between `start` and `end` for `unit`, after both the
    /// walkable and pathable passes failed. Recoverable: the unit is left
    /// idle and the caller may reissue the request after a delay.
    #[error("no path found for unit {unit:?}: {start:?} -> {end:?}")]
    PathfindingFailure {
        /// Unit the path was requested for.
        unit: EntityId,
        /// Requested start grid position.
        start: GridPosition,
        /// Requested destination grid position.
        end: GridPosition,
    },

    /// The next node on a unit's path is occupied. Recoverable via
    /// wait-with-backoff then re-route.
    #[error("node {node:?} is blocked, unit {unit:?} must wait or reroute")]
    CollisionBlocking {
        /// Unit that cannot advance.
        unit: EntityId,
        /// Grid position currently blocking it.
        node: GridPosition,
    },

    /// A configuration entry the simulation needed was absent from the
    /// loaded data files. Reported and ignored; must never crash the tick
    /// loop.
    #[error("missing config entry: {key}")]
    ConfigMissing {
        /// Identifier of the missing entry (e.g. a unit/building/tech id).
        key: String,
    },

    /// Save/load I/O or (de)serialization failure. Surfaced to the UI
    /// collaborator with a user-visible message; never silently dropped.
    #[error("save/load failed: {0}")]
    SaveLoadIo(String),
}

impl From<bincode::Error> for SimError {
    fn from(err: bincode::Error) -> Self {
        Self::SaveLoadIo(err.to_string())
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        Self::SaveLoadIo(err.to_string())
    }
}
