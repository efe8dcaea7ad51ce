//! Per-tick unit movement, facing, and collision avoidance (C5, §4.5).
//!
//! Grounded in `original_source/units/units.py`'s per-frame `update`
//! (node-swap, path consumption, rotation-clamped facing) and
//! `original_source/units/units_tasking.py`'s collision handling. Each step
//! is exposed as its own function so [`crate::simulation::Simulation::tick`]
//! can interleave them with quadtree/fog-of-war bookkeeping that only the
//! simulation has both halves of (this module never sees two units at
//! once).

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Unit};
use crate::grid::{self, Grid, GridPosition};
use crate::math::{Fixed, Vec2Fixed};

/// Discrete facing orientations a unit's hull (or turret) can hold.
pub const ROTATIONS: u8 = 16;

/// Degrees covered by one discrete rotation step.
fn degrees_per_rotation() -> Fixed {
    Fixed::from_num(360) / Fixed::from_num(ROTATIONS)
}

/// Euclidean modulo: always returns a value in `[0, m)`, regardless of the
/// sign of `x`. `Fixed` has no built-in `rem_euclid`, but it does have
/// `floor` (already used by `grid::position_to_grid`), which is enough to
/// build one.
fn modulo(x: Fixed, m: Fixed) -> Fixed {
    x - (x / m).floor() * m
}

/// Snap a continuous bearing in degrees to the nearest of [`ROTATIONS`]
/// discrete facings. Equivalent to the ported original's 361-entry lookup
/// table (`degrees -> nearest of 16`): both produce the same nearest-facing
/// index for every integer degree, but a rounding division needs no
/// 361-element static table to carry around.
#[must_use]
pub fn angle_to_facing(angle_degrees: Fixed) -> u8 {
    let normalized = modulo(angle_degrees, Fixed::from_num(360));
    let step = degrees_per_rotation();
    let index = ((normalized / step) + Fixed::from_num(1) / Fixed::from_num(2))
        .floor()
        .to_num::<i32>();
    (index.rem_euclid(i32::from(ROTATIONS))) as u8
}

/// Recompute `current_node` from `unit`'s position; if it changed, swap the
/// grid's node-blocking from the old node to the new one and return
/// `true`. Step 1 and part of step 4 of §4.5's ordered list.
pub fn update_current_node(unit: &mut Unit, grid: &mut Grid) -> bool {
    let new_node = grid::position_to_grid(unit.common.position);
    if new_node == unit.current_node {
        return false;
    }
    grid.set_unit(unit.current_node, None);
    grid.set_unit(new_node, Some(unit.common.id));
    unit.current_node = new_node;
    true
}

/// Reserve the second step of the path ahead of arrival, a lookahead used
/// to prevent two units swapping into each other's just-vacated node in
/// the same tick (§4.5 step 4's "second-step lookahead").
pub fn reserve_lookahead(unit: &mut Unit) {
    unit.reserved_node = if unit.path.len() > 1 {
        Some(unit.path[0])
    } else {
        None
    };
}

/// Outcome of scanning the node at `path[0]` for a blocker (§4.5 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionScan {
    /// `path[0]` is clear.
    Clear,
    /// `path[0]` is occupied by another unit.
    BlockedByUnit(EntityId),
    /// `path[0]` is blocked by a building or terrain obstacle (immovable).
    BlockedByObstacle,
}

/// Inspect the node at the head of `unit`'s path.
#[must_use]
pub fn collision_scan(unit: &Unit, grid: &Grid) -> CollisionScan {
    let Some(&next) = unit.path.front() else {
        return CollisionScan::Clear;
    };
    let Some(node) = grid.node_at(next) else {
        return CollisionScan::Clear;
    };
    if let Some(blocker) = node.unit {
        if blocker != unit.common.id {
            return CollisionScan::BlockedByUnit(blocker);
        }
    }
    if !node.pathable() {
        return CollisionScan::BlockedByObstacle;
    }
    CollisionScan::Clear
}

/// What the collision-avoidance policy decided this unit should do, per
/// §4.5's ordered "Collision avoidance policy" list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionResolution {
    /// Stash the path and wait one second before retrying.
    Wait {
        /// The unit being waited on.
        blocker: EntityId,
    },
    /// Reroute the head of the path through an alternative node adjacent
    /// to both the unit's current node and the node after next.
    Reroute {
        /// The alternative node to route through.
        via: GridPosition,
    },
    /// Order the (stationary) blocker to vacate to a specific walkable
    /// node, then wait.
    OrderBlockerToMove {
        /// The blocker being ordered to move.
        blocker: EntityId,
        /// The node it should move to.
        destination: GridPosition,
    },
    /// No walkable tile was available near the blocker; request a fresh
    /// A* path to the original destination instead.
    RequestFreshPath,
}

/// Decide how to respond to a blocking unit, per §4.5's ordered policy:
/// wait if the blocker is moving or hostile; else look for a reroute; else
/// order the blocker to vacate; else request a brand new path.
#[must_use]
pub fn decide_collision_avoidance(
    unit: &Unit,
    blocker: EntityId,
    blocker_is_moving: bool,
    blocker_is_enemy: bool,
    blocker_walkable_adjacent: &[GridPosition],
    grid: &Grid,
) -> CollisionResolution {
    if blocker_is_moving || blocker_is_enemy {
        return CollisionResolution::Wait { blocker };
    }

    if unit.path.len() > 1 {
        let after_next = unit.path[1];
        if let Some(via) = grid
            .walkable_adjacent_at(unit.current_node)
            .into_iter()
            .map(|n| n.grid)
            .find(|candidate| {
                grid.walkable_adjacent_at(after_next)
                    .iter()
                    .any(|n| n.grid == *candidate)
            })
        {
            return CollisionResolution::Reroute { via };
        }
    }

    if let Some(destination) = blocker_walkable_adjacent.first().copied() {
        CollisionResolution::OrderBlockerToMove { blocker, destination }
    } else {
        CollisionResolution::RequestFreshPath
    }
}

/// Deadline extension applied each time a collision wait is not yet over
/// (§4.5: "bump deadline by 1s").
fn wait_backoff_ticks(ticks_per_second: u64) -> u64 {
    ticks_per_second
}

/// Threshold below which the unit is considered to have arrived at the
/// head waypoint, scaled by `max_speed` (§4.5: "`dist < 0.1 * max_speed`").
fn arrival_threshold_factor() -> Fixed {
    Fixed::from_num(1) / Fixed::from_num(10)
}

/// Path length below which a unit resumes an awaited path even if the next
/// node isn't walkable yet (§4.5: "`next.walkable OR path length < 20`").
const SHORT_PATH_RESUME_THRESHOLD: usize = 20;

/// Result of the step-6 "follow path" logic: what the caller should apply
/// to the unit's velocity/facing this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowPathAction {
    /// Nothing to do (no path, or still waiting out a deadline).
    Idle,
    /// Resume the awaited path (the caller should restore `unit.path` from
    /// `unit.awaited_path`).
    ResumeAwaitedPath,
    /// Extend the wait deadline by one more backoff interval.
    ExtendWait {
        /// The new deadline, in absolute ticks.
        new_deadline: u64,
    },
    /// The head waypoint was reached and popped.
    WaypointReached,
    /// Rotate toward the bearing to the next waypoint; velocity is zeroed
    /// while rotating.
    Rotate {
        /// New virtual angle after one rotation step.
        new_angle: Fixed,
    },
    /// Move at `velocity` toward the next waypoint (already facing it).
    Move {
        /// World-space velocity to apply this tick.
        velocity: Vec2Fixed,
    },
}

/// Advance `unit`'s path-following state machine by one tick (§4.5 step 6).
/// `now` and `ticks_per_second` drive the 1-second wait-deadline math;
/// `health_ratio` scales the unit's effective speed.
#[must_use]
pub fn follow_path(
    unit: &mut Unit,
    grid: &Grid,
    now: u64,
    ticks_per_second: u64,
    health_ratio: Fixed,
) -> FollowPathAction {
    if let Some(deadline) = unit.path_wait_deadline {
        if now < deadline {
            return FollowPathAction::Idle;
        }
        let next_walkable = unit
            .awaited_path
            .as_ref()
            .and_then(|p| p.front())
            .and_then(|&n| grid.node_at(n))
            .is_some_and(|n| n.walkable());
        let short_enough = unit
            .awaited_path
            .as_ref()
            .is_some_and(|p| p.len() < SHORT_PATH_RESUME_THRESHOLD);

        return if next_walkable || short_enough {
            unit.path_wait_deadline = None;
            if let Some(resumed) = unit.awaited_path.take() {
                unit.path = resumed;
            }
            FollowPathAction::ResumeAwaitedPath
        } else {
            let new_deadline = now + wait_backoff_ticks(ticks_per_second);
            unit.path_wait_deadline = Some(new_deadline);
            FollowPathAction::ExtendWait { new_deadline }
        };
    }

    let Some(&target_node) = unit.path.front() else {
        return FollowPathAction::Idle;
    };
    let target_pos = grid::grid_to_position(target_node);

    if unit.common.position.distance(target_pos) < arrival_threshold_factor() * unit.max_speed {
        unit.path.pop_front();
        return FollowPathAction::WaypointReached;
    }

    let bearing = unit.common.position.angle_to(target_pos);
    if bearing != unit.virtual_angle {
        let new_angle = rotate_toward(unit.virtual_angle, bearing, unit.rotation_speed);
        unit.virtual_angle = new_angle;
        unit.facing_direction = angle_to_facing(new_angle);
        return FollowPathAction::Rotate { new_angle };
    }

    let speed = unit.max_speed * health_ratio;
    let radians = bearing.to_num::<f64>().to_radians();
    let velocity = Vec2Fixed::new(
        Fixed::from_num(radians.cos()) * speed,
        Fixed::from_num(radians.sin()) * speed,
    );
    FollowPathAction::Move { velocity }
}

/// Rotate `current` toward `target` by at most `max_step` degrees, choosing
/// the shorter arc (§4.5: "rotate toward it, clamped by rotation_speed,
/// choosing the shorter arc").
#[must_use]
pub fn rotate_toward(current: Fixed, target: Fixed, max_step: Fixed) -> Fixed {
    let full_circle = Fixed::from_num(360);
    let mut delta = modulo(target - current, full_circle);
    if delta > full_circle / Fixed::from_num(2) {
        delta -= full_circle;
    }

    let clamped = if delta.abs() <= max_step {
        delta
    } else if delta > Fixed::ZERO {
        max_step
    } else {
        -max_step
    };

    modulo(current + clamped, full_circle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{PlayerEntityCommon, UnitKind};
    use crate::grid::TerrainCost;
    use crate::player::{FactionId, PlayerId};
    use std::collections::{HashSet, VecDeque};

    fn flat_grid(size: u32) -> Grid {
        Grid::new(size, size, vec![TerrainCost::Ground; (size * size) as usize])
    }

    fn sample_unit(position: Vec2Fixed) -> Unit {
        Unit {
            common: PlayerEntityCommon {
                id: EntityId::new(1),
                player_id: PlayerId::new(0),
                faction_id: FactionId::new(0),
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
            max_speed: Fixed::from_num(10),
            rotation_speed: Fixed::from_num(90),
            path: VecDeque::new(),
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

    #[test]
    fn angle_to_facing_snaps_to_nearest_of_16() {
        assert_eq!(angle_to_facing(Fixed::ZERO), 0);
        assert_eq!(angle_to_facing(Fixed::from_num(359)), 0);
        assert_eq!(angle_to_facing(Fixed::from_num(180)), 8);
    }

    #[test]
    fn update_current_node_swaps_grid_blocking() {
        let mut grid = flat_grid(10);
        let mut unit = sample_unit(grid::grid_to_position(GridPosition::new(0, 0)));
        grid.set_unit(unit.current_node, Some(unit.common.id));

        unit.common.position = grid::grid_to_position(GridPosition::new(1, 0));
        let changed = update_current_node(&mut unit, &mut grid);
        assert!(changed);
        assert!(grid.node_at(GridPosition::new(0, 0)).unwrap().unit.is_none());
        assert_eq!(grid.node_at(GridPosition::new(1, 0)).unwrap().unit, Some(unit.common.id));
    }

    #[test]
    fn collision_scan_detects_unit_blocker() {
        let mut grid = flat_grid(10);
        let mut unit = sample_unit(grid::grid_to_position(GridPosition::new(0, 0)));
        unit.path.push_back(GridPosition::new(1, 0));
        grid.set_unit(GridPosition::new(1, 0), Some(EntityId::new(99)));

        assert_eq!(collision_scan(&unit, &grid), CollisionScan::BlockedByUnit(EntityId::new(99)));
    }

    #[test]
    fn waits_when_blocker_is_moving() {
        let unit = sample_unit(Vec2Fixed::ZERO);
        let grid = flat_grid(10);
        let resolution =
            decide_collision_avoidance(&unit, EntityId::new(2), true, false, &[], &grid);
        assert_eq!(resolution, CollisionResolution::Wait { blocker: EntityId::new(2) });
    }

    #[test]
    fn orders_stationary_blocker_to_vacate_when_no_reroute() {
        let unit = sample_unit(Vec2Fixed::ZERO);
        let grid = flat_grid(10);
        let resolution = decide_collision_avoidance(
            &unit,
            EntityId::new(2),
            false,
            false,
            &[GridPosition::new(5, 5)],
            &grid,
        );
        assert_eq!(
            resolution,
            CollisionResolution::OrderBlockerToMove { blocker: EntityId::new(2), destination: GridPosition::new(5, 5) }
        );
    }

    #[test]
    fn follow_path_reaches_waypoint_within_threshold() {
        let grid = flat_grid(10);
        let target = GridPosition::new(1, 0);
        let mut unit = sample_unit(grid::grid_to_position(target));
        unit.path.push_back(target);

        let action = follow_path(&mut unit, &grid, 0, 20, Fixed::ONE);
        assert_eq!(action, FollowPathAction::WaypointReached);
        assert!(unit.path.is_empty());
    }

    #[test]
    fn follow_path_rotates_before_moving() {
        let grid = flat_grid(10);
        let mut unit = sample_unit(grid::grid_to_position(GridPosition::new(0, 0)));
        unit.path.push_back(GridPosition::new(5, 0));
        unit.virtual_angle = Fixed::from_num(90);

        let action = follow_path(&mut unit, &grid, 0, 20, Fixed::ONE);
        assert!(matches!(action, FollowPathAction::Rotate { .. }));
    }

    #[test]
    fn rotate_toward_takes_shorter_arc() {
        let result = rotate_toward(Fixed::from_num(350), Fixed::from_num(10), Fixed::from_num(30));
        // shorter arc from 350 to 10 is +20 (through 0), not -340
        assert_eq!(result, Fixed::from_num(10));
    }

    #[test]
    fn rotate_toward_clamps_to_max_step() {
        let result = rotate_toward(Fixed::ZERO, Fixed::from_num(90), Fixed::from_num(10));
        assert_eq!(result, Fixed::from_num(10));
    }
}
