//! A* pathfinding, request queue, group navigation, waypoint queues (C3,
//! §4.3).
//!
//! Diverges deliberately from a conventional A* in two ways the spec
//! requires verbatim: the heuristic is Manhattan (not Euclidean/Chebyshev),
//! and `g(neighbor)` is updated by the heuristic distance between nodes
//! rather than the precomputed terrain-aware neighbor cost — preserved
//! intentionally, confirmed against `original_source/map/pathfinding.py`'s
//! identical property (§9's Open Question, resolved: not a bug). The
//! `BinaryHeap`-with-ε-tie-break ordering pattern is carried over from the
//! teacher's previous `AStarNode`, generalized to the Manhattan heuristic
//! and the two-pass walkable→pathable fallback.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::grid::{Grid, GridPosition};
use crate::math::{Fixed, Vec2Fixed};

/// Tie-break epsilon applied to the heuristic so that `f = g + h·1.001`
/// prefers expanding nodes closer to the goal when several share the same
/// `g + h`.
fn tie_break_epsilon() -> Fixed {
    Fixed::from_num(1001) / Fixed::from_num(1000)
}

fn manhattan(a: GridPosition, b: GridPosition) -> Fixed {
    Fixed::from_num((a.column - b.column).abs() + (a.row - b.row).abs())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OpenEntry {
    f: Fixed,
    node: GridPosition,
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, A* wants the lowest f first.
        other.f.cmp(&self.f)
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether a pass considers a unit-occupied node passable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassMode {
    WalkableOnly,
    PathableAllowed,
}

fn neighbors(grid: &Grid, node: GridPosition, mode: PassMode) -> Vec<GridPosition> {
    match mode {
        PassMode::WalkableOnly => grid.walkable_adjacent_at(node).into_iter().map(|n| n.grid).collect(),
        PassMode::PathableAllowed => grid.pathable_adjacent_at(node).into_iter().map(|n| n.grid).collect(),
    }
}

fn a_star_pass(grid: &Grid, start: GridPosition, end: GridPosition, mode: PassMode) -> Option<Vec<GridPosition>> {
    if start == end {
        return Some(Vec::new());
    }

    let mut open = BinaryHeap::new();
    let mut g_score: HashMap<GridPosition, Fixed> = HashMap::new();
    let mut came_from: HashMap<GridPosition, GridPosition> = HashMap::new();
    let mut closed: HashSet<GridPosition> = HashSet::new();

    g_score.insert(start, Fixed::ZERO);
    open.push(OpenEntry { f: manhattan(start, end) * tie_break_epsilon(), node: start });

    while let Some(OpenEntry { node: current, .. }) = open.pop() {
        if current == end {
            return Some(reconstruct_path(&came_from, end));
        }
        if !closed.insert(current) {
            continue;
        }

        let current_g = g_score.get(&current).copied().unwrap_or(Fixed::ZERO);
        for neighbor in neighbors(grid, current, mode) {
            if closed.contains(&neighbor) {
                continue;
            }
            // Step cost is the heuristic distance between current and
            // neighbor, not the node's precomputed terrain-aware cost —
            // kept verbatim per §9.
            let tentative_g = current_g + manhattan(current, neighbor);
            let better = g_score
                .get(&neighbor)
                .is_none_or(|existing| tentative_g < *existing);
            if better {
                came_from.insert(neighbor, current);
                g_score.insert(neighbor, tentative_g);
                let f = tentative_g + manhattan(neighbor, end) * tie_break_epsilon();
                open.push(OpenEntry { f, node: neighbor });
            }
        }
    }

    None
}

fn reconstruct_path(came_from: &HashMap<GridPosition, GridPosition>, end: GridPosition) -> Vec<GridPosition> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    // drop `start` itself: callers want positions beginning just after start.
    path.remove(0);
    path
}

/// Find a path from `start` to `end`, returning world-space positions
/// beginning just after `start` and ending at `end`. Empty (never an error)
/// signals "no path" after both the walkable and pathable passes fail
/// (§4.3, §7).
#[must_use]
pub fn a_star(grid: &Grid, start: GridPosition, end: GridPosition) -> Vec<Vec2Fixed> {
    a_star_grid(grid, start, end)
        .into_iter()
        .map(crate::grid::grid_to_position)
        .collect()
}

/// Same as [`a_star`] but returns grid coordinates rather than world-space
/// positions, for callers (movement, group navigation) that need to stay in
/// grid space.
#[must_use]
pub fn a_star_grid(grid: &Grid, start: GridPosition, end: GridPosition) -> Vec<GridPosition> {
    a_star_pass(grid, start, end, PassMode::WalkableOnly)
        .or_else(|| a_star_pass(grid, start, end, PassMode::PathableAllowed))
        .unwrap_or_default()
}

/// One outstanding path request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    /// Unit the path is for.
    pub unit: EntityId,
    /// Start grid position.
    pub start: GridPosition,
    /// Destination grid position.
    pub end: GridPosition,
}

/// Length of an A* path segment sliced into one shared group waypoint
/// (§4.3's `OPTIMAL_PATH_LENGTH`).
pub const OPTIMAL_PATH_LENGTH: usize = 50;

/// A transient group of units moving together to the same destination,
/// sharing one long A* path sliced into per-unit waypoint rings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatingGroup {
    /// Id of this navigating group (assigned by the pathfinder).
    pub id: u32,
    /// Units belonging to this group.
    pub units: Vec<EntityId>,
    /// The shared long path, in grid coordinates.
    pub shared_path: Vec<GridPosition>,
    /// Per-unit waypoint queues, reversed so the next target is the last
    /// element (popped with `pop()`).
    pub waypoints: HashMap<EntityId, Vec<GridPosition>>,
}

/// Player-authored waypoint queue for sequential/patrol movement (§4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaypointsQueue {
    waypoints: VecDeque<GridPosition>,
    /// True once a newly-added waypoint equalled the first, closing the
    /// queue into a repeating patrol loop.
    pub looping: bool,
}

impl WaypointsQueue {
    /// Append a waypoint. If it equals the first queued waypoint, the queue
    /// closes into a patrol loop (subsequent consumption re-appends
    /// consumed waypoints to preserve the loop).
    pub fn enqueue(&mut self, waypoint: GridPosition) {
        if self.waypoints.front() == Some(&waypoint) {
            self.looping = true;
        }
        self.waypoints.push_back(waypoint);
    }

    /// Consume the next waypoint. In loop mode the consumed waypoint is
    /// re-appended to the back so the cycle repeats indefinitely.
    pub fn consume_next(&mut self) -> Option<GridPosition> {
        let next = self.waypoints.pop_front()?;
        if self.looping {
            self.waypoints.push_back(next);
        }
        Some(next)
    }

    /// Peek the next waypoint without consuming it.
    #[must_use]
    pub fn peek_next(&self) -> Option<GridPosition> {
        self.waypoints.front().copied()
    }

    /// True if no waypoints remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Grows an expanding-radius ring search outward from `(x, y)` until `n`
/// unique walkable grid positions are collected, sorted by distance to the
/// center (§4.3's `group_of_waypoints`).
#[must_use]
pub fn group_of_waypoints(grid: &Grid, center: GridPosition, n: usize) -> Vec<GridPosition> {
    let mut found: Vec<GridPosition> = Vec::new();
    let mut seen: HashSet<GridPosition> = HashSet::new();
    let mut radius: i32 = 0;
    let max_radius = (grid.columns + grid.rows) as i32;

    while found.len() < n && radius <= max_radius {
        for dc in -radius..=radius {
            for dr in -radius..=radius {
                // Ring only: perimeter of the current radius square, not
                // its interior (interior already scanned at smaller radii).
                if dc.abs() != radius && dr.abs() != radius {
                    continue;
                }
                let candidate = GridPosition::new(center.column + dc, center.row + dr);
                if !seen.insert(candidate) {
                    continue;
                }
                if let Some(node) = grid.node_at(candidate) {
                    if node.walkable() {
                        found.push(candidate);
                    }
                }
            }
        }
        radius += 1;
    }

    found.sort_by_key(|g| {
        let dc = (g.column - center.column).abs();
        let dr = (g.row - center.row).abs();
        dc + dr
    });
    found.truncate(n);
    found
}

/// FIFO path-request processor: pops at most one request per tick (§4.3,
/// §5's "one quadtree query per entity, one path step" per-tick budget).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pathfinder {
    queue: VecDeque<PathRequest>,
    next_group_id: u32,
}

/// Outcome of processing one path request.
#[derive(Debug, Clone, PartialEq)]
pub enum PathResult {
    /// A path was found and should be delivered to the requesting unit.
    Found {
        /// The unit the path is for.
        unit: EntityId,
        /// Grid-coordinate path.
        path: Vec<GridPosition>,
    },
    /// No path exists on either the walkable or the pathable pass
    /// (§7: "re-enqueued once (walkable then pathable)... if both fail, the
    /// unit is left idle"). The caller decides whether and when to submit a
    /// fresh request.
    NotFound {
        /// The unit the path was requested for.
        unit: EntityId,
    },
}

impl Pathfinder {
    /// An empty pathfinder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a path request.
    pub fn request_path(&mut self, unit: EntityId, start: GridPosition, end: GridPosition) {
        self.queue.push_back(PathRequest { unit, start, end });
    }

    /// Remove every outstanding request for `unit` (§4.3's
    /// `cancel_unit_path_requests`).
    pub fn cancel_unit_path_requests(&mut self, unit: EntityId) {
        self.queue.retain(|r| r.unit != unit);
    }

    /// Process at most one request this tick. The walkable/pathable
    /// fallback already happened inside [`a_star_grid`]; a `NotFound` here
    /// means both of those passes failed, and it is the caller's decision
    /// (e.g. retrying after a collision backoff) whether to submit a fresh
    /// request later.
    pub fn update(&mut self, grid: &Grid) -> Option<PathResult> {
        let request = self.queue.pop_front()?;
        let path = a_star_grid(grid, request.start, request.end);
        if path.is_empty() && request.start != request.end {
            Some(PathResult::NotFound { unit: request.unit })
        } else {
            Some(PathResult::Found { unit: request.unit, path })
        }
    }

    /// Allocate a fresh navigating-group id.
    pub fn next_group_id(&mut self) -> u32 {
        let id = self.next_group_id;
        self.next_group_id += 1;
        id
    }

    /// Build a [`NavigatingGroup`] for `units` moving to `end`, from
    /// `units[0]`'s position. One shared A* path is computed from the first
    /// unit; every [`OPTIMAL_PATH_LENGTH`] steps along it, a ring of
    /// walkable positions is distributed one-per-unit as an intermediate
    /// waypoint, with each unit's own list reversed so the next target is
    /// the last element.
    #[must_use]
    pub fn group_navigate(
        &mut self,
        grid: &Grid,
        units: Vec<EntityId>,
        lead_start: GridPosition,
        end: GridPosition,
    ) -> NavigatingGroup {
        let shared_path = a_star_grid(grid, lead_start, end);
        let mut waypoints: HashMap<EntityId, Vec<GridPosition>> =
            units.iter().map(|u| (*u, Vec::new())).collect();

        let mut step = 0;
        while step < shared_path.len() {
            let center = shared_path[step];
            let ring = group_of_waypoints(grid, center, units.len());
            for (unit, waypoint) in units.iter().zip(ring.into_iter()) {
                waypoints.get_mut(unit).expect("unit present in map").push(waypoint);
            }
            step += OPTIMAL_PATH_LENGTH;
        }

        if shared_path.last().is_some_and(|last| *last != end) || shared_path.is_empty() {
            for list in waypoints.values_mut() {
                list.push(end);
            }
        }

        for list in waypoints.values_mut() {
            list.reverse();
        }

        NavigatingGroup {
            id: self.next_group_id(),
            units,
            shared_path,
            waypoints,
        }
    }

    /// Number of requests currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if no requests are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
