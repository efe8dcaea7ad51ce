//! Tile map, spatial adjacency, and coarse sector grouping (C1).
//!
//! `Grid` owns every [`MapNode`] in dense row-major storage; cross-references
//! between nodes and the units/buildings that occupy them are resolved
//! through [`EntityId`] rather than pointers, per the arena-plus-id
//! indirection pattern used throughout this crate.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::math::{Fixed, Vec2Fixed};

/// World-space width of one tile.
#[must_use]
pub fn tile_width() -> Fixed {
    Fixed::from_num(60)
}

/// World-space height of one tile.
#[must_use]
pub fn tile_height() -> Fixed {
    Fixed::from_num(50)
}

/// Side length, in nodes, of one coarse [`Sector`].
pub const SECTOR_SIZE: u32 = 10;

/// Eight-directional neighbor offsets, in the fixed order used for
/// deterministic iteration (N, NE, E, SE, S, SW, W, NW).
pub const DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Integer `(column, row)` grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    /// Column index (x axis).
    pub column: i32,
    /// Row index (y axis).
    pub row: i32,
}

impl GridPosition {
    /// Construct a grid position.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// True if `self` and `other` differ along both axes (a diagonal step).
    #[must_use]
    pub fn is_diagonal_to(self, other: Self) -> bool {
        self.column != other.column && self.row != other.row
    }
}

/// Convert a world-space position to its containing grid coordinate:
/// `grid = (⌊x/TW⌋, ⌊y/TH⌋)`.
#[must_use]
pub fn position_to_grid(pos: Vec2Fixed) -> GridPosition {
    let column = (pos.x / tile_width()).floor().to_num::<i32>();
    let row = (pos.y / tile_height()).floor().to_num::<i32>();
    GridPosition::new(column, row)
}

/// Convert a grid coordinate to the world-space center of that tile:
/// `position = (gx·TW + TW/2, gy·TH + TH/2)`.
#[must_use]
pub fn grid_to_position(grid: GridPosition) -> Vec2Fixed {
    let half_w = tile_width() / Fixed::from_num(2);
    let half_h = tile_height() / Fixed::from_num(2);
    Vec2Fixed::new(
        Fixed::from_num(grid.column) * tile_width() + half_w,
        Fixed::from_num(grid.row) * tile_height() + half_h,
    )
}

/// Terrain category of a tile, with its base movement cost.
///
/// Lower cost is cheaper to cross; values match the spec's literal scale
/// (Asphalt cheapest, Mud most expensive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainCost {
    /// Paved surface, cost 1.
    Asphalt,
    /// Bare ground, cost 2.
    Ground,
    /// Grass, cost 3.
    Grass,
    /// Sand, cost 4.
    Sand,
    /// Mud, cost 5.
    Mud,
}

impl TerrainCost {
    /// Base movement cost for this terrain, as used in the neighbor-cost
    /// table (`distance = (√2 if diagonal else 1) × (this.cost +
    /// neighbor.cost)`).
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::Asphalt => 1,
            Self::Ground => 2,
            Self::Grass => 3,
            Self::Sand => 4,
            Self::Mud => 5,
        }
    }
}

/// One grid cell.
///
/// `pathable`/`walkable` are derived, not cached: a node blocks pathing iff
/// it has a building or a terrain obstacle, and blocks walking additionally
/// if a unit currently occupies it. Deriving them keeps the invariant
/// ("a node's unit/building back-references are consistent with the
/// entity's `current_node`") automatically true — there is no cached flag
/// that could go stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapNode {
    /// This node's grid coordinate.
    pub grid: GridPosition,
    /// World-space center of this tile.
    pub center: Vec2Fixed,
    /// Terrain category, fixed at map generation.
    pub terrain_cost: TerrainCost,
    /// Entity currently occupying this node as a unit, if any.
    pub unit: Option<EntityId>,
    /// Entity currently occupying this node as a building, if any.
    pub building: Option<EntityId>,
    /// True if an impassable terrain obstacle (e.g. a rock, a tree) sits
    /// on this node.
    pub obstacle: bool,
    /// Precomputed cost to each of the 8 [`DIRECTIONS`] neighbors, `None`
    /// where that neighbor is off-map. Computed once at map construction.
    pub(crate) neighbor_costs: [Option<Fixed>; 8],
}

impl MapNode {
    /// A node with no building and no terrain obstacle can be pathed
    /// through, even if a (transient) unit is standing on it.
    #[must_use]
    pub const fn pathable(&self) -> bool {
        self.building.is_none() && !self.obstacle
    }

    /// A node with no building, no obstacle, and no occupying unit.
    #[must_use]
    pub const fn walkable(&self) -> bool {
        self.pathable() && self.unit.is_none()
    }

    /// Precomputed cost to move from this node to the neighbor found at
    /// direction index `dir` (`0..8`, see [`DIRECTIONS`]).
    #[must_use]
    pub const fn cost_to_direction(&self, dir: usize) -> Option<Fixed> {
        self.neighbor_costs[dir]
    }

    fn sector_coord(&self) -> (u32, u32) {
        (
            self.grid.column.max(0) as u32 / SECTOR_SIZE,
            self.grid.row.max(0) as u32 / SECTOR_SIZE,
        )
    }
}

/// Coarse `SECTOR_SIZE × SECTOR_SIZE` grouping of nodes, used for
/// locality-scoped queries (a unit scans its own sector and neighbors
/// instead of the whole map).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sector {
    /// Sector coordinate, in sector units (not node units).
    pub id: (u32, u32),
    /// Entities rooted in this sector, keyed by owning player id.
    pub entities_by_player: std::collections::HashMap<u32, std::collections::HashSet<EntityId>>,
}

impl Sector {
    /// Register `entity` (owned by `player_id`) as rooted in this sector.
    pub fn add_entity(&mut self, player_id: u32, entity: EntityId) {
        self.entities_by_player
            .entry(player_id)
            .or_default()
            .insert(entity);
    }

    /// Remove `entity` from this sector's bookkeeping.
    pub fn remove_entity(&mut self, player_id: u32, entity: EntityId) {
        if let Some(set) = self.entities_by_player.get_mut(&player_id) {
            set.remove(&entity);
        }
    }
}

/// The tile map: dense node storage, sector grouping, and grid/world
/// coordinate conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    /// Number of columns.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
    nodes: Vec<MapNode>,
    sectors: Vec<Sector>,
    sector_columns: u32,
}

impl Grid {
    /// Build a grid from a row-major terrain cost table (`len ==
    /// columns*rows`), precomputing per-node neighbor costs and sector
    /// membership.
    #[must_use]
    pub fn new(columns: u32, rows: u32, terrain: Vec<TerrainCost>) -> Self {
        assert_eq!(terrain.len(), (columns * rows) as usize);

        let nodes: Vec<MapNode> = terrain
            .into_iter()
            .enumerate()
            .map(|(idx, terrain_cost)| {
                let column = (idx as u32 % columns) as i32;
                let row = (idx as u32 / columns) as i32;
                let grid = GridPosition::new(column, row);
                MapNode {
                    grid,
                    center: grid_to_position(grid),
                    terrain_cost,
                    unit: None,
                    building: None,
                    obstacle: false,
                    neighbor_costs: [None; 8],
                }
            })
            .collect();

        let sector_columns = columns.div_ceil(SECTOR_SIZE);
        let sector_rows = rows.div_ceil(SECTOR_SIZE);
        let sectors = (0..sector_rows)
            .flat_map(|sy| (0..sector_columns).map(move |sx| (sx, sy)))
            .map(|id| Sector {
                id,
                entities_by_player: std::collections::HashMap::new(),
            })
            .collect();

        let mut grid = Self {
            columns,
            rows,
            nodes,
            sectors,
            sector_columns,
        };
        grid.precompute_neighbor_costs();
        grid
    }

    fn index(&self, grid: GridPosition) -> Option<usize> {
        if grid.column < 0 || grid.row < 0 {
            return None;
        }
        let (column, row) = (grid.column as u32, grid.row as u32);
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some((row * self.columns + column) as usize)
    }

    fn precompute_neighbor_costs(&mut self) {
        let sqrt_2 = crate::math::sqrt_2();
        for idx in 0..self.nodes.len() {
            let this_grid = self.nodes[idx].grid;
            let this_cost = self.nodes[idx].terrain_cost.value();
            let mut costs = [None; 8];
            for (dir, (dc, dr)) in DIRECTIONS.iter().enumerate() {
                let neighbor_grid = GridPosition::new(this_grid.column + dc, this_grid.row + dr);
                if let Some(n_idx) = self.index(neighbor_grid) {
                    let neighbor_cost = self.nodes[n_idx].terrain_cost.value();
                    let diagonal = dc != &0 && dr != &0;
                    let factor = if diagonal { sqrt_2 } else { Fixed::from_num(1) };
                    costs[dir] =
                        Some(factor * Fixed::from_num(this_cost + neighbor_cost));
                }
            }
            self.nodes[idx].neighbor_costs = costs;
        }
    }

    /// Node containing world-space position `(x, y)`, if in bounds.
    #[must_use]
    pub fn position_to_node(&self, pos: Vec2Fixed) -> Option<&MapNode> {
        self.node_at(position_to_grid(pos))
    }

    /// Node at an exact grid coordinate, if in bounds.
    #[must_use]
    pub fn node_at(&self, grid: GridPosition) -> Option<&MapNode> {
        self.index(grid).map(|idx| &self.nodes[idx])
    }

    /// Mutable access to the node at an exact grid coordinate.
    pub fn node_at_mut(&mut self, grid: GridPosition) -> Option<&mut MapNode> {
        let idx = self.index(grid)?;
        Some(&mut self.nodes[idx])
    }

    /// Filters `grids` down to those that lie within the map's bounds.
    #[must_use]
    pub fn in_bounds(&self, grids: &[GridPosition]) -> Vec<GridPosition> {
        grids
            .iter()
            .copied()
            .filter(|g| self.index(*g).is_some())
            .collect()
    }

    /// True if the world-space point lies within the map's total area.
    #[must_use]
    pub fn on_map_area(&self, pos: Vec2Fixed) -> bool {
        let width = tile_width() * Fixed::from_num(self.columns);
        let height = tile_height() * Fixed::from_num(self.rows);
        pos.x >= Fixed::ZERO && pos.x < width && pos.y >= Fixed::ZERO && pos.y < height
    }

    /// Up to 8 neighbor nodes of the tile containing `pos`, clamped to
    /// bounds, in [`DIRECTIONS`] order.
    #[must_use]
    pub fn adjacent_nodes(&self, pos: Vec2Fixed) -> Vec<&MapNode> {
        let grid = position_to_grid(pos);
        DIRECTIONS
            .iter()
            .filter_map(|(dc, dr)| self.node_at(GridPosition::new(grid.column + dc, grid.row + dr)))
            .collect()
    }

    /// Neighbors of the tile containing `pos` that are [`MapNode::walkable`].
    #[must_use]
    pub fn walkable_adjacent(&self, pos: Vec2Fixed) -> Vec<&MapNode> {
        self.adjacent_nodes(pos)
            .into_iter()
            .filter(|n| n.walkable())
            .collect()
    }

    /// Neighbors of the tile containing `pos` that are [`MapNode::pathable`].
    #[must_use]
    pub fn pathable_adjacent(&self, pos: Vec2Fixed) -> Vec<&MapNode> {
        self.adjacent_nodes(pos)
            .into_iter()
            .filter(|n| n.pathable())
            .collect()
    }

    /// Up to 8 neighbor nodes of `grid` itself, clamped to bounds, paired
    /// with their direction index into [`DIRECTIONS`]. Used by the
    /// pathfinder, which walks grid coordinates directly rather than
    /// re-deriving them from a world position each step.
    #[must_use]
    pub fn neighbors_of(&self, grid: GridPosition) -> Vec<(usize, &MapNode)> {
        DIRECTIONS
            .iter()
            .enumerate()
            .filter_map(|(dir, (dc, dr))| {
                self.node_at(GridPosition::new(grid.column + dc, grid.row + dr))
                    .map(|n| (dir, n))
            })
            .collect()
    }

    /// Neighbors of `grid` that are [`MapNode::walkable`].
    #[must_use]
    pub fn walkable_adjacent_at(&self, grid: GridPosition) -> Vec<&MapNode> {
        self.neighbors_of(grid)
            .into_iter()
            .map(|(_, n)| n)
            .filter(|n| n.walkable())
            .collect()
    }

    /// Neighbors of `grid` that are [`MapNode::pathable`].
    #[must_use]
    pub fn pathable_adjacent_at(&self, grid: GridPosition) -> Vec<&MapNode> {
        self.neighbors_of(grid)
            .into_iter()
            .map(|(_, n)| n)
            .filter(|n| n.pathable())
            .collect()
    }

    /// Place `unit` at `grid`, clearing its previous node first. No-op if
    /// `grid` is out of bounds.
    pub fn set_unit(&mut self, grid: GridPosition, unit: Option<EntityId>) {
        if let Some(node) = self.node_at_mut(grid) {
            node.unit = unit;
        }
    }

    /// Place `building` at `grid`. No-op if `grid` is out of bounds.
    pub fn set_building(&mut self, grid: GridPosition, building: Option<EntityId>) {
        if let Some(node) = self.node_at_mut(grid) {
            node.building = building;
        }
    }

    /// Sector containing grid coordinate `grid`, if in bounds.
    #[must_use]
    pub fn sector_at(&self, grid: GridPosition) -> Option<&Sector> {
        if self.index(grid).is_none() {
            return None;
        }
        let sx = grid.column.max(0) as u32 / SECTOR_SIZE;
        let sy = grid.row.max(0) as u32 / SECTOR_SIZE;
        self.sectors
            .get((sy * self.sector_columns + sx) as usize)
    }

    /// Mutable sector containing grid coordinate `grid`, if in bounds.
    pub fn sector_at_mut(&mut self, grid: GridPosition) -> Option<&mut Sector> {
        if self.index(grid).is_none() {
            return None;
        }
        let sx = grid.column.max(0) as u32 / SECTOR_SIZE;
        let sy = grid.row.max(0) as u32 / SECTOR_SIZE;
        self.sectors
            .get_mut((sy * self.sector_columns + sx) as usize)
    }

    /// Iterate all nodes in row-major order.
    pub fn nodes(&self) -> impl Iterator<Item = &MapNode> {
        self.nodes.iter()
    }

    /// Total node count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the grid has no nodes (never true for a validly constructed
    /// grid, but required for clippy's `len_without_is_empty`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_grid(columns: u32, rows: u32) -> Grid {
        let terrain = vec![TerrainCost::Ground; (columns * rows) as usize];
        Grid::new(columns, rows, terrain)
    }

    #[test]
    fn round_trip_grid_to_position_and_back() {
        let pos = Vec2Fixed::new(Fixed::from_num(130), Fixed::from_num(77));
        let grid = position_to_grid(pos);
        let center = grid_to_position(grid);
        assert_eq!(grid_to_position(position_to_grid(center)), center);
    }

    #[test]
    fn literal_tile_size_conversion() {
        // tile 60x50, as used throughout the literal end-to-end scenarios.
        let grid = GridPosition::new(1, 0);
        let pos = grid_to_position(grid);
        assert_eq!(pos.x, Fixed::from_num(90));
        assert_eq!(pos.y, Fixed::from_num(25));
    }

    #[test]
    fn neighbor_cost_table_flat_terrain() {
        let grid = flat_grid(20, 20);
        let center = grid.node_at(GridPosition::new(5, 5)).unwrap();
        // orthogonal: 1 * (2+2) = 4
        assert_eq!(center.cost_to_direction(0), Some(Fixed::from_num(4)));
        // diagonal: sqrt(2) * (2+2) ~= 5.656
        let diag = center.cost_to_direction(1).unwrap();
        assert!(diag > Fixed::from_num(5) && diag < Fixed::from_num(6));
    }

    #[test]
    fn edge_nodes_have_fewer_neighbors() {
        let grid = flat_grid(20, 20);
        let corner = GridPosition::new(0, 0);
        let neighbors = grid.adjacent_nodes(grid_to_position(corner));
        assert_eq!(neighbors.len(), 3);
    }

    #[test]
    fn walkable_excludes_occupied_nodes() {
        let mut grid = flat_grid(5, 5);
        let pos = GridPosition::new(2, 2);
        assert!(grid.node_at(pos).unwrap().walkable());
        grid.set_unit(pos, Some(EntityId::new(1)));
        assert!(!grid.node_at(pos).unwrap().walkable());
        assert!(grid.node_at(pos).unwrap().pathable());
    }

    #[test]
    fn pathable_excludes_buildings_but_not_units() {
        let mut grid = flat_grid(5, 5);
        let pos = GridPosition::new(1, 1);
        grid.set_building(pos, Some(EntityId::new(2)));
        assert!(!grid.node_at(pos).unwrap().pathable());
        assert!(!grid.node_at(pos).unwrap().walkable());
    }

    #[test]
    fn sector_grouping_10x10() {
        let grid = flat_grid(25, 15);
        // ceil(25/10) * ceil(15/10) = 3 * 2 = 6
        assert!(grid.sector_at(GridPosition::new(24, 14)).is_some());
        assert!(grid.sector_at(GridPosition::new(0, 0)).is_some());
    }
}
