//! Vision and fog-of-war reveal tracking (C6, §4.6).
//!
//! Ported from `original_source/map/fog_of_war.py`'s `FogOfWar`: three
//! `GridPosition` sets (`unexplored`/`visible`/`explored`) with the per-tick
//! `reveal_nodes` → `update()` cycle. The Python original mutates sprite
//! pools directly inside `update()`; this module instead emits a
//! [`FogOfWarDelta`] for a [`crate::interfaces::RenderSink`] to apply.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::grid::{Grid, GridPosition};
use crate::interfaces::FogOfWarDelta;
use crate::math::Fixed;

/// Manhattan-disc observed-area radius scaling factor (§Glossary: "Manhattan
/// disc with threshold r·1.6").
const OBSERVED_AREA_FACTOR: f64 = 1.6;

/// Per-map vision state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FogOfWar {
    unexplored: HashSet<GridPosition>,
    visible: HashSet<GridPosition>,
    explored: HashSet<GridPosition>,
}

impl FogOfWar {
    /// Construct fog-of-war state for `grid`, with every grid position
    /// initially unexplored.
    #[must_use]
    pub fn new(grid: &Grid) -> Self {
        let unexplored = grid.nodes().map(|n| n.grid).collect();
        Self {
            unexplored,
            visible: HashSet::new(),
            explored: HashSet::new(),
        }
    }

    /// Grids never yet seen by any locally-revealing entity.
    #[must_use]
    pub fn unexplored(&self) -> &HashSet<GridPosition> {
        &self.unexplored
    }

    /// Grids seen so far this tick (cleared at the end of every
    /// [`Self::update`]).
    #[must_use]
    pub fn visible(&self) -> &HashSet<GridPosition> {
        &self.visible
    }

    /// Grids ever seen.
    #[must_use]
    pub fn explored(&self) -> &HashSet<GridPosition> {
        &self.explored
    }

    /// True once every map grid has been explored at least once (the
    /// `MapRevealed` trigger condition, §4.9).
    #[must_use]
    pub fn is_fully_revealed(&self) -> bool {
        self.unexplored.is_empty()
    }

    /// Union `revealed` into this tick's visible set. Called once per
    /// locally-controlled entity, per §4.6 ("enemies do not reveal").
    pub fn reveal_nodes(&mut self, revealed: &[GridPosition]) {
        self.visible.extend(revealed.iter().copied());
    }

    /// End-of-tick update: promote this tick's `visible` set into
    /// `explored`, shrink `unexplored`, compute the delta for the render
    /// collaborator, then clear `visible` for the next tick.
    pub fn update(&mut self) -> FogOfWarDelta {
        let revealed: Vec<GridPosition> = self
            .visible
            .iter()
            .copied()
            .filter(|g| !self.explored.contains(g))
            .collect();
        let hidden: Vec<GridPosition> = self
            .explored
            .iter()
            .copied()
            .filter(|g| !self.visible.contains(g))
            .collect();

        self.explored.extend(self.visible.iter().copied());
        for g in &self.visible {
            self.unexplored.remove(g);
        }
        self.visible.clear();

        FogOfWarDelta { revealed, hidden }
    }
}

/// Grid positions within an entity's observed area: a square window of
/// `±visibility_radius` tiles, filtered to a Manhattan disc using the
/// unrounded threshold `visibility_radius * OBSERVED_AREA_FACTOR`, centered
/// on `current_node`, clamped to the map's bounds. Recomputed only when an
/// entity's `current_node` changes (§4.6's caching contract) — the caller
/// is responsible for that caching, this function is pure.
///
/// Ported literally from `calculate_circular_area` in
/// `original_source/utils/geometry.py`: the scan window spans
/// `±max_distance` (the *un*scaled radius), while the inclusion test
/// compares against the scaled threshold — the window is deliberately
/// narrower than the threshold would otherwise allow, so corner tiles of
/// the window are always included and the disc is clipped by the window
/// on the diagonals rather than forming a full diamond out to the scaled
/// radius.
#[must_use]
pub fn observed_area(grid: &Grid, current_node: GridPosition, visibility_radius: Fixed) -> Vec<GridPosition> {
    let max_distance: i32 = visibility_radius.to_num();
    let radius = f64::from(max_distance) * OBSERVED_AREA_FACTOR;

    let mut area = Vec::new();
    for dx in -max_distance..=max_distance {
        for dy in -max_distance..=max_distance {
            let total_distance = f64::from(dx.abs() + dy.abs());
            if total_distance >= radius {
                continue;
            }
            let candidate = GridPosition::new(current_node.column + dx, current_node.row + dy);
            if grid.node_at(candidate).is_some() {
                area.push(candidate);
            }
        }
    }
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TerrainCost;

    fn flat_grid(size: u32) -> Grid {
        Grid::new(size, size, vec![TerrainCost::Ground; (size * size) as usize])
    }

    #[test]
    fn new_fog_of_war_starts_fully_unexplored() {
        let grid = flat_grid(10);
        let fow = FogOfWar::new(&grid);
        assert_eq!(fow.unexplored().len(), 100);
        assert!(fow.visible().is_empty());
        assert!(fow.explored().is_empty());
        assert!(!fow.is_fully_revealed());
    }

    #[test]
    fn reveal_then_update_moves_visible_into_explored() {
        let grid = flat_grid(10);
        let mut fow = FogOfWar::new(&grid);
        let revealed = [GridPosition::new(5, 5), GridPosition::new(5, 6)];
        fow.reveal_nodes(&revealed);

        let delta = fow.update();
        assert_eq!(delta.revealed.len(), 2);
        assert!(delta.hidden.is_empty());
        assert!(fow.visible().is_empty());
        assert!(fow.explored().contains(&GridPosition::new(5, 5)));
        assert!(!fow.unexplored().contains(&GridPosition::new(5, 5)));
    }

    #[test]
    fn grid_leaving_visibility_reports_hidden_next_update() {
        let grid = flat_grid(10);
        let mut fow = FogOfWar::new(&grid);
        fow.reveal_nodes(&[GridPosition::new(1, 1)]);
        fow.update();

        // nothing revealed this tick -> previously-explored node now hidden
        let delta = fow.update();
        assert_eq!(delta.hidden, vec![GridPosition::new(1, 1)]);
        assert!(fow.explored().contains(&GridPosition::new(1, 1)));
    }

    #[test]
    fn observed_area_matches_ported_geometry_for_radius_three() {
        // Matches `calculate_circular_area(gx, gy, 3)` in
        // original_source/utils/geometry.py exactly (see DESIGN.md for the
        // discrepancy against spec.md §8 scenario 6's illustrative "21").
        let grid = flat_grid(20);
        let area = observed_area(&grid, GridPosition::new(5, 5), Fixed::from_num(3));
        assert_eq!(area.len(), 37);
    }

    #[test]
    fn map_fully_revealed_once_unexplored_empty() {
        let grid = flat_grid(2);
        let mut fow = FogOfWar::new(&grid);
        let all: Vec<GridPosition> = grid.nodes().map(|n| n.grid).collect();
        fow.reveal_nodes(&all);
        fow.update();
        assert!(fow.is_fully_revealed());
    }
}
