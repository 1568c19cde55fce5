//! Spatial indexing abstractions for agent neighborhood queries.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The key was never inserted or has already been removed.
    #[error("key is not tracked by the index")]
    UnknownKey,
    /// The key is already tracked; inserting it twice would duplicate membership.
    #[error("key is already tracked by the index")]
    DuplicateKey,
    /// Positions must be finite to map onto a cell.
    #[error("position ({x}, {y}) is not finite")]
    NonFinitePosition { x: f64, y: f64 },
    /// The caller's notion of the previous cell disagrees with the tracked cell.
    #[error("stale relocation: key tracked in {tracked:?} but old position maps to {claimed:?}")]
    CellMismatch { tracked: CellCoord, claimed: CellCoord },
}

/// Integer coordinate of a grid cell.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct CellCoord {
    pub x: u32,
    pub y: u32,
}

impl CellCoord {
    /// Creates a cell coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex<K> {
    /// Track `key` at `position`, returning the cell it landed in.
    fn insert(&mut self, key: K, position: (f64, f64)) -> Result<CellCoord, IndexError>;

    /// Stop tracking `key`, returning its last recorded position.
    fn remove(&mut self, key: K) -> Result<(f64, f64), IndexError>;

    /// Record that `key` moved from `old_position` to `new_position`.
    ///
    /// Returns `true` when cell membership changed.
    fn update_position(
        &mut self,
        key: K,
        old_position: (f64, f64),
        new_position: (f64, f64),
    ) -> Result<bool, IndexError>;

    /// Visit every key within `radius` of `center`, passing the squared distance.
    fn neighbors_within(
        &self,
        center: (f64, f64),
        radius: f64,
        visitor: &mut dyn FnMut(K, OrderedFloat<f64>),
    );

    /// Number of tracked keys.
    fn len(&self) -> usize;

    /// Returns true when nothing is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect every key within `radius` of `center`.
    fn query_range(&self, center: (f64, f64), radius: f64) -> Vec<K> {
        let mut found = Vec::new();
        self.neighbors_within(center, radius, &mut |key, _| found.push(key));
        found
    }
}

/// Dimensions used to lay out a [`UniformGridIndex`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GridConfig {
    /// Edge length of each grid cell used for bucketing agents.
    pub cell_size: f64,
    /// Width of the indexed area in world units.
    pub world_width: f64,
    /// Height of the indexed area in world units.
    pub world_height: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 50.0,
            world_width: 1_000.0,
            world_height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    cell: CellCoord,
    position: (f64, f64),
}

/// Uniform grid index: coarse cell scan followed by an exact distance filter.
#[derive(Debug, Clone)]
pub struct UniformGridIndex<K> {
    config: GridConfig,
    grid_width: u32,
    grid_height: u32,
    cells: Vec<Vec<K>>,
    slots: HashMap<K, Slot>,
}

impl<K> UniformGridIndex<K>
where
    K: Copy + Eq + Hash,
{
    /// Create a new uniform grid covering the configured area.
    pub fn new(config: GridConfig) -> Result<Self, IndexError> {
        if !(config.cell_size.is_finite() && config.cell_size > 0.0) {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        if !(config.world_width.is_finite() && config.world_width > 0.0)
            || !(config.world_height.is_finite() && config.world_height > 0.0)
        {
            return Err(IndexError::InvalidConfig(
                "world dimensions must be positive",
            ));
        }
        let grid_width = (config.world_width / config.cell_size).ceil().max(1.0);
        let grid_height = (config.world_height / config.cell_size).ceil().max(1.0);
        if grid_width * grid_height > f64::from(u32::MAX) {
            return Err(IndexError::InvalidConfig(
                "cell_size is too small for the world dimensions",
            ));
        }
        let grid_width = grid_width as u32;
        let grid_height = grid_height as u32;
        let mut cells = Vec::new();
        cells.resize_with((grid_width as usize) * (grid_height as usize), Vec::new);
        Ok(Self {
            config,
            grid_width,
            grid_height,
            cells,
            slots: HashMap::new(),
        })
    }

    /// Returns the grid configuration.
    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Returns the edge length of one cell.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.config.cell_size
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn grid_width(&self) -> u32 {
        self.grid_width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn grid_height(&self) -> u32 {
        self.grid_height
    }

    fn axis_cell(value: f64, cell_size: f64, cells: u32) -> u32 {
        let raw = (value / cell_size).floor();
        if raw <= 0.0 {
            0
        } else if raw >= f64::from(cells - 1) {
            cells - 1
        } else {
            raw as u32
        }
    }

    /// Cell containing `position`, clamped to the grid extents.
    #[must_use]
    pub fn cell_of(&self, position: (f64, f64)) -> CellCoord {
        CellCoord {
            x: Self::axis_cell(position.0, self.config.cell_size, self.grid_width),
            y: Self::axis_cell(position.1, self.config.cell_size, self.grid_height),
        }
    }

    #[inline]
    fn offset(&self, cell: CellCoord) -> usize {
        (cell.y as usize) * (self.grid_width as usize) + (cell.x as usize)
    }

    /// Keys currently bucketed in `cell` (empty for out-of-range cells).
    #[must_use]
    pub fn cell_members(&self, cell: CellCoord) -> &[K] {
        if cell.x >= self.grid_width || cell.y >= self.grid_height {
            return &[];
        }
        &self.cells[self.offset(cell)]
    }

    /// Cell currently holding `key`.
    #[must_use]
    pub fn cell_of_key(&self, key: K) -> Option<CellCoord> {
        self.slots.get(&key).map(|slot| slot.cell)
    }

    /// Last recorded position for `key`.
    #[must_use]
    pub fn position_of(&self, key: K) -> Option<(f64, f64)> {
        self.slots.get(&key).map(|slot| slot.position)
    }

    /// Returns true if `key` is tracked by the index.
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(&key)
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Occupancy of every non-empty cell.
    #[must_use]
    pub fn cell_counts(&self) -> Vec<(CellCoord, usize)> {
        let width = self.grid_width as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, members)| !members.is_empty())
            .map(|(idx, members)| {
                (
                    CellCoord::new((idx % width) as u32, (idx / width) as u32),
                    members.len(),
                )
            })
            .collect()
    }

    /// Drop every tracked key.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.slots.clear();
    }

    fn check_finite(position: (f64, f64)) -> Result<(), IndexError> {
        if position.0.is_finite() && position.1.is_finite() {
            Ok(())
        } else {
            Err(IndexError::NonFinitePosition {
                x: position.0,
                y: position.1,
            })
        }
    }

    fn evict(&mut self, key: K, cell: CellCoord) {
        let offset = self.offset(cell);
        let members = &mut self.cells[offset];
        if let Some(at) = members.iter().position(|member| *member == key) {
            members.swap_remove(at);
        }
    }
}

impl<K> NeighborhoodIndex<K> for UniformGridIndex<K>
where
    K: Copy + Eq + Hash,
{
    fn insert(&mut self, key: K, position: (f64, f64)) -> Result<CellCoord, IndexError> {
        Self::check_finite(position)?;
        if self.slots.contains_key(&key) {
            return Err(IndexError::DuplicateKey);
        }
        let cell = self.cell_of(position);
        let offset = self.offset(cell);
        self.cells[offset].push(key);
        self.slots.insert(key, Slot { cell, position });
        Ok(cell)
    }

    fn remove(&mut self, key: K) -> Result<(f64, f64), IndexError> {
        let slot = self.slots.remove(&key).ok_or(IndexError::UnknownKey)?;
        self.evict(key, slot.cell);
        Ok(slot.position)
    }

    fn update_position(
        &mut self,
        key: K,
        old_position: (f64, f64),
        new_position: (f64, f64),
    ) -> Result<bool, IndexError> {
        Self::check_finite(new_position)?;
        let tracked = self.slots.get(&key).ok_or(IndexError::UnknownKey)?.cell;
        let claimed = self.cell_of(old_position);
        if claimed != tracked {
            return Err(IndexError::CellMismatch { tracked, claimed });
        }
        let new_cell = self.cell_of(new_position);
        if new_cell == tracked {
            if let Some(slot) = self.slots.get_mut(&key) {
                slot.position = new_position;
            }
            return Ok(false);
        }
        self.evict(key, tracked);
        let offset = self.offset(new_cell);
        self.cells[offset].push(key);
        self.slots.insert(
            key,
            Slot {
                cell: new_cell,
                position: new_position,
            },
        );
        Ok(true)
    }

    fn neighbors_within(
        &self,
        center: (f64, f64),
        radius: f64,
        visitor: &mut dyn FnMut(K, OrderedFloat<f64>),
    ) {
        if !(radius.is_finite() && radius >= 0.0) || !center.0.is_finite() || !center.1.is_finite()
        {
            return;
        }
        let cell_size = self.config.cell_size;
        let min_x = Self::axis_cell(center.0 - radius, cell_size, self.grid_width);
        let max_x = Self::axis_cell(center.0 + radius, cell_size, self.grid_width);
        let min_y = Self::axis_cell(center.1 - radius, cell_size, self.grid_height);
        let max_y = Self::axis_cell(center.1 + radius, cell_size, self.grid_height);
        let radius_sq = radius * radius;

        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                for &key in &self.cells[self.offset(CellCoord::new(cx, cy))] {
                    let Some(slot) = self.slots.get(&key) else {
                        continue;
                    };
                    let dx = slot.position.0 - center.0;
                    let dy = slot.position.1 - center.1;
                    let dist_sq = dx * dx + dy * dy;
                    if dist_sq <= radius_sq {
                        visitor(key, OrderedFloat(dist_sq));
                    }
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn grid() -> UniformGridIndex<u32> {
        UniformGridIndex::new(GridConfig {
            cell_size: 10.0,
            world_width: 100.0,
            world_height: 80.0,
        })
        .expect("grid")
    }

    fn brute_force(points: &[(u32, (f64, f64))], center: (f64, f64), radius: f64) -> BTreeSet<u32> {
        points
            .iter()
            .filter(|(_, (x, y))| {
                let dx = x - center.0;
                let dy = y - center.1;
                dx * dx + dy * dy <= radius * radius
            })
            .map(|(id, _)| *id)
            .collect()
    }

    #[test]
    fn rejects_invalid_configuration() {
        let bad_cell = UniformGridIndex::<u32>::new(GridConfig {
            cell_size: 0.0,
            ..GridConfig::default()
        });
        assert_eq!(
            bad_cell.unwrap_err(),
            IndexError::InvalidConfig("cell_size must be positive")
        );
        let bad_world = UniformGridIndex::<u32>::new(GridConfig {
            world_width: -1.0,
            ..GridConfig::default()
        });
        assert!(matches!(bad_world, Err(IndexError::InvalidConfig(_))));
    }

    #[test]
    fn grid_dimensions_round_up() {
        let index = UniformGridIndex::<u32>::new(GridConfig {
            cell_size: 50.0,
            world_width: 1_000.0,
            world_height: 820.0,
        })
        .expect("grid");
        assert_eq!(index.grid_width(), 20);
        assert_eq!(index.grid_height(), 17);
    }

    #[test]
    fn cell_of_clamps_to_grid_extents() {
        let index = grid();
        assert_eq!(index.cell_of((-5.0, -5.0)), CellCoord::new(0, 0));
        assert_eq!(index.cell_of((15.0, 25.0)), CellCoord::new(1, 2));
        assert_eq!(index.cell_of((500.0, 500.0)), CellCoord::new(9, 7));
    }

    #[test]
    fn insert_then_remove_restores_membership() {
        let mut index = grid();
        index.insert(1, (5.0, 5.0)).expect("insert 1");
        index.insert(2, (15.0, 5.0)).expect("insert 2");
        let before_counts = index.cell_counts();
        let before_len = index.len();

        let cell = index.insert(3, (7.0, 3.0)).expect("insert 3");
        assert_eq!(cell, CellCoord::new(0, 0));
        assert_eq!(index.remove(3).expect("remove"), (7.0, 3.0));

        assert_eq!(index.len(), before_len);
        assert_eq!(index.cell_counts(), before_counts);
        assert!(!index.contains(3));
    }

    #[test]
    fn duplicate_and_unknown_keys_are_errors() {
        let mut index = grid();
        index.insert(1, (5.0, 5.0)).expect("insert");
        assert_eq!(index.insert(1, (6.0, 6.0)), Err(IndexError::DuplicateKey));
        assert_eq!(index.remove(9), Err(IndexError::UnknownKey));
        assert_eq!(
            index.update_position(9, (0.0, 0.0), (1.0, 1.0)),
            Err(IndexError::UnknownKey)
        );
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let mut index = grid();
        assert!(matches!(
            index.insert(1, (f64::NAN, 0.0)),
            Err(IndexError::NonFinitePosition { .. })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn relocation_across_cells_moves_membership() {
        let mut index = grid();
        index.insert(7, (5.0, 5.0)).expect("insert");
        let moved = index
            .update_position(7, (5.0, 5.0), (25.0, 5.0))
            .expect("relocate");
        assert!(moved);
        assert_eq!(index.cell_of_key(7), Some(CellCoord::new(2, 0)));
        assert!(index.cell_members(CellCoord::new(0, 0)).is_empty());
        assert_eq!(index.cell_members(CellCoord::new(2, 0)), &[7]);
    }

    #[test]
    fn relocation_within_cell_keeps_membership() {
        let mut index = grid();
        index.insert(7, (1.0, 1.0)).expect("insert");
        let counts = index.cell_counts();
        let moved = index
            .update_position(7, (1.0, 1.0), (8.0, 9.0))
            .expect("relocate");
        assert!(!moved);
        assert_eq!(index.cell_counts(), counts);
        assert_eq!(index.position_of(7), Some((8.0, 9.0)));
        assert_eq!(index.query_range((8.0, 9.0), 0.5), vec![7]);
    }

    #[test]
    fn stale_old_position_is_reported() {
        let mut index = grid();
        index.insert(7, (1.0, 1.0)).expect("insert");
        let err = index
            .update_position(7, (55.0, 55.0), (2.0, 2.0))
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::CellMismatch {
                tracked: CellCoord::new(0, 0),
                claimed: CellCoord::new(5, 5),
            }
        );
    }

    #[test]
    fn query_filters_square_corners_by_exact_distance() {
        let mut index = grid();
        index.insert(1, (50.0, 50.0)).expect("center");
        index.insert(2, (57.0, 57.0)).expect("corner, ~9.9 away");
        index.insert(3, (59.0, 59.0)).expect("corner, ~12.7 away");
        let found: BTreeSet<u32> = index.query_range((50.0, 50.0), 10.0).into_iter().collect();
        assert_eq!(found, BTreeSet::from([1, 2]));
    }

    #[test]
    fn neighbors_within_reports_squared_distance() {
        let mut index = grid();
        index.insert(4, (3.0, 4.0)).expect("insert");
        let mut seen = Vec::new();
        index.neighbors_within((0.0, 0.0), 5.0, &mut |key, dist_sq| seen.push((key, dist_sq)));
        assert_eq!(seen, vec![(4, OrderedFloat(25.0))]);
    }

    #[test]
    fn negative_radius_finds_nothing() {
        let mut index = grid();
        index.insert(1, (5.0, 5.0)).expect("insert");
        assert!(index.query_range((5.0, 5.0), -1.0).is_empty());
    }

    #[test]
    fn clear_drops_all_members() {
        let mut index = grid();
        for id in 0..10 {
            index.insert(id, (f64::from(id) * 9.0, 3.0)).expect("insert");
        }
        index.clear();
        assert!(index.is_empty());
        assert!(index.cell_counts().is_empty());
    }

    proptest! {
        #[test]
        fn query_matches_brute_force(
            points in proptest::collection::vec((-20.0f64..120.0, -20.0f64..100.0), 0..120),
            center in (-30.0f64..130.0, -30.0f64..110.0),
            radius in 0.0f64..60.0,
        ) {
            let mut index = grid();
            let tagged: Vec<(u32, (f64, f64))> = points
                .into_iter()
                .enumerate()
                .map(|(id, p)| (id as u32, p))
                .collect();
            for &(id, position) in &tagged {
                index.insert(id, position).expect("insert");
            }
            let found: BTreeSet<u32> = index.query_range(center, radius).into_iter().collect();
            prop_assert_eq!(found, brute_force(&tagged, center, radius));
        }

        #[test]
        fn relocation_keeps_exactly_one_membership(
            start in (0.0f64..100.0, 0.0f64..80.0),
            moves in proptest::collection::vec((0.0f64..100.0, 0.0f64..80.0), 1..20),
        ) {
            let mut index = grid();
            index.insert(0u32, start).expect("insert");
            let mut current = start;
            for next in moves {
                index.update_position(0, current, next).expect("relocate");
                current = next;
                let expected = index.cell_of(current);
                let holders: usize = index.cell_counts().iter().map(|(_, n)| n).sum();
                prop_assert_eq!(holders, 1);
                prop_assert_eq!(index.cell_of_key(0), Some(expected));
                prop_assert_eq!(index.cell_members(expected), &[0u32][..]);
            }
        }
    }
}
