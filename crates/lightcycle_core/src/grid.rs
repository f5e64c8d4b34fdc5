//! World grid: occupancy and ownership arrays.
//!
//! Two flat, row-major arrays of the same shape back the arena:
//! `occupancy` (0 = empty, 1 = wall or trail) and `owner` (the agent id that
//! wrote the cell, or [`NO_OWNER`]). All writes go through [`Grid::set`] and
//! [`Grid::clear`] so the two arrays never disagree.
//!
//! The playable area excludes a one-cell border on every side and the top
//! `safe_zone_rows` rows, which are reserved for the HUD.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::math::{Direction, GridPos};

/// Owner value of an empty cell or a static wall.
pub const NO_OWNER: i32 = -1;

/// Height in pixels of the HUD band at the top of the canvas.
pub const HUD_HEIGHT_PX: f32 = 60.0;

/// Distance of each gate from its edge of the play area, in cells.
pub const GATE_INSET: i32 = 3;

/// A spawn point and the heading agents leave it with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    /// Spawn cell.
    pub pos: GridPos,
    /// Initial heading, pointing into the arena.
    pub heading: Direction,
}

/// Occupancy and owner arrays plus the bounds rules around them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    cols: i32,
    rows: i32,
    safe_zone_rows: i32,
    occupancy: Vec<u8>,
    owner: Vec<i32>,
}

impl Grid {
    /// Create an empty grid.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidDimensions`] if the play area would be
    /// empty.
    pub fn new(cols: i32, rows: i32, safe_zone_rows: i32) -> Result<Self> {
        if cols < 3 || rows - safe_zone_rows.max(1) < 2 || safe_zone_rows < 0 {
            return Err(SimError::InvalidDimensions {
                width: cols.max(0).unsigned_abs(),
                height: rows.max(0).unsigned_abs(),
                cell_size: 1.0,
            });
        }

        let len = (cols * rows) as usize;
        Ok(Self {
            cols,
            rows,
            safe_zone_rows: safe_zone_rows.max(1),
            occupancy: vec![0; len],
            owner: vec![NO_OWNER; len],
        })
    }

    /// Build the grid for a canvas: `ceil(width / cell) × ceil(height / cell)`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidDimensions`] for a zero canvas, a
    /// non-positive cell size, or a canvas too small to play on.
    pub fn for_canvas(width: u32, height: u32, cell_size: f32) -> Result<Self> {
        let invalid = || SimError::InvalidDimensions {
            width,
            height,
            cell_size,
        };

        if width == 0 || height == 0 || !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(invalid());
        }

        let cols = (width as f32 / cell_size).ceil() as i32;
        let rows = (height as f32 / cell_size).ceil() as i32;
        let safe_zone_rows = (HUD_HEIGHT_PX / cell_size).ceil() as i32;

        Self::new(cols, rows, safe_zone_rows).map_err(|_| invalid())
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> i32 {
        self.cols
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> i32 {
        self.rows
    }

    /// Rows reserved for the HUD at the top.
    #[must_use]
    pub const fn safe_zone_rows(&self) -> i32 {
        self.safe_zone_rows
    }

    #[inline]
    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.cols + pos.x) as usize)
    }

    /// Whether `pos` lies inside the arrays at all.
    #[must_use]
    pub const fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.cols && pos.y < self.rows
    }

    /// Whether `pos` lies in the playable area (inside border and safe zone).
    #[must_use]
    pub const fn in_play(&self, pos: GridPos) -> bool {
        pos.x >= 1
            && pos.x <= self.cols - 2
            && pos.y >= self.safe_zone_rows
            && pos.y <= self.rows - 2
    }

    /// Whether the cell is a wall or trail. Out-of-bounds counts as occupied.
    #[must_use]
    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.index(pos).map_or(true, |i| self.occupancy[i] != 0)
    }

    /// A cell an agent may move into: in play and empty.
    #[must_use]
    pub fn is_safe(&self, pos: GridPos) -> bool {
        self.in_play(pos) && !self.is_occupied(pos)
    }

    /// Agent id that owns the cell, if any.
    #[must_use]
    pub fn owner_at(&self, pos: GridPos) -> Option<i32> {
        self.index(pos)
            .map(|i| self.owner[i])
            .filter(|&owner| owner != NO_OWNER)
    }

    /// Mark a cell occupied by `id`. Returns `false` if out of bounds.
    pub fn set(&mut self, pos: GridPos, id: i32) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.occupancy[i] = 1;
                self.owner[i] = id;
                true
            }
            None => false,
        }
    }

    /// Place an ownerless wall.
    pub fn place_wall(&mut self, pos: GridPos) -> bool {
        self.set(pos, NO_OWNER)
    }

    /// Empty a cell in both arrays.
    pub fn clear(&mut self, pos: GridPos) {
        if let Some(i) = self.index(pos) {
            self.occupancy[i] = 0;
            self.owner[i] = NO_OWNER;
        }
    }

    /// Empty a cell only if `id` owns it. Returns whether it was cleared.
    pub fn clear_if_owned(&mut self, pos: GridPos, id: i32) -> bool {
        match self.index(pos) {
            Some(i) if self.owner[i] == id => {
                self.occupancy[i] = 0;
                self.owner[i] = NO_OWNER;
                true
            }
            _ => false,
        }
    }

    /// Empty every cell.
    pub fn reset(&mut self) {
        self.occupancy.fill(0);
        self.owner.fill(NO_OWNER);
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupancy.iter().filter(|&&c| c != 0).count()
    }

    /// Raw occupancy array, row-major.
    #[must_use]
    pub fn occupancy(&self) -> &[u8] {
        &self.occupancy
    }

    /// Raw owner array, row-major.
    #[must_use]
    pub fn owners(&self) -> &[i32] {
        &self.owner
    }

    /// Centre column and row of the play area.
    fn play_centre(&self) -> GridPos {
        GridPos::new(self.cols / 2, (self.safe_zone_rows + self.rows - 2) / 2)
    }

    fn clamp_to_play(&self, pos: GridPos) -> GridPos {
        GridPos::new(
            pos.x.clamp(1, self.cols - 2),
            pos.y.clamp(self.safe_zone_rows, self.rows - 2),
        )
    }

    /// The four AI spawn gates: top, right, bottom, left.
    #[must_use]
    pub fn gates(&self) -> [Gate; 4] {
        let centre = self.play_centre();
        let top = self.safe_zone_rows + GATE_INSET;
        let bottom = self.rows - 2 - GATE_INSET;
        let left = 1 + GATE_INSET;
        let right = self.cols - 2 - GATE_INSET;

        [
            Gate {
                pos: self.clamp_to_play(GridPos::new(centre.x, top)),
                heading: Direction::Down,
            },
            Gate {
                pos: self.clamp_to_play(GridPos::new(right, centre.y)),
                heading: Direction::Left,
            },
            Gate {
                pos: self.clamp_to_play(GridPos::new(centre.x, bottom)),
                heading: Direction::Up,
            },
            Gate {
                pos: self.clamp_to_play(GridPos::new(left, centre.y)),
                heading: Direction::Right,
            },
        ]
    }

    /// Fixed spawn of the user agent: bottom centre, heading up.
    #[must_use]
    pub fn user_spawn(&self) -> Gate {
        Gate {
            pos: GridPos::new(self.cols / 2, self.rows - 2),
            heading: Direction::Up,
        }
    }

    /// Count empty cells reachable from `start` by 4-way moves.
    ///
    /// `start` itself counts if it is safe. Traversal stops once `cap` cells
    /// have been visited, so the result is at most `cap`.
    #[must_use]
    pub fn reachable_area(&self, start: GridPos, cap: usize) -> usize {
        if cap == 0 || !self.is_safe(start) {
            return 0;
        }

        let mut visited = HashSet::with_capacity(cap);
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(pos) = queue.pop_front() {
            for dir in Direction::ALL {
                if visited.len() >= cap {
                    return visited.len();
                }
                let next = pos.step(dir);
                if self.is_safe(next) && visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited.len()
    }

    /// Empty cells in a straight line from `from` (exclusive), up to `limit`.
    #[must_use]
    pub fn clear_run(&self, from: GridPos, dx: i32, dy: i32, limit: i32) -> i32 {
        let mut count = 0;
        let mut pos = from;
        while count < limit {
            pos = pos.offset(dx, dy);
            if !self.is_safe(pos) {
                break;
            }
            count += 1;
        }
        count
    }
}
