//! The game model shared by the engine and the wire.
//!
//! These are plain data types. The rules that mutate them live in
//! `bombfield-engine`; here we only define shape, serialization, and the
//! small geometric helpers both sides need.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BombId, ParticipantId};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A cell coordinate. `(0, 0)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance.
    pub fn chebyshev(&self, other: &Position) -> usize {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four axis directions a participant can move or a blast can
/// travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Blast expansion order.
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Unit offset as `(dx, dy)`.
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Contents of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Empty,
    /// Unbreakable. Border and even-coordinate cells are always walls.
    Wall,
    /// Breakable by a blast; may drop a power-up.
    Block,
}

impl Cell {
    /// Whether a participant or blast may pass through this cell.
    pub fn is_open(self) -> bool {
        self == Self::Empty
    }
}

/// A fixed-size board stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Creates a `width`×`height` grid with every cell set to `fill`.
    pub fn filled(width: usize, height: usize, fill: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Returns the cell at `pos`, or `None` when out of bounds.
    pub fn get(&self, pos: Position) -> Option<Cell> {
        self.contains(pos)
            .then(|| self.cells[pos.y * self.width + pos.x])
    }

    /// Overwrites the cell at `pos`. Returns `false` (and does nothing)
    /// when out of bounds.
    pub fn set(&mut self, pos: Position, cell: Cell) -> bool {
        if !self.contains(pos) {
            return false;
        }
        self.cells[pos.y * self.width + pos.x] = cell;
        true
    }

    /// One step from `from` in `dir`, clamped to the grid edge.
    pub fn step(&self, from: Position, dir: Direction) -> Position {
        let max_x = self.width.saturating_sub(1);
        let max_y = self.height.saturating_sub(1);
        match dir {
            Direction::Up => Position::new(from.x, from.y.saturating_sub(1)),
            Direction::Down => Position::new(from.x, (from.y + 1).min(max_y)),
            Direction::Left => Position::new(from.x.saturating_sub(1), from.y),
            Direction::Right => Position::new((from.x + 1).min(max_x), from.y),
        }
    }

    /// The cell `distance` steps from `from` in `dir`, or `None` if that
    /// leaves the grid. Unlike [`step`](Self::step) this never clamps.
    pub fn ray(&self, from: Position, dir: Direction, distance: usize) -> Option<Position> {
        let (dx, dy) = dir.offset();
        let x = from.x.checked_add_signed(dx * distance as isize)?;
        let y = from.y.checked_add_signed(dy * distance as isize)?;
        let pos = Position::new(x, y);
        self.contains(pos).then_some(pos)
    }

    /// Iterates every `(position, cell)` pair row by row.
    pub fn iter(&self) -> impl Iterator<Item = (Position, Cell)> + '_ {
        self.cells.iter().enumerate().map(move |(i, cell)| {
            (Position::new(i % self.width, i / self.width), *cell)
        })
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Stat boost applied the moment a participant steps on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    ExtraBomb,
    BiggerBlast,
    Speed,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] = [Self::ExtraBomb, Self::BiggerBlast, Self::Speed];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerUp {
    pub position: Position,
    pub kind: PowerUpKind,
}

/// A player's in-session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Spawn slot, 1-based.
    pub slot: u8,
    pub position: Position,
    /// Bombs this participant can still place right now.
    pub bombs: u32,
    pub blast_radius: u32,
    /// Minimum time between two accepted moves. Lower is faster.
    pub move_interval_ms: u64,
    pub alive: bool,
    pub ready: bool,
}

/// Public view of a live bomb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BombInfo {
    pub id: BombId,
    pub owner: ParticipantId,
    pub position: Position,
    /// Radius captured from the owner when the bomb was placed.
    pub radius: u32,
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Session lifecycle.
///
/// ```text
/// Waiting ⇄ ReadyCheck → Active → Over
/// ```
///
/// ReadyCheck falls back to Waiting when a participant leaves before the
/// game starts. Nothing leaves Over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Waiting,
    ReadyCheck,
    Active,
    Over,
}

impl Phase {
    /// Accepting new participants.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Moves and bombs are processed only while Active.
    pub fn accepts_actions(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Ready flags are collected before the game starts.
    pub fn accepts_ready(self) -> bool {
        matches!(self, Self::Waiting | Self::ReadyCheck)
    }

    pub fn is_over(self) -> bool {
        matches!(self, Self::Over)
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::ReadyCheck)
                | (Self::ReadyCheck, Self::Waiting)
                | (Self::ReadyCheck, Self::Active)
                | (Self::Active, Self::Over)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "Waiting",
            Self::ReadyCheck => "ReadyCheck",
            Self::Active => "Active",
            Self::Over => "Over",
        };
        f.write_str(name)
    }
}

/// Everything a freshly joined client needs to render the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub grid: Grid,
    pub roster: Vec<Participant>,
    pub phase: Phase,
    pub bombs: Vec<BombInfo>,
    pub power_ups: Vec<PowerUp>,
}
