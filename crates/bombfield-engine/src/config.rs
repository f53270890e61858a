//! Engine configuration.

use std::time::Duration;

use bombfield_protocol::Position;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MatchmakingMode
// ---------------------------------------------------------------------------

/// How the registry places joining participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchmakingMode {
    /// Scan for a waiting session with a free slot, otherwise open a new one.
    #[default]
    Multi,
    /// Every join targets one fixed session. Once it is full, joins are
    /// rejected until it empties.
    Single,
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Rules and tuning for every session the engine creates.
///
/// The defaults reproduce the classic three-player board. Probabilities
/// outside `0.0..=1.0` behave as if clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub width: usize,
    pub height: usize,

    /// Spawn cell per slot; slot `n` uses `spawn_points[n - 1]`.
    pub spawn_points: Vec<Position>,

    /// Roster cap. Effectively `min(max_participants, spawn_points.len())`.
    pub max_participants: usize,

    /// Delay between placing a bomb and its detonation.
    pub fuse: Duration,

    /// How long a blast stays on screen before the clear step runs.
    pub blast_display: Duration,

    /// Chance that a free, non-protected cell starts as a block.
    pub block_density: f64,

    /// Chance that a destroyed block drops a power-up.
    pub power_up_chance: f64,

    pub starting_bombs: u32,
    pub starting_radius: u32,
    pub max_bombs: u32,
    pub max_radius: u32,

    /// Movement interval a participant starts with.
    pub base_move_interval: Duration,
    /// How much each Speed power-up shaves off the interval.
    pub speed_step: Duration,
    /// The interval never drops below this.
    pub min_move_interval: Duration,

    /// Reject moves that arrive sooner than the participant's interval.
    pub throttle_moves: bool,

    pub matchmaking: MatchmakingMode,

    /// Capacity of each session's command queue.
    pub channel_size: usize,
}

impl EngineConfig {
    /// Number of participants a session can actually seat.
    pub fn capacity(&self) -> usize {
        self.max_participants.min(self.spawn_points.len())
    }

    /// Spawn cell for a 1-based slot.
    pub fn spawn_for(&self, slot: u8) -> Option<Position> {
        (slot as usize)
            .checked_sub(1)
            .and_then(|i| self.spawn_points.get(i))
            .copied()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 13,
            height: 11,
            spawn_points: vec![
                Position::new(1, 1),
                Position::new(11, 1),
                Position::new(1, 9),
            ],
            max_participants: 3,
            fuse: Duration::from_millis(2000),
            blast_display: Duration::from_millis(500),
            block_density: 0.7,
            power_up_chance: 0.3,
            starting_bombs: 1,
            starting_radius: 2,
            max_bombs: 10,
            max_radius: 10,
            base_move_interval: Duration::from_millis(100),
            speed_step: Duration::from_millis(10),
            min_move_interval: Duration::from_millis(50),
            throttle_moves: true,
            matchmaking: MatchmakingMode::Multi,
            channel_size: 64,
        }
    }
}
