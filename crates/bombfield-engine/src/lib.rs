//! Authoritative game engine for Bombfield.
//!
//! Each session runs as an isolated Tokio task (actor model) that owns its
//! board, roster, bombs, and timers. Everything that touches a session
//! (intents, joins, leaves, fuse and blast-clear expiries) is serialized
//! through that task.
//!
//! # Key types
//!
//! - [`SessionRegistry`]: matchmaking, routing, teardown
//! - [`SessionHandle`]: send commands to a running session actor
//! - [`SessionState`]: the rules, usable without a runtime
//! - [`EngineConfig`]: board size, timings, caps, matchmaking mode
//! - [`generate`] / [`blast_cells`]: board generation and blast shape

mod actor;
mod blast;
mod config;
mod error;
mod grid;
mod registry;
mod state;

pub use actor::{NotificationSender, SessionHandle, SessionInfo};
pub use blast::blast_cells;
pub use config::{EngineConfig, MatchmakingMode};
pub use error::{EngineError, Rejection};
pub use grid::{SPAWN_CLEARANCE, generate, is_fixed_wall};
pub use registry::{Joined, SessionRegistry};
pub use state::SessionState;
