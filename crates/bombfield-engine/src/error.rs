//! Error types for the engine.
//!
//! Two kinds of failure live here and they travel differently:
//!
//! - [`EngineError`] is returned from registry and handle calls. Its
//!   [`reason`](EngineError::reason) string is what a rejected `join`
//!   reply carries to the client.
//! - [`Rejection`] explains why a move, bomb, or ready intent had no
//!   effect. Intents are fire-and-forget, so a rejection is logged and the
//!   client simply sees no notification.

use bombfield_protocol::{ParticipantId, Phase, SessionId};

/// Errors returned by session and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Every slot in the session is taken.
    #[error("session {0} is full")]
    RoomFull(SessionId),

    /// The session does not exist.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The participant is still seated in a session that has not ended.
    #[error("participant {0} already in session {1}")]
    AlreadyJoined(ParticipantId, SessionId),

    /// The participant has no session mapping.
    #[error("participant {0} is not in any session")]
    UnknownParticipant(ParticipantId),

    /// The session's phase does not allow this operation, e.g. joining
    /// a game that has already started.
    #[error("operation not allowed while session is {0}")]
    InvalidPhase(Phase),

    /// The session actor is gone or its command queue is closed.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}

impl EngineError {
    /// Short machine-readable reason sent to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RoomFull(_) => "RoomFull",
            Self::NotFound(_) => "NotFound",
            Self::AlreadyJoined(..) => "AlreadyJoined",
            Self::UnknownParticipant(_) => "UnknownParticipant",
            Self::InvalidPhase(_) => "InvalidPhase",
            Self::Unavailable(_) => "Unavailable",
        }
    }
}

/// Why an intent was dropped without effect.
///
/// Rejections are never surfaced to clients; they are logged at `debug`
/// and the intent produces no notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("session is not active")]
    NotActive,

    #[error("unknown participant")]
    UnknownParticipant,

    #[error("participant is not alive")]
    NotAlive,

    /// Target cell is a wall, a block, or holds a live bomb.
    #[error("target cell is blocked")]
    Blocked,

    #[error("no bombs left")]
    NoBombsLeft,

    #[error("a bomb already occupies this cell")]
    CellOccupied,

    /// Move arrived before the participant's movement interval elapsed.
    #[error("moving faster than allowed")]
    TooSoon,
}
