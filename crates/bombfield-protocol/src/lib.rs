//! Shared model and wire protocol for Bombfield.
//!
//! - **Model** ([`Grid`], [`Participant`], [`Phase`], ...): the game data
//!   the engine owns and clients render.
//! - **Messages** ([`Intent`], [`Notification`], [`JoinReply`],
//!   [`Envelope`]): what crosses the socket.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, bytes out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Engine (Intent / Notification)
//! ```

mod codec;
mod error;
mod model;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use model::{
    BombInfo, Cell, Direction, Grid, Participant, Phase, Position, PowerUp, PowerUpKind,
    Snapshot,
};
pub use types::{
    BombId, Envelope, Intent, JoinReply, Notification, ParticipantId, Payload, ReadyEntry,
    SessionId,
};
