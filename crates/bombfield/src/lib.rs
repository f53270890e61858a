//! # Bombfield
//!
//! Server-authoritative three-player bombing arena.
//!
//! Clients connect over WebSocket and send intents (`join`, `ready`,
//! `move`, `place_bomb`). The engine validates them against the session's
//! authoritative state and broadcasts the resulting notifications to every
//! participant of that session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bombfield::prelude::*;
//!
//! # async fn run() -> Result<(), BombfieldError> {
//! let server = BombfieldServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod gateway;
mod handler;
mod server;
pub mod transport;

pub use error::BombfieldError;
pub use server::{BombfieldServer, BombfieldServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{BombfieldError, BombfieldServer, BombfieldServerBuilder};
    pub use bombfield_engine::{EngineConfig, MatchmakingMode, SessionInfo};
    pub use bombfield_protocol::{
        Codec, Direction, Envelope, Intent, JoinReply, JsonCodec, Notification, ParticipantId,
        Payload, Phase, Position, SessionId,
    };
}
