//! Unified error type for the Bombfield server.

use bombfield_engine::EngineError;
use bombfield_protocol::ProtocolError;

use crate::transport::TransportError;

/// Top-level error wrapping every layer's error.
#[derive(Debug, thiserror::Error)]
pub enum BombfieldError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
