//! Error types for the protocol layer.
//!
//! Every crate in the workspace has its own error enum. A `ProtocolError`
//! always means the bytes or the message shape were wrong; it never
//! carries a game rule violation (those are
//! `bombfield_engine::EngineError`) or a socket failure.

/// Errors raised while turning frames into messages and back.
///
/// The connection handler answers inbound `Decode` and `InvalidMessage`
/// errors with a `400` error payload and keeps the connection open, so a
/// client that sends one bad frame can still play.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A value could not be serialized.
    ///
    /// The wire types are plain structs and enums with string keys, so this
    /// only fires if a codec is handed something it cannot represent.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A frame could not be parsed into the expected type.
    ///
    /// Malformed JSON, unknown intent tags, and missing fields all land
    /// here.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but is not valid in this position of the
    /// conversation (for example a server-only payload sent by a client).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
