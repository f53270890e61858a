//! Frame codecs.
//!
//! A codec turns [`Envelope`](crate::Envelope)s into frame bytes and back.
//! The connection handler never touches `serde_json` directly; it goes
//! through a [`Codec`], so a binary format could replace JSON without any
//! change to the handler or the engine.
//!
//! Only [`JsonCodec`] ships today. Browser clients parse JSON
//! text frames by hand, and JSON keeps every frame readable in dev tools,
//! which matters more for a three-player game than frame size does.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes outbound values to bytes and decodes inbound bytes.
///
/// ## Bounds
///
/// - `Send + Sync`: one codec value is shared by every connection task,
///   and Tokio may poll those tasks on any worker thread.
/// - `'static`: the codec lives in the server state for the whole run and
///   borrows nothing.
///
/// ## Generic methods
///
/// `encode` accepts any `T: Serialize` and `decode` any
/// `T: DeserializeOwned`. `DeserializeOwned` rather than `Deserialize<'de>`
/// means the decoded value does not borrow from the frame, so the handler
/// can drop the inbound buffer as soon as decoding returns.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Parses a frame into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError`] if the bytes are malformed or do not
    /// match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON frames via `serde_json`. Readable in browser dev tools, which is
/// what browser clients expect.
///
/// ```rust
/// use bombfield_protocol::{Codec, Envelope, Intent, JsonCodec, Payload};
///
/// let codec = JsonCodec;
/// let envelope = Envelope {
///     seq: 1,
///     timestamp: 0,
///     payload: Payload::Intent { request_id: Some(7), intent: Intent::Ready },
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Direction, Envelope, Intent, Payload};

    #[test]
    fn test_decode_client_move_frame() {
        let raw = br#"{
            "seq": 3,
            "timestamp": 1200,
            "payload": {
                "type": "Intent",
                "data": { "request_id": null, "intent": { "type": "move", "direction": "left" } }
            }
        }"#;

        let env: Envelope = JsonCodec.decode(raw).unwrap();

        assert_eq!(env.seq, 3);
        assert_eq!(
            env.payload,
            Payload::Intent {
                request_id: None,
                intent: Intent::Move { direction: Direction::Left },
            }
        );
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"\x00\x01 nope");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
