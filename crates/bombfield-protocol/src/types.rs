//! Identity types and the messages that travel between client and server.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BombInfo, Direction, Grid, Participant, Position, PowerUp, PowerUpKind, Snapshot};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Ephemeral per-connection handle. Stable for the lifetime of the
/// connection and never reused while the process runs.
///
/// Serialized as a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifies one independent game instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Unique within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BombId(pub u64);

impl fmt::Display for BombId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// What a client asks the engine to do.
///
/// Disconnects are not an intent; the transport reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Join,
    Ready,
    Move { direction: Direction },
    PlaceBomb,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Answer to a `join` intent.
///
/// Shaped for the browser client: `success` decides which other fields
/// are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl JoinReply {
    pub fn joined(session_id: SessionId, participant: Participant, snapshot: Snapshot) -> Self {
        Self {
            success: true,
            session_id: Some(session_id),
            participant: Some(participant),
            snapshot: Some(snapshot),
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: None,
            participant: None,
            snapshot: None,
            reason: Some(reason.into()),
        }
    }
}

/// One row of the ready map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyEntry {
    pub participant: ParticipantId,
    pub ready: bool,
}

/// State deltas broadcast to every participant of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    ParticipantJoined {
        participant: Participant,
        total: usize,
    },
    ReadyStatus {
        ready: Vec<ReadyEntry>,
    },
    GameStarted {
        grid: Grid,
        roster: Vec<Participant>,
    },
    PositionChanged {
        participant: ParticipantId,
        position: Position,
    },
    BombPlaced {
        bomb: BombInfo,
    },
    BombDetonated {
        bomb: BombId,
        blast: Vec<Position>,
        casualties: Vec<ParticipantId>,
        grid: Grid,
        power_ups: Vec<PowerUp>,
    },
    PowerUpConsumed {
        participant: Participant,
        kind: PowerUpKind,
        power_ups: Vec<PowerUp>,
    },
    BlastCleared {
        bomb: BombId,
    },
    /// `winner` is `None` on a draw.
    GameOver {
        winner: Option<Participant>,
    },
    ParticipantLeft {
        participant: ParticipantId,
        total: usize,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Contents of an [`Envelope`].
///
/// Adjacently tagged: `{ "type": "Event", "data": { "event": "bomb_placed", ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Client → server. `request_id` is echoed in the matching [`Payload::Reply`].
    Intent {
        #[serde(default)]
        request_id: Option<u64>,
        intent: Intent,
    },
    /// Server → client answer to a request.
    Reply {
        request_id: Option<u64>,
        reply: JoinReply,
    },
    /// Server → client broadcast.
    Event(Notification),
    /// Server → client: the last frame could not be processed.
    Error { code: u16, message: String },
}

/// Every frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    //! JSON shape checks. The browser client parses these by hand, so a
    //! renamed field is a breaking change.

    use super::*;
    use crate::{Cell, Phase};

    fn participant() -> Participant {
        Participant {
            id: ParticipantId(4),
            slot: 1,
            position: Position::new(1, 1),
            bombs: 1,
            blast_radius: 2,
            move_interval_ms: 100,
            alive: true,
            ready: false,
        }
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&ParticipantId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&SessionId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&BombId(9)).unwrap(), "9");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ParticipantId(7).to_string(), "P-7");
        assert_eq!(SessionId(3).to_string(), "S-3");
        assert_eq!(BombId(1).to_string(), "B-1");
    }

    #[test]
    fn test_intent_json_format() {
        let json = serde_json::to_value(Intent::Move { direction: Direction::Up }).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["direction"], "up");

        let json = serde_json::to_value(Intent::PlaceBomb).unwrap();
        assert_eq!(json["type"], "place_bomb");
    }

    #[test]
    fn test_unknown_intent_is_rejected() {
        let result: Result<Intent, _> = serde_json::from_str(r#"{"type":"teleport"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_join_reply_rejected_shape() {
        let json = serde_json::to_value(JoinReply::rejected("RoomFull")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["reason"], "RoomFull");
        assert!(json.get("snapshot").is_none());
        assert!(json.get("session_id").is_none());
    }

    #[test]
    fn test_join_reply_joined_shape() {
        let snapshot = Snapshot {
            grid: Grid::filled(3, 3, Cell::Empty),
            roster: vec![participant()],
            phase: Phase::Waiting,
            bombs: vec![],
            power_ups: vec![],
        };
        let json =
            serde_json::to_value(JoinReply::joined(SessionId(2), participant(), snapshot)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["session_id"], 2);
        assert_eq!(json["participant"]["slot"], 1);
        assert_eq!(json["snapshot"]["phase"], "Waiting");
        assert_eq!(json["snapshot"]["grid"]["cells"][0], "empty");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_notification_is_tagged_by_event() {
        let n = Notification::PositionChanged {
            participant: ParticipantId(1),
            position: Position::new(2, 1),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["event"], "position_changed");
        assert_eq!(json["participant"], 1);
        assert_eq!(json["position"]["x"], 2);
    }

    #[test]
    fn test_game_over_draw_has_null_winner() {
        let json = serde_json::to_value(Notification::GameOver { winner: None }).unwrap();
        assert_eq!(json["event"], "game_over");
        assert!(json["winner"].is_null());
    }

    #[test]
    fn test_payload_event_is_adjacently_tagged() {
        let payload = Payload::Event(Notification::BlastCleared { bomb: BombId(3) });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Event");
        assert_eq!(json["data"]["event"], "blast_cleared");
        assert_eq!(json["data"]["bomb"], 3);
    }

    #[test]
    fn test_intent_payload_request_id_defaults_to_none() {
        let raw = r#"{"type":"Intent","data":{"intent":{"type":"ready"}}}"#;
        let payload: Payload = serde_json::from_str(raw).unwrap();
        assert_eq!(
            payload,
            Payload::Intent { request_id: None, intent: Intent::Ready }
        );
    }
}
