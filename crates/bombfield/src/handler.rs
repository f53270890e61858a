//! Per-connection handler: frame decoding, intent routing, and
//! notification delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Assign an ephemeral [`ParticipantId`]
//!   2. Loop over three event sources: inbound frames, notifications from
//!      the participant's session, and (if configured) the idle deadline
//!   3. On exit (close, error, timeout) leave the session
//!
//! ## One writer per socket
//!
//! The session actor never writes to a socket. It pushes notifications into
//! an unbounded channel owned by this task, and this task is the only one
//! that writes frames. That is what makes the join reply ordering hold: the
//! reply is written inside the same loop iteration that sent the join, and
//! the notification channel is only polled again afterwards.
//!
//! ## Liveness
//!
//! There is no heartbeat intent. Any inbound frame counts as a sign of
//! life, including WebSocket pings and pongs, which browsers and most
//! client libraries send on their own. The idle timeout is off unless the
//! server was built with one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bombfield_protocol::{
    Codec, Envelope, Intent, JoinReply, Notification, ParticipantId, Payload, ProtocolError,
};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::BombfieldError;
use crate::server::ServerState;
use crate::transport::{Frame, WebSocketConnection};

static NEXT_PARTICIPANT_ID: AtomicU64 = AtomicU64::new(1);

/// Drop guard that removes the participant from its session when the
/// handler exits, including on early returns.
///
/// `Drop` is synchronous, so the async cleanup runs on a spawned task.
struct DisconnectGuard {
    participant: ParticipantId,
    state: Arc<ServerState>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let participant = self.participant;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.gateway.disconnect(participant).await;
        });
    }
}

/// Writes envelopes with a per-connection sequence number.
///
/// `seq` starts at 1 and increases by one per frame written, whatever the
/// payload. `timestamp` is milliseconds since the connection was accepted.
struct Outbox {
    seq: u64,
    start: Instant,
}

impl Outbox {
    async fn send(
        &mut self,
        conn: &mut WebSocketConnection,
        codec: &impl Codec,
        payload: Payload,
    ) -> Result<(), BombfieldError> {
        let envelope = Envelope {
            seq: self.seq,
            timestamp: millis_since(self.start),
            payload,
        };
        self.seq += 1;
        let bytes = codec.encode(&envelope)?;
        conn.send(bytes).await?;
        Ok(())
    }
}

/// Whole milliseconds since `start`, saturating at `u64::MAX`.
fn millis_since(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection(
    mut conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), BombfieldError> {
    let conn_id = conn.id();
    let participant = ParticipantId(NEXT_PARTICIPANT_ID.fetch_add(1, Ordering::Relaxed));
    info!(%conn_id, %participant, "participant connected");

    let _guard = DisconnectGuard {
        participant,
        state: Arc::clone(&state),
    };
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Notification>();
    let mut outbox = Outbox {
        seq: 1,
        start: Instant::now(),
    };
    let mut idle_deadline = state.idle_timeout.map(|t| Instant::now() + t);

    loop {
        tokio::select! {
            frame = conn.recv() => {
                let frame = match frame {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        info!(%participant, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        debug!(%participant, error = %e, "recv error");
                        break;
                    }
                };
                idle_deadline = state.idle_timeout.map(|t| Instant::now() + t);
                if let Frame::Data(data) = frame {
                    handle_frame(&mut conn, &state, participant, &notify_tx, &mut outbox, &data).await?;
                }
            }
            Some(note) = notify_rx.recv() => {
                outbox.send(&mut conn, &state.codec, Payload::Event(note)).await?;
            }
            _ = time::sleep_until(idle_deadline.unwrap_or_else(Instant::now)), if idle_deadline.is_some() => {
                info!(%participant, "connection idle, closing");
                let _ = conn.close().await;
                break;
            }
        }
    }

    // _guard drops here → leave fires.
    Ok(())
}

async fn handle_frame(
    conn: &mut WebSocketConnection,
    state: &ServerState,
    participant: ParticipantId,
    notify_tx: &mpsc::UnboundedSender<Notification>,
    outbox: &mut Outbox,
    data: &[u8],
) -> Result<(), BombfieldError> {
    let envelope: Envelope = match state.codec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            debug!(%participant, error = %e, "failed to decode envelope");
            let error = Payload::Error {
                code: 400,
                message: format!("invalid frame: {e}"),
            };
            return outbox.send(conn, &state.codec, error).await;
        }
    };

    match envelope.payload {
        Payload::Intent {
            request_id,
            intent: Intent::Join,
        } => {
            // The reply is written before this loop polls for
            // notifications again, so it always precedes the roster delta.
            let reply = match state.gateway.join(participant, notify_tx.clone()).await {
                Ok(joined) => JoinReply::joined(joined.session_id, joined.participant, joined.snapshot),
                Err(e) => JoinReply::rejected(e.reason()),
            };
            outbox
                .send(conn, &state.codec, Payload::Reply { request_id, reply })
                .await
        }
        Payload::Intent { intent, .. } => {
            state.gateway.intent(participant, intent).await;
            Ok(())
        }
        _ => {
            let e = ProtocolError::InvalidMessage("clients may only send Intent".into());
            debug!(%participant, error = %e, "rejecting server-side payload from client");
            let error = Payload::Error {
                code: 400,
                message: e.to_string(),
            };
            outbox.send(conn, &state.codec, error).await
        }
    }
}
