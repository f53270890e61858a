//! End-to-end tests: real WebSocket clients against a server on a random port.

use std::time::Duration;

use bombfield::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

async fn start_with(builder: BombfieldServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .seed(7)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_with(BombfieldServer::builder()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_intent(ws: &mut ClientWs, request_id: Option<u64>, intent: Intent) {
    let env = Envelope {
        seq: 0,
        timestamp: 0,
        payload: Payload::Intent { request_id, intent },
    };
    let text = serde_json::to_string(&env).expect("encode");
    ws.send(Message::text(text)).await.expect("send intent");
}

/// Next envelope from the server, or `None` once the socket closes.
async fn recv(ws: &mut ClientWs) -> Option<Envelope> {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("server should answer in time");
        match msg {
            Some(Ok(Message::Text(text))) => {
                return Some(serde_json::from_str(text.as_str()).expect("decode"));
            }
            Some(Ok(Message::Binary(data))) => {
                return Some(serde_json::from_slice(&data).expect("decode"));
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

/// Skips frames until a notification matching `pred` arrives.
async fn wait_for(ws: &mut ClientWs, pred: impl Fn(&Notification) -> bool) -> Notification {
    loop {
        let env = recv(ws).await.expect("socket closed while waiting");
        if let Payload::Event(note) = env.payload {
            if pred(&note) {
                return note;
            }
        }
    }
}

async fn join(ws: &mut ClientWs) -> JoinReply {
    send_intent(ws, Some(1), Intent::Join).await;
    loop {
        let env = recv(ws).await.expect("socket closed before reply");
        if let Payload::Reply { reply, .. } = env.payload {
            return reply;
        }
    }
}

/// Joins three clients and readies them all. Returns once every client
/// has seen the game start.
async fn start_game(addr: &str) -> Vec<(ClientWs, ParticipantId)> {
    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut ws = connect(addr).await;
        let reply = join(&mut ws).await;
        assert!(reply.success);
        let id = reply.participant.expect("participant").id;
        clients.push((ws, id));
    }
    for (ws, _) in clients.iter_mut() {
        send_intent(ws, None, Intent::Ready).await;
    }
    for (ws, _) in clients.iter_mut() {
        wait_for(ws, |n| matches!(n, Notification::GameStarted { .. })).await;
    }
    clients
}

// =========================================================================
// Join
// =========================================================================

#[tokio::test]
async fn test_join_reply_carries_snapshot() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_intent(&mut ws, Some(7), Intent::Join).await;
    let env = recv(&mut ws).await.expect("reply");
    assert_eq!(env.seq, 1);
    match env.payload {
        Payload::Reply { request_id, reply } => {
            assert_eq!(request_id, Some(7));
            assert!(reply.success);
            assert_eq!(reply.session_id, Some(SessionId(1)));
            let participant = reply.participant.expect("participant");
            assert_eq!(participant.slot, 1);
            assert_eq!(participant.position, Position::new(1, 1));
            let snapshot = reply.snapshot.expect("snapshot");
            assert_eq!(snapshot.phase, Phase::Waiting);
            assert_eq!(snapshot.roster.len(), 1);
            assert_eq!(snapshot.grid.width(), 13);
            assert_eq!(snapshot.grid.height(), 11);
        }
        other => panic!("expected Reply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_reply_precedes_own_joined_event() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_intent(&mut ws, None, Intent::Join).await;
    let first = recv(&mut ws).await.expect("first frame");
    assert!(matches!(first.payload, Payload::Reply { .. }));

    let second = recv(&mut ws).await.expect("second frame");
    assert_eq!(second.seq, 2);
    match second.payload {
        Payload::Event(Notification::ParticipantJoined { total, .. }) => assert_eq!(total, 1),
        other => panic!("expected ParticipantJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_single_room_rejects_fourth() {
    let addr = start_with(BombfieldServer::builder().engine_config(EngineConfig {
        matchmaking: MatchmakingMode::Single,
        ..EngineConfig::default()
    }))
    .await;

    let mut seated = Vec::new();
    for _ in 0..3 {
        let mut ws = connect(&addr).await;
        assert!(join(&mut ws).await.success);
        seated.push(ws);
    }

    let mut late = connect(&addr).await;
    let reply = join(&mut late).await;
    assert!(!reply.success);
    assert_eq!(reply.reason.as_deref(), Some("RoomFull"));
    assert!(reply.snapshot.is_none());
}

#[tokio::test]
async fn test_fourth_join_opens_new_session() {
    let addr = start_server().await;

    let mut seated = Vec::new();
    for _ in 0..3 {
        let mut ws = connect(&addr).await;
        let reply = join(&mut ws).await;
        assert_eq!(reply.session_id, Some(SessionId(1)));
        seated.push(ws);
    }

    let mut late = connect(&addr).await;
    let reply = join(&mut late).await;
    assert!(reply.success);
    assert_eq!(reply.session_id, Some(SessionId(2)));
    assert_eq!(reply.participant.expect("participant").slot, 1);
}

#[tokio::test]
async fn test_second_join_on_same_connection_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    assert!(join(&mut ws).await.success);
    let reply = join(&mut ws).await;
    assert!(!reply.success);
    assert_eq!(reply.reason.as_deref(), Some("AlreadyJoined"));
}

// =========================================================================
// Malformed input
// =========================================================================

#[tokio::test]
async fn test_bad_frame_gets_error_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::text("not json")).await.expect("send");
    let env = recv(&mut ws).await.expect("error frame");
    match env.payload {
        Payload::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }

    // The connection survives and still accepts a join.
    assert!(join(&mut ws).await.success);
}

#[tokio::test]
async fn test_unknown_intent_type_gets_error_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let raw = r#"{"seq":0,"timestamp":0,"payload":{"type":"Intent","data":{"intent":{"type":"fly"}}}}"#;
    ws.send(Message::text(raw)).await.expect("send");
    let env = recv(&mut ws).await.expect("error frame");
    assert!(matches!(env.payload, Payload::Error { code: 400, .. }));
}

#[tokio::test]
async fn test_server_payload_from_client_gets_error_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let env = Envelope {
        seq: 0,
        timestamp: 0,
        payload: Payload::Event(Notification::BlastCleared {
            bomb: bombfield_protocol::BombId(1),
        }),
    };
    ws.send(Message::text(serde_json::to_string(&env).expect("encode")))
        .await
        .expect("send");

    let env = recv(&mut ws).await.expect("error frame");
    match env.payload {
        Payload::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.starts_with("invalid message"));
            assert!(message.contains("Intent"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_intent_before_join_is_dropped() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_intent(&mut ws, None, Intent::PlaceBomb).await;
    send_intent(&mut ws, Some(2), Intent::Join).await;

    // Nothing is sent for the dropped intent; the first frame is the reply.
    let env = recv(&mut ws).await.expect("reply");
    assert_eq!(env.seq, 1);
    assert!(matches!(env.payload, Payload::Reply { request_id: Some(2), .. }));
}

// =========================================================================
// Gameplay
// =========================================================================

#[tokio::test]
async fn test_three_ready_clients_start_game() {
    let addr = start_server().await;
    let clients = start_game(&addr).await;
    assert_eq!(clients.len(), 3);
}

#[tokio::test]
async fn test_ready_status_broadcast_to_all() {
    let addr = start_server().await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut ws = connect(&addr).await;
        let id = join(&mut ws).await.participant.expect("participant").id;
        clients.push((ws, id));
    }
    let first_id = clients[0].1;
    send_intent(&mut clients[0].0, None, Intent::Ready).await;

    for (ws, _) in clients.iter_mut() {
        let note = wait_for(ws, |n| matches!(n, Notification::ReadyStatus { .. })).await;
        let Notification::ReadyStatus { ready } = note else {
            unreachable!()
        };
        assert_eq!(ready.len(), 3);
        for entry in ready {
            assert_eq!(entry.ready, entry.participant == first_id);
        }
    }
}

#[tokio::test]
async fn test_move_broadcasts_position() {
    let addr = start_server().await;
    let mut clients = start_game(&addr).await;
    let mover = clients[0].1;

    send_intent(
        &mut clients[0].0,
        None,
        Intent::Move {
            direction: Direction::Right,
        },
    )
    .await;

    for (ws, _) in clients.iter_mut() {
        let note = wait_for(ws, |n| matches!(n, Notification::PositionChanged { .. })).await;
        assert_eq!(
            note,
            Notification::PositionChanged {
                participant: mover,
                position: Position::new(2, 1),
            }
        );
    }
}

#[tokio::test]
async fn test_bomb_detonates_after_fuse() {
    let addr = start_server().await;
    let mut clients = start_game(&addr).await;
    let bomber = clients[1].1;

    send_intent(&mut clients[1].0, None, Intent::PlaceBomb).await;

    let (ws, _) = &mut clients[2];
    let placed = wait_for(ws, |n| matches!(n, Notification::BombPlaced { .. })).await;
    let Notification::BombPlaced { bomb } = placed else {
        unreachable!()
    };
    assert_eq!(bomb.owner, bomber);
    assert_eq!(bomb.position, Position::new(11, 1));

    let detonated = wait_for(ws, |n| matches!(n, Notification::BombDetonated { .. })).await;
    let Notification::BombDetonated {
        bomb: id,
        casualties,
        blast,
        ..
    } = detonated
    else {
        unreachable!()
    };
    assert_eq!(id, bomb.id);
    assert_eq!(blast[0], Position::new(11, 1));
    assert_eq!(casualties, vec![bomber]);

    // The bomber stood still, so the blast ends the game for them. Two
    // participants remain, so the session is still running.
    wait_for(ws, |n| matches!(n, Notification::BlastCleared { .. })).await;
}

// =========================================================================
// Disconnect and idle
// =========================================================================

#[tokio::test]
async fn test_disconnect_broadcasts_participant_left() {
    let addr = start_server().await;

    let mut stay = connect(&addr).await;
    assert!(join(&mut stay).await.success);

    let mut leave = connect(&addr).await;
    let leaver = join(&mut leave).await.participant.expect("participant").id;
    leave.close(None).await.expect("close");

    let note = wait_for(&mut stay, |n| matches!(n, Notification::ParticipantLeft { .. })).await;
    assert_eq!(
        note,
        Notification::ParticipantLeft {
            participant: leaver,
            total: 1,
        }
    );
}

#[tokio::test]
async fn test_disconnect_frees_slot() {
    let addr = start_server().await;

    let mut first = connect(&addr).await;
    assert!(join(&mut first).await.success);
    let mut second = connect(&addr).await;
    assert_eq!(join(&mut second).await.participant.expect("p").slot, 2);

    first.close(None).await.expect("close");
    wait_for(&mut second, |n| matches!(n, Notification::ParticipantLeft { .. })).await;

    let mut third = connect(&addr).await;
    let reply = join(&mut third).await;
    assert_eq!(reply.session_id, Some(SessionId(1)));
    assert_eq!(reply.participant.expect("p").slot, 1);
}

#[tokio::test]
async fn test_idle_connection_closed() {
    let addr = start_with(BombfieldServer::builder().idle_timeout(Duration::from_millis(200))).await;
    let mut ws = connect(&addr).await;

    assert!(join(&mut ws).await.success);

    // Stay silent. `recv` panics if the server has not closed within its
    // timeout.
    let mut frames = 0;
    while recv(&mut ws).await.is_some() {
        frames += 1;
    }
    assert!(frames <= 1, "only the joined event may follow the reply");
}

#[tokio::test]
async fn test_pinging_client_outlives_idle_timeout() {
    let addr = start_with(BombfieldServer::builder().idle_timeout(Duration::from_millis(200))).await;
    let mut ws = connect(&addr).await;
    assert!(join(&mut ws).await.success);

    // Two and a half idle windows of pings and nothing else.
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ws.send(Message::Ping(Vec::<u8>::new().into()))
            .await
            .expect("ping should reach a live connection");
    }

    // Still seated in the same session.
    let reply = join(&mut ws).await;
    assert!(!reply.success);
    assert_eq!(reply.reason.as_deref(), Some("AlreadyJoined"));
}

#[tokio::test]
async fn test_sessions_empty_before_any_join() {
    let server = BombfieldServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    assert!(server.sessions().await.is_empty());
}
