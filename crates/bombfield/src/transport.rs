//! WebSocket transport using `tokio-tungstenite`.
//!
//! The socket is split so a connection can wait for the next inbound frame
//! and write outbound frames from the same task without holding a lock
//! across the read.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Errors from the socket layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] tungstenite::Error),
}

/// One inbound WebSocket frame, as the handler sees it.
///
/// Pings and pongs carry no payload for the protocol layer, but they still
/// prove the peer is alive, so they are surfaced rather than swallowed.
/// Tungstenite answers pings on its own; the handler only needs to know
/// one arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text or binary frame to hand to the codec.
    Data(Vec<u8>),
    /// A ping or pong.
    Control,
}

/// Opaque identifier for a connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Listens for TCP connections. The WebSocket handshake happens later,
/// on the connection's own task, so one slow client cannot stall accepts.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::Accept)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        self.listener.accept().await.map_err(TransportError::Accept)
    }
}

/// A single upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WebSocketConnection {
    /// Performs the WebSocket upgrade on an accepted TCP stream.
    pub async fn handshake(stream: TcpStream, addr: SocketAddr) -> Result<Self, TransportError> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(TransportError::Handshake)?;
        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        debug!(%id, %addr, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(Self { id, sink, stream })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one frame. Valid UTF-8 goes out as a text frame, which is
    /// what browser clients expect for JSON.
    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        let msg = match String::from_utf8(data) {
            Ok(text) => Message::text(text),
            Err(e) => Message::binary(e.into_bytes()),
        };
        self.sink.send(msg).await.map_err(TransportError::Send)
    }

    /// Next inbound frame. `Ok(None)` when the peer closed the connection.
    pub async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Data(text.as_bytes().to_vec())));
                }
                Some(Ok(Message::Binary(data))) => return Ok(Some(Frame::Data(data.to_vec()))),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => return Ok(Some(Frame::Control)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Raw frames never surface when reading.
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => return Err(TransportError::Receive(e)),
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(TransportError::Send)
    }
}
