//! `BombfieldServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → gateway → engine.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bombfield_engine::{EngineConfig, SessionInfo, SessionRegistry};
use bombfield_protocol::JsonCodec;

use crate::BombfieldError;
use crate::gateway::Gateway;
use crate::handler::handle_connection;
use crate::transport::{WebSocketConnection, WebSocketListener};

/// Shared server state passed to each connection task.
pub(crate) struct ServerState {
    pub(crate) gateway: Gateway,
    pub(crate) codec: JsonCodec,
    /// `None` keeps silent connections open for as long as TCP does.
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a Bombfield server.
///
/// # Example
///
/// ```rust,no_run
/// use bombfield::prelude::*;
///
/// # async fn run() -> Result<(), BombfieldError> {
/// let server = BombfieldServer::builder()
///     .bind("0.0.0.0:3000")
///     .engine_config(EngineConfig {
///         matchmaking: MatchmakingMode::Single,
///         ..EngineConfig::default()
///     })
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BombfieldServerBuilder {
    bind_addr: String,
    engine_config: EngineConfig,
    idle_timeout: Option<Duration>,
    seed: Option<u64>,
}

impl BombfieldServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            engine_config: EngineConfig::default(),
            idle_timeout: None,
            seed: None,
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Connections that send no frame at all (data, ping, or pong) for
    /// longer than this are treated as disconnected. Off by default.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Makes board layouts and power-up drops reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Binds the listener. Nothing is accepted until
    /// [`run`](BombfieldServer::run).
    pub async fn build(self) -> Result<BombfieldServer, BombfieldError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;

        let registry = match self.seed {
            Some(seed) => SessionRegistry::with_seed(self.engine_config, seed),
            None => SessionRegistry::new(self.engine_config),
        };
        let state = Arc::new(ServerState {
            gateway: Gateway::new(registry),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(BombfieldServer { listener, state })
    }
}

impl Default for BombfieldServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Bombfield server. Call [`run`](Self::run) to start accepting.
pub struct BombfieldServer {
    listener: WebSocketListener,
    state: Arc<ServerState>,
}

impl BombfieldServer {
    pub fn builder() -> BombfieldServerBuilder {
        BombfieldServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Read-only view of every live session.
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.state.gateway.sessions().await
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), BombfieldError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Bombfield server running");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let conn = match WebSocketConnection::handshake(stream, addr).await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%addr, error = %e, "handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
