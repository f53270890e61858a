//! Gateway between connections and the session registry.
//!
//! Connection handlers never touch the registry directly. The registry
//! sits behind one async mutex, so matchmaking decisions (scan, join,
//! create) are atomic with respect to each other.

use bombfield_engine::{
    EngineError, Joined, NotificationSender, SessionInfo, SessionRegistry,
};
use bombfield_protocol::{Intent, ParticipantId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct Gateway {
    registry: Mutex<SessionRegistry>,
}

impl Gateway {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            registry: Mutex::new(registry),
        }
    }

    /// Matches a participant into a session. Notifications for that
    /// session are delivered on `sender` from now on.
    pub async fn join(
        &self,
        participant: ParticipantId,
        sender: NotificationSender,
    ) -> Result<Joined, EngineError> {
        let result = self
            .registry
            .lock()
            .await
            .join_or_create(participant, sender)
            .await;
        match &result {
            Ok(joined) => debug!(%participant, session_id = %joined.session_id, "join accepted"),
            Err(e) => info!(%participant, error = %e, "join rejected"),
        }
        result
    }

    /// Forwards an intent. Intents from participants without a session
    /// are dropped.
    pub async fn intent(&self, participant: ParticipantId, intent: Intent) {
        // PERF: every intent takes the registry lock just to look up a
        // handle; cache it per connection if this shows up in profiles.
        let result = self
            .registry
            .lock()
            .await
            .route_intent(participant, intent)
            .await;
        if let Err(e) = result {
            debug!(%participant, ?intent, error = %e, "intent dropped");
        }
    }

    /// Removes a disconnected participant from whatever session they
    /// were in.
    pub async fn disconnect(&self, participant: ParticipantId) {
        match self.registry.lock().await.leave(participant).await {
            Ok(()) => info!(%participant, "participant disconnected"),
            Err(EngineError::UnknownParticipant(_)) => {
                debug!(%participant, "disconnected before joining");
            }
            Err(e) => warn!(%participant, error = %e, "disconnect cleanup failed"),
        }
    }

    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.lock().await.list_sessions().await
    }
}
