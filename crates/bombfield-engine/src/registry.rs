//! Session registry: creates, tracks, and routes participants to sessions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bombfield_protocol::{Intent, Participant, ParticipantId, SessionId, Snapshot};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::actor::spawn_session;
use crate::{
    EngineConfig, EngineError, MatchmakingMode, NotificationSender, SessionHandle, SessionInfo,
    SessionState,
};

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub session_id: SessionId,
    pub participant: Participant,
    pub snapshot: Snapshot,
}

/// Owns every live session and the participant → session index.
///
/// A participant is in at most one session at a time. Sessions are removed
/// as soon as their roster empties; their actor shuts down and cancels any
/// pending timers.
pub struct SessionRegistry {
    config: Arc<EngineConfig>,
    /// Ordered by id so matchmaking always prefers the oldest session.
    sessions: BTreeMap<SessionId, SessionHandle>,
    participants: HashMap<ParticipantId, SessionId>,
    next_session_id: u64,
    seed: Option<u64>,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            sessions: BTreeMap::new(),
            participants: HashMap::new(),
            next_session_id: 1,
            seed: None,
        }
    }

    /// Like [`new`](Self::new), but every session's board and power-up
    /// drops derive from `seed`, so runs are reproducible.
    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::new(config)
        }
    }

    /// Creates an empty session and returns its id.
    pub fn create_session(&mut self) -> SessionId {
        let session_id = SessionId(self.next_session_id);
        self.next_session_id += 1;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(session_id.0)),
            None => StdRng::from_os_rng(),
        };
        let state = SessionState::new(session_id, Arc::clone(&self.config), &mut rng);
        let handle = spawn_session(state, Arc::clone(&self.config), rng);
        self.sessions.insert(session_id, handle);

        info!(%session_id, "session created");
        session_id
    }

    /// Places a participant in a session according to the matchmaking mode.
    ///
    /// A participant whose current session has ended leaves it first and
    /// is matched afresh.
    pub async fn join_or_create(
        &mut self,
        participant: ParticipantId,
        sender: NotificationSender,
    ) -> Result<Joined, EngineError> {
        self.release_finished(participant).await?;

        match self.config.matchmaking {
            MatchmakingMode::Single => {
                let session_id = match self.sessions.keys().next() {
                    Some(id) => *id,
                    None => self.create_session(),
                };
                self.join_session(participant, session_id, sender).await
            }
            MatchmakingMode::Multi => {
                // A session can fill between get_info and join; keep
                // scanning if that happens.
                let handles: Vec<SessionHandle> = self.sessions.values().cloned().collect();
                for handle in handles {
                    let Ok(info) = handle.get_info().await else {
                        continue;
                    };
                    if !info.has_open_slot() {
                        continue;
                    }
                    if let Ok((record, snapshot)) = handle.join(participant, sender.clone()).await {
                        self.participants.insert(participant, info.session_id);
                        return Ok(Joined {
                            session_id: info.session_id,
                            participant: record,
                            snapshot,
                        });
                    }
                }

                let session_id = self.create_session();
                self.join_session(participant, session_id, sender).await
            }
        }
    }

    /// Seats a participant in a specific session.
    pub async fn join_session(
        &mut self,
        participant: ParticipantId,
        session_id: SessionId,
        sender: NotificationSender,
    ) -> Result<Joined, EngineError> {
        if let Some(current) = self.participants.get(&participant) {
            return Err(EngineError::AlreadyJoined(participant, *current));
        }
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(EngineError::NotFound(session_id))?;

        let (record, snapshot) = handle.join(participant, sender).await?;
        self.participants.insert(participant, session_id);
        Ok(Joined {
            session_id,
            participant: record,
            snapshot,
        })
    }

    /// Removes a participant from their session, tearing the session down
    /// if they were the last one in it.
    pub async fn leave(&mut self, participant: ParticipantId) -> Result<(), EngineError> {
        let session_id = self
            .participants
            .remove(&participant)
            .ok_or(EngineError::UnknownParticipant(participant))?;
        let Some(handle) = self.sessions.get(&session_id) else {
            return Ok(());
        };

        match handle.leave(participant).await {
            Ok(0) | Err(EngineError::Unavailable(_)) => self.remove(session_id).await,
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Routes an intent to the participant's session.
    pub async fn route_intent(
        &self,
        participant: ParticipantId,
        intent: Intent,
    ) -> Result<(), EngineError> {
        let session_id = self
            .participants
            .get(&participant)
            .ok_or(EngineError::UnknownParticipant(participant))?;
        let handle = self
            .sessions
            .get(session_id)
            .ok_or(EngineError::NotFound(*session_id))?;
        handle.send_intent(participant, intent).await
    }

    /// Shuts a session down and forgets everyone in it.
    pub async fn remove(&mut self, session_id: SessionId) -> Result<(), EngineError> {
        let handle = self
            .sessions
            .remove(&session_id)
            .ok_or(EngineError::NotFound(session_id))?;
        let _ = handle.shutdown().await;
        self.participants.retain(|_, sid| *sid != session_id);

        info!(%session_id, "session removed");
        Ok(())
    }

    pub fn session_of(&self, participant: ParticipantId) -> Option<SessionId> {
        self.participants.get(&participant).copied()
    }

    /// Fresh snapshot of a session, taken inside its actor.
    pub async fn snapshot(&self, session_id: SessionId) -> Result<Snapshot, EngineError> {
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(EngineError::NotFound(session_id))?;
        handle.snapshot().await
    }

    /// Current info for every session, oldest first. Sessions that fail to
    /// answer are skipped.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut infos = Vec::with_capacity(self.sessions.len());
        for handle in self.sessions.values() {
            if let Ok(info) = handle.get_info().await {
                infos.push(info);
            }
        }
        infos
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// If the participant sits in a finished session, takes them out of it.
    async fn release_finished(&mut self, participant: ParticipantId) -> Result<(), EngineError> {
        let Some(current) = self.participants.get(&participant).copied() else {
            return Ok(());
        };
        let finished = match self.sessions.get(&current) {
            Some(handle) => match handle.get_info().await {
                Ok(info) => info.phase.is_over(),
                Err(_) => true,
            },
            None => true,
        };
        if !finished {
            return Err(EngineError::AlreadyJoined(participant, current));
        }

        debug!(%participant, session_id = %current, "leaving finished session to rejoin");
        self.leave(participant).await
    }
}
