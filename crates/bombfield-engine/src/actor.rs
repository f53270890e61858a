//! Session actor: an isolated Tokio task that owns one [`SessionState`].
//!
//! All intents, joins, leaves, and timer expiries for a session pass
//! through this task's loop, so no two mutations of the same session ever
//! interleave. Different sessions run on different tasks and never share
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use bombfield_protocol::{
    BombId, Intent, Notification, Participant, ParticipantId, Phase, Position, SessionId, Snapshot,
};
use bombfield_timer::TimerRegistry;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{EngineConfig, EngineError, SessionState};

/// Channel on which a participant's connection receives notifications.
pub type NotificationSender = mpsc::UnboundedSender<Notification>;

/// Deferred work a session schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKey {
    Fuse(BombId),
    Clear(BombId),
}

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    Join {
        participant: ParticipantId,
        sender: NotificationSender,
        reply: oneshot::Sender<Result<(Participant, Snapshot), EngineError>>,
    },

    /// Replies with the number of participants left.
    Leave {
        participant: ParticipantId,
        reply: oneshot::Sender<Result<usize, EngineError>>,
    },

    Intent {
        participant: ParticipantId,
        intent: Intent,
    },

    GetInfo {
        reply: oneshot::Sender<SessionInfo>,
    },

    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },

    Shutdown,
}

/// Read-only view of a session for matchmaking and monitoring.
///
/// Never a source of truth: it is stale the moment it is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub phase: Phase,
    pub participants: usize,
    pub capacity: usize,
    /// Positions of bombs that have not detonated yet.
    pub bombs: Vec<Position>,
}

impl SessionInfo {
    /// Whether a join could succeed right now.
    pub fn has_open_slot(&self) -> bool {
        self.phase.is_joinable() && self.participants < self.capacity
    }
}

/// Handle to a running session actor.
///
/// Cheap to clone. The registry holds one per session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Seats a participant and registers the channel their notifications
    /// go to. Returns their record and a snapshot taken right after the
    /// join, before any later command can run.
    pub async fn join(
        &self,
        participant: ParticipantId,
        sender: NotificationSender,
    ) -> Result<(Participant, Snapshot), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Join {
            participant,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id))?
    }

    /// Removes a participant and returns how many remain.
    pub async fn leave(&self, participant: ParticipantId) -> Result<usize, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Leave {
            participant,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id))?
    }

    /// Queues an intent (fire-and-forget).
    pub async fn send_intent(
        &self,
        participant: ParticipantId,
        intent: Intent,
    ) -> Result<(), EngineError> {
        self.send(SessionCommand::Intent {
            participant,
            intent,
        })
        .await
    }

    pub async fn get_info(&self) -> Result<SessionInfo, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id))
    }

    pub async fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id))
    }

    /// Stops the actor. Pending timers are cancelled.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), EngineError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id))
    }
}

/// The actor itself. Runs inside a Tokio task.
struct SessionActor {
    state: SessionState,
    config: Arc<EngineConfig>,
    senders: HashMap<ParticipantId, NotificationSender>,
    timers: TimerRegistry<TimerKey, TimerKey>,
    receiver: mpsc::Receiver<SessionCommand>,
    timer_rx: mpsc::Receiver<TimerKey>,
    rng: StdRng,
}

impl SessionActor {
    async fn run(mut self) {
        let session_id = self.state.id();
        info!(%session_id, "session actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                Some(key) = self.timer_rx.recv() => self.handle_timer(key),
            }
        }

        self.timers.cancel_all();
        info!(%session_id, "session actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Join {
                participant,
                sender,
                reply,
            } => self.handle_join(participant, sender, reply),
            SessionCommand::Leave { participant, reply } => {
                let result = self.handle_leave(participant);
                let _ = reply.send(result);
            }
            SessionCommand::Intent {
                participant,
                intent,
            } => self.handle_intent(participant, intent),
            SessionCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            SessionCommand::Shutdown => {
                info!(session_id = %self.state.id(), "session shutting down");
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        participant: ParticipantId,
        sender: NotificationSender,
        reply: oneshot::Sender<Result<(Participant, Snapshot), EngineError>>,
    ) {
        match self.state.join(participant) {
            Ok((record, notes)) => {
                self.senders.insert(participant, sender);
                // Reply before broadcasting so the joiner sees its own
                // record ahead of the roster delta.
                let _ = reply.send(Ok((record, self.state.snapshot())));
                self.broadcast(notes);
            }
            Err(e) => {
                debug!(session_id = %self.state.id(), %participant, error = %e, "join rejected");
                let _ = reply.send(Err(e));
            }
        }
    }

    fn handle_leave(&mut self, participant: ParticipantId) -> Result<usize, EngineError> {
        let notes = self
            .state
            .leave(participant)
            .ok_or(EngineError::UnknownParticipant(participant))?;
        self.senders.remove(&participant);
        self.broadcast(notes);

        if self.state.is_empty() {
            let cancelled = self.timers.cancel_all();
            debug!(session_id = %self.state.id(), cancelled, "roster empty, timers cancelled");
        } else {
            self.settle();
        }
        Ok(self.state.len())
    }

    fn handle_intent(&mut self, participant: ParticipantId, intent: Intent) {
        if !self.state.contains(participant) {
            warn!(
                session_id = %self.state.id(),
                %participant,
                "intent from non-member, ignoring"
            );
            return;
        }

        let now = Instant::now();
        let notes = match intent {
            Intent::Join => {
                debug!(session_id = %self.state.id(), %participant, "join sent to session, ignoring");
                return;
            }
            Intent::Ready => self.state.ready(participant),
            Intent::Move { direction } => self.state.move_participant(participant, direction, now),
            Intent::PlaceBomb => match self.state.place_bomb(participant, now) {
                Some((bomb, notes)) => {
                    let key = TimerKey::Fuse(bomb);
                    self.timers.schedule(key, self.config.fuse, key);
                    notes
                }
                None => return,
            },
        };

        self.broadcast(notes);
        self.settle();
    }

    fn handle_timer(&mut self, key: TimerKey) {
        if !self.timers.complete(&key) {
            debug!(session_id = %self.state.id(), ?key, "stale timer ignored");
            return;
        }

        let notes = match key {
            TimerKey::Fuse(bomb) => {
                match self.state.detonate(bomb, Instant::now(), &mut self.rng) {
                    Some(notes) => {
                        let clear = TimerKey::Clear(bomb);
                        self.timers.schedule(clear, self.config.blast_display, clear);
                        notes
                    }
                    None => {
                        debug!(session_id = %self.state.id(), %bomb, "fuse fired for missing bomb");
                        return;
                    }
                }
            }
            TimerKey::Clear(bomb) => match self.state.clear_blast(bomb) {
                Some(notes) => notes,
                None => {
                    debug!(session_id = %self.state.id(), %bomb, "clear fired for missing blast");
                    return;
                }
            },
        };

        self.broadcast(notes);
        self.settle();
    }

    /// Once the game is over nothing scheduled can matter any more.
    fn settle(&mut self) {
        if self.state.phase().is_over() {
            let cancelled = self.timers.cancel_all();
            if cancelled > 0 {
                debug!(session_id = %self.state.id(), cancelled, "game over, timers cancelled");
            }
        }
    }

    /// Delivers notifications to every seated participant. Closed
    /// channels are skipped; the transport reports the disconnect.
    fn broadcast(&self, notes: Vec<Notification>) {
        for note in notes {
            for participant in self.state.roster() {
                if let Some(sender) = self.senders.get(&participant.id) {
                    let _ = sender.send(note.clone());
                }
            }
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.state.id(),
            phase: self.state.phase(),
            participants: self.state.len(),
            capacity: self.state.capacity(),
            bombs: self.state.bombs().iter().map(|b| b.position).collect(),
        }
    }
}

/// Spawns a session actor around `state` and returns its handle.
pub(crate) fn spawn_session(
    state: SessionState,
    config: Arc<EngineConfig>,
    rng: StdRng,
) -> SessionHandle {
    let session_id = state.id();
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let (timer_tx, timer_rx) = mpsc::channel(config.channel_size.max(1));

    let actor = SessionActor {
        state,
        config,
        senders: HashMap::new(),
        timers: TimerRegistry::new(timer_tx),
        receiver: rx,
        timer_rx,
        rng,
    };

    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
    }
}
