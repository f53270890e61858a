//! Authoritative per-session game state.
//!
//! [`SessionState`] is plain data plus the rules that mutate it. It does
//! no I/O and never sleeps: the session actor owns one, feeds it intents
//! and timer expiries one at a time, and broadcasts whatever notifications
//! come back. Keeping it synchronous is what lets the tests drive a whole
//! game without a runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bombfield_protocol::{
    BombId, BombInfo, Cell, Direction, Grid, Notification, Participant, ParticipantId, Phase,
    Position, PowerUp, PowerUpKind, ReadyEntry, SessionId, Snapshot,
};
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::blast::blast_cells;
use crate::{EngineConfig, EngineError, Rejection, grid};

/// A placed bomb waiting for its fuse.
#[derive(Debug, Clone)]
struct LiveBomb {
    info: BombInfo,
    armed_at: Instant,
}

/// One session's board, roster, bombs, and lifecycle.
pub struct SessionState {
    id: SessionId,
    config: Arc<EngineConfig>,
    grid: Grid,
    /// Ordered by slot.
    roster: Vec<Participant>,
    bombs: Vec<LiveBomb>,
    /// Detonated bombs whose blast has not been cleared yet.
    blasts: Vec<BombId>,
    power_ups: Vec<PowerUp>,
    phase: Phase,
    winner: Option<ParticipantId>,
    next_bomb_id: u64,
    last_move: HashMap<ParticipantId, Instant>,
}

impl SessionState {
    /// Creates a session with a freshly generated board.
    pub fn new<R: Rng + ?Sized>(id: SessionId, config: Arc<EngineConfig>, rng: &mut R) -> Self {
        let grid = grid::generate(
            config.width,
            config.height,
            &config.spawn_points,
            config.block_density,
            rng,
        );
        Self::with_grid(id, config, grid)
    }

    /// Creates a session on a prepared board.
    pub fn with_grid(id: SessionId, config: Arc<EngineConfig>, grid: Grid) -> Self {
        Self {
            id,
            config,
            grid,
            roster: Vec::new(),
            bombs: Vec::new(),
            blasts: Vec::new(),
            power_ups: Vec::new(),
            phase: Phase::Waiting,
            winner: None,
            next_bomb_id: 1,
            last_move: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.roster.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participant(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// The sole survivor once the session is Over. `None` on a draw or
    /// while the game is still running.
    pub fn winner(&self) -> Option<&Participant> {
        self.winner.and_then(|id| self.participant(id))
    }

    pub fn bombs(&self) -> Vec<BombInfo> {
        self.bombs.iter().map(|b| b.info).collect()
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn bomb_at(&self, pos: Position) -> bool {
        self.bombs.iter().any(|b| b.info.position == pos)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: self.grid.clone(),
            roster: self.roster.clone(),
            phase: self.phase,
            bombs: self.bombs(),
            power_ups: self.power_ups.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    /// Seats a participant in the lowest free slot.
    ///
    /// When the roster fills the session enters ReadyCheck, and starts at
    /// once if everyone had already pressed ready.
    pub fn join(
        &mut self,
        id: ParticipantId,
    ) -> Result<(Participant, Vec<Notification>), EngineError> {
        if self.contains(id) {
            return Err(EngineError::AlreadyJoined(id, self.id));
        }
        if self.roster.len() >= self.capacity() {
            return Err(EngineError::RoomFull(self.id));
        }
        if !self.phase.is_joinable() {
            return Err(EngineError::InvalidPhase(self.phase));
        }

        let (slot, position) = self
            .free_slot()
            .and_then(|slot| Some((slot, self.config.spawn_for(slot)?)))
            .ok_or(EngineError::RoomFull(self.id))?;

        let participant = Participant {
            id,
            slot,
            position,
            bombs: self.config.starting_bombs,
            blast_radius: self.config.starting_radius,
            move_interval_ms: millis(self.config.base_move_interval),
            alive: true,
            ready: false,
        };
        let at = self.roster.partition_point(|p| p.slot < slot);
        self.roster.insert(at, participant.clone());

        info!(
            session_id = %self.id,
            participant = %id,
            slot,
            total = self.roster.len(),
            "participant joined"
        );

        let mut notes = vec![Notification::ParticipantJoined {
            participant: participant.clone(),
            total: self.roster.len(),
        }];
        if self.roster.len() == self.capacity() {
            self.transition(Phase::ReadyCheck);
            notes.extend(self.try_start());
        }

        Ok((participant, notes))
    }

    /// Removes a participant. Returns `None` if they were not seated here.
    ///
    /// Their live bombs still detonate on schedule.
    pub fn leave(&mut self, id: ParticipantId) -> Option<Vec<Notification>> {
        let idx = self.index_of(id)?;
        self.roster.remove(idx);
        self.last_move.remove(&id);

        info!(
            session_id = %self.id,
            participant = %id,
            total = self.roster.len(),
            "participant left"
        );

        let mut notes = vec![Notification::ParticipantLeft {
            participant: id,
            total: self.roster.len(),
        }];
        match self.phase {
            Phase::ReadyCheck => self.transition(Phase::Waiting),
            Phase::Active => notes.extend(self.check_over()),
            Phase::Waiting | Phase::Over => {}
        }

        Some(notes)
    }

    /// Marks a participant ready and broadcasts the full ready map.
    ///
    /// Pressing ready twice, or after the game started, changes nothing.
    pub fn try_ready(&mut self, id: ParticipantId) -> Result<Vec<Notification>, Rejection> {
        let participant = self
            .roster
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(Rejection::UnknownParticipant)?;
        if participant.ready || !self.phase.accepts_ready() {
            return Ok(Vec::new());
        }
        participant.ready = true;

        let mut notes = vec![Notification::ReadyStatus {
            ready: self.ready_map(),
        }];
        notes.extend(self.try_start());
        Ok(notes)
    }

    pub fn ready(&mut self, id: ParticipantId) -> Vec<Notification> {
        self.try_ready(id).unwrap_or_else(|reason| {
            debug!(session_id = %self.id, participant = %id, %reason, "ready rejected");
            Vec::new()
        })
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Moves a participant one cell, picking up any power-up on the way.
    pub fn try_move(
        &mut self,
        id: ParticipantId,
        direction: Direction,
        now: Instant,
    ) -> Result<Vec<Notification>, Rejection> {
        if !self.phase.accepts_actions() {
            return Err(Rejection::NotActive);
        }
        let idx = self.index_of(id).ok_or(Rejection::UnknownParticipant)?;
        let current = &self.roster[idx];
        if !current.alive {
            return Err(Rejection::NotAlive);
        }
        if self.config.throttle_moves {
            if let Some(last) = self.last_move.get(&id) {
                let interval = Duration::from_millis(current.move_interval_ms);
                if now.saturating_duration_since(*last) < interval {
                    return Err(Rejection::TooSoon);
                }
            }
        }

        let target = self.grid.step(current.position, direction);
        if !self.grid.get(target).is_some_and(Cell::is_open) || self.bomb_at(target) {
            return Err(Rejection::Blocked);
        }

        let consumed = self.take_power_up(target);
        let participant = &mut self.roster[idx];
        participant.position = target;
        if let Some(kind) = consumed {
            apply_power_up(participant, kind, &self.config);
        }
        self.last_move.insert(id, now);

        let mut notes = vec![Notification::PositionChanged {
            participant: id,
            position: target,
        }];
        if let Some(kind) = consumed {
            debug!(session_id = %self.id, participant = %id, ?kind, "power-up consumed");
            notes.push(Notification::PowerUpConsumed {
                participant: self.roster[idx].clone(),
                kind,
                power_ups: self.power_ups.clone(),
            });
        }
        Ok(notes)
    }

    pub fn move_participant(
        &mut self,
        id: ParticipantId,
        direction: Direction,
        now: Instant,
    ) -> Vec<Notification> {
        self.try_move(id, direction, now).unwrap_or_else(|reason| {
            debug!(
                session_id = %self.id,
                participant = %id,
                ?direction,
                %reason,
                "move rejected"
            );
            Vec::new()
        })
    }

    /// Places a bomb under the participant. The caller is responsible for
    /// scheduling its detonation.
    pub fn try_place_bomb(
        &mut self,
        id: ParticipantId,
        now: Instant,
    ) -> Result<(BombId, Vec<Notification>), Rejection> {
        if !self.phase.accepts_actions() {
            return Err(Rejection::NotActive);
        }
        let idx = self.index_of(id).ok_or(Rejection::UnknownParticipant)?;
        let owner = &self.roster[idx];
        if !owner.alive {
            return Err(Rejection::NotAlive);
        }
        if owner.bombs == 0 {
            return Err(Rejection::NoBombsLeft);
        }
        if self.bomb_at(owner.position) {
            return Err(Rejection::CellOccupied);
        }

        let bomb = BombInfo {
            id: BombId(self.next_bomb_id),
            owner: id,
            position: owner.position,
            radius: owner.blast_radius,
        };
        self.next_bomb_id += 1;
        self.roster[idx].bombs -= 1;
        self.bombs.push(LiveBomb {
            info: bomb,
            armed_at: now,
        });

        debug!(
            session_id = %self.id,
            participant = %id,
            bomb = %bomb.id,
            position = %bomb.position,
            radius = bomb.radius,
            "bomb placed"
        );
        Ok((bomb.id, vec![Notification::BombPlaced { bomb }]))
    }

    pub fn place_bomb(
        &mut self,
        id: ParticipantId,
        now: Instant,
    ) -> Option<(BombId, Vec<Notification>)> {
        match self.try_place_bomb(id, now) {
            Ok(placed) => Some(placed),
            Err(reason) => {
                debug!(session_id = %self.id, participant = %id, %reason, "bomb rejected");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// Detonates a live bomb against the current board.
    ///
    /// Returns `None` when the bomb is gone or the game has ended; both are
    /// normal races with teardown.
    pub fn detonate<R: Rng + ?Sized>(
        &mut self,
        bomb_id: BombId,
        now: Instant,
        rng: &mut R,
    ) -> Option<Vec<Notification>> {
        if !self.phase.accepts_actions() {
            return None;
        }
        let idx = self.bombs.iter().position(|b| b.info.id == bomb_id)?;
        let bomb = self.bombs.remove(idx);

        if let Some(owner) = self
            .roster
            .iter_mut()
            .find(|p| p.id == bomb.info.owner && p.alive)
        {
            owner.bombs += 1;
        }

        let blast = blast_cells(&self.grid, bomb.info.position, bomb.info.radius);
        for &pos in &blast {
            if self.grid.get(pos) != Some(Cell::Block) {
                continue;
            }
            self.grid.set(pos, Cell::Empty);
            if rng.random::<f64>() < self.config.power_up_chance {
                let kind = PowerUpKind::ALL[rng.random_range(0..PowerUpKind::ALL.len())];
                self.power_ups.push(PowerUp {
                    position: pos,
                    kind,
                });
            }
        }

        let mut casualties = Vec::new();
        for p in self
            .roster
            .iter_mut()
            .filter(|p| p.alive && blast.contains(&p.position))
        {
            p.alive = false;
            casualties.push(p.id);
            info!(session_id = %self.id, participant = %p.id, bomb = %bomb_id, "participant eliminated");
        }
        self.blasts.push(bomb_id);

        debug!(
            session_id = %self.id,
            bomb = %bomb_id,
            fuse_ms = millis(now.saturating_duration_since(bomb.armed_at)),
            cells = blast.len(),
            casualties = casualties.len(),
            "bomb detonated"
        );

        Some(vec![Notification::BombDetonated {
            bomb: bomb_id,
            blast,
            casualties,
            grid: self.grid.clone(),
            power_ups: self.power_ups.clone(),
        }])
    }

    /// Ends a blast's display window and re-checks the win condition.
    ///
    /// Returns `None` for a blast that is not on screen.
    pub fn clear_blast(&mut self, bomb_id: BombId) -> Option<Vec<Notification>> {
        let idx = self.blasts.iter().position(|b| *b == bomb_id)?;
        self.blasts.remove(idx);

        let mut notes = vec![Notification::BlastCleared { bomb: bomb_id }];
        notes.extend(self.check_over());
        Some(notes)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn index_of(&self, id: ParticipantId) -> Option<usize> {
        self.roster.iter().position(|p| p.id == id)
    }

    fn free_slot(&self) -> Option<u8> {
        let capacity = u8::try_from(self.capacity()).unwrap_or(u8::MAX);
        (1..=capacity).find(|slot| self.roster.iter().all(|p| p.slot != *slot))
    }

    fn ready_map(&self) -> Vec<ReadyEntry> {
        self.roster
            .iter()
            .map(|p| ReadyEntry {
                participant: p.id,
                ready: p.ready,
            })
            .collect()
    }

    fn take_power_up(&mut self, pos: Position) -> Option<PowerUpKind> {
        let idx = self.power_ups.iter().position(|p| p.position == pos)?;
        Some(self.power_ups.remove(idx).kind)
    }

    fn transition(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase change {} -> {}",
            self.phase,
            next
        );
        info!(session_id = %self.id, from = %self.phase, to = %next, "phase changed");
        self.phase = next;
    }

    /// ReadyCheck → Active once the roster is full and everyone is ready.
    fn try_start(&mut self) -> Option<Notification> {
        let full = self.roster.len() == self.capacity();
        if self.phase != Phase::ReadyCheck || !full || !self.roster.iter().all(|p| p.ready) {
            return None;
        }
        self.transition(Phase::Active);
        self.last_move.clear();
        info!(session_id = %self.id, participants = self.roster.len(), "game started");

        Some(Notification::GameStarted {
            grid: self.grid.clone(),
            roster: self.roster.clone(),
        })
    }

    /// Active → Over once at most one participant is alive.
    fn check_over(&mut self) -> Option<Notification> {
        if self.phase != Phase::Active {
            return None;
        }
        let winner = {
            let mut alive = self.roster.iter().filter(|p| p.alive);
            let first = alive.next().cloned();
            if alive.next().is_some() {
                return None;
            }
            first
        };

        self.winner = winner.as_ref().map(|p| p.id);
        self.transition(Phase::Over);
        match &winner {
            Some(p) => info!(session_id = %self.id, winner = %p.id, "game over"),
            None => info!(session_id = %self.id, "game over in a draw"),
        }

        Some(Notification::GameOver { winner })
    }
}

/// Applies a power-up, respecting the configured caps.
fn apply_power_up(participant: &mut Participant, kind: PowerUpKind, config: &EngineConfig) {
    match kind {
        PowerUpKind::ExtraBomb => {
            participant.bombs = (participant.bombs + 1).min(config.max_bombs);
        }
        PowerUpKind::BiggerBlast => {
            participant.blast_radius = (participant.blast_radius + 1).min(config.max_radius);
        }
        PowerUpKind::Speed => {
            participant.move_interval_ms = participant
                .move_interval_ms
                .saturating_sub(millis(config.speed_step))
                .max(millis(config.min_move_interval));
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
