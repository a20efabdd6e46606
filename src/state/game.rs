//! Match orchestration.
//!
//! Drives one match through its phases on a single peer. The host calls
//! [`GameOrchestrator::tick`] periodically and forwards bridge events to the
//! `on_*` handlers; outgoing replication messages collect in an outbox the
//! host drains with [`GameOrchestrator::drain_outbound`].
//!
//! # Phase Diagram
//!
//! ```text
//! ┌───────────────┐  seed + timer > 0   ┌──────────┐  presentation delay
//! │ AwaitingPeers │────────────────────▶│ Dealing  │──────────────────┐
//! └───────────────┘                     └──────────┘                  │
//!                                                                     ▼
//!                 ┌───────────────────────────────────────────▶┌──────────┐
//!                 │ synchronized timer elapsed                 │ Playing  │
//!                 │                                            └────┬─────┘
//!        ┌────────┴────────┐   neither side can act, a pile left    │
//!        │  RecoveryPause  │◀──────────────────────────────────────┤
//!        │ ready → reseed  │                                        │
//!        └─────────────────┘                                        │
//!                                 tableau emptied / no moves, no    │
//!        ┌──────────┐             piles left / abandoned            │
//!        │ Finished │◀──────────────────────────────────────────────┘
//!        └──────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::board::{Board, BoardError, Side, StackId};
use super::bridge::PeerMessage;
use super::config::{ConfigError, MatchConfig};
use super::player::{Move, Player};

/// How a finished match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Winner(Side),
    Draw,
    Abandoned,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Winner(_) => "winner",
            Self::Draw => "draw",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn winner(&self) -> Option<Side> {
        match self {
            Self::Winner(side) => Some(*side),
            _ => None,
        }
    }
}

/// Progress through the stalemate recovery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RecoveryStage {
    /// Both players locked, waiting for each to draw
    AwaitingReady,
    /// Foundations reseeded; counting down the synchronized timer once the
    /// bridge supplies one
    Resuming { remaining: Option<f64> },
}

/// Match phases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MatchPhase {
    AwaitingPeers,
    Dealing { remaining: f64 },
    Playing,
    RecoveryPause(RecoveryStage),
    Finished(MatchOutcome),
}

impl MatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingPeers => "awaiting_peers",
            Self::Dealing { .. } => "dealing",
            Self::Playing => "playing",
            Self::RecoveryPause(_) => "recovery_pause",
            Self::Finished(_) => "finished",
        }
    }

    /// Players may move.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("match is finished")]
    Finished,
    #[error("not allowed while {actual}, expected {expected}")]
    WrongPhase {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("message from {sender} touches {stack}, which it does not own")]
    NotOwner { sender: Side, stack: StackId },
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Counters for one match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    /// Applied moves per side
    pub moves: [u32; 2],
    /// Completed recovery cycles
    pub recoveries: u32,
}

/// One peer's view of a match.
#[derive(Debug, Clone)]
pub struct GameOrchestrator {
    config: MatchConfig,

    /// Side played on this peer
    local_side: Side,

    phase: MatchPhase,

    board: Board,

    /// Indexed by `Side::index`
    players: [Player; 2],

    /// Shared seed, once the bridge supplies it
    seed: Option<u64>,

    stats: MatchStats,

    /// Opponent readiness that arrived before this peer entered recovery
    peer_ready_pending: bool,

    /// Messages waiting for the bridge
    outbox: Vec<PeerMessage>,

    /// When play began (Dealing -> Playing)
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,

    /// When the match reached Finished
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl GameOrchestrator {
    pub fn new(config: MatchConfig, local_side: Side) -> Result<Self, ConfigError> {
        config.validate()?;
        let board = Board::new(&config);
        Ok(Self {
            config,
            local_side,
            phase: MatchPhase::AwaitingPeers,
            board,
            players: [Player::new(Side::First), Player::new(Side::Second)],
            seed: None,
            stats: MatchStats::default(),
            peer_ready_pending: false,
            outbox: Vec::new(),
            started_at: None,
            ended_at: None,
        })
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn local_side(&self) -> Side {
        self.local_side
    }

    pub fn player(&self, side: Side) -> &Player {
        &self.players[side.index()]
    }

    pub fn local_player(&self) -> &Player {
        self.player(self.local_side)
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        match self.phase {
            MatchPhase::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Take every message queued for the peer.
    pub fn drain_outbound(&mut self) -> Vec<PeerMessage> {
        std::mem::take(&mut self.outbox)
    }

    fn set_phase(&mut self, phase: MatchPhase) {
        info!(
            side = %self.local_side,
            from = self.phase.as_str(),
            to = phase.as_str(),
            seed = ?self.seed,
            "match phase change"
        );
        self.phase = phase;
    }

    fn ensure_not_finished(&self) -> Result<(), MatchError> {
        if self.phase.is_terminal() {
            return Err(MatchError::Finished);
        }
        Ok(())
    }

    fn refresh_can_act(&mut self) {
        for player in &mut self.players {
            player.refresh_can_act(&self.board);
        }
    }

    fn finish(&mut self, outcome: MatchOutcome) {
        for player in &mut self.players {
            player.lock();
        }
        self.ended_at = Some(chrono::Utc::now());
        info!(side = %self.local_side, outcome = outcome.as_str(), winner = ?outcome.winner(), "match finished");
        self.set_phase(MatchPhase::Finished(outcome));
    }

    /// Give up the match from any phase. Later mutations are rejected.
    pub fn abandon(&mut self) {
        if !self.phase.is_terminal() {
            self.finish(MatchOutcome::Abandoned);
        }
    }

    // ── bridge events ──────────────────────────────────────────────────

    /// Seed and synchronized timer reported by the bridge. Dealing starts
    /// once the timer is positive; before that the match keeps waiting.
    pub fn on_bridge_ready(&mut self, seed: u64, timer: f64) -> Result<(), MatchError> {
        self.ensure_not_finished()?;
        if self.phase != MatchPhase::AwaitingPeers {
            self.on_sync_timer(timer);
            return Ok(());
        }
        self.seed = Some(seed);
        if timer > 0.0 {
            self.deal(seed)?;
        }
        Ok(())
    }

    /// Latest synchronized timer value. Arms the recovery resume countdown.
    pub fn on_sync_timer(&mut self, timer: f64) {
        if let MatchPhase::RecoveryPause(RecoveryStage::Resuming { remaining: None }) = self.phase {
            if timer > 0.0 {
                debug!(side = %self.local_side, timer, "resume countdown armed");
                self.phase = MatchPhase::RecoveryPause(RecoveryStage::Resuming {
                    remaining: Some(timer),
                });
            }
        }
    }

    /// Apply a move replicated from the opponent.
    ///
    /// Rank legality is not re-checked; the sender is authoritative over its
    /// own stacks. Refused are structurally impossible moves and any move that
    /// would touch this peer's half of the board or the main deck.
    pub fn on_move_received(&mut self, source: u8, destination: u8) -> Result<Move, MatchError> {
        self.ensure_not_finished()?;
        if self.phase == MatchPhase::AwaitingPeers {
            warn!(source, destination, "move received before the deal");
            return Err(MatchError::WrongPhase {
                expected: "dealt",
                actual: self.phase.as_str(),
            });
        }

        let sender = self.local_side.opponent();
        let from = self.board.resolve(source)?;
        let to = self.board.resolve(destination)?;
        if from.owner() != Some(sender) {
            warn!(%sender, stack = %from, "rejected move on a stack the sender does not own");
            return Err(MatchError::NotOwner {
                sender,
                stack: from,
            });
        }
        if to == StackId::MainDeck || to.owner() == Some(self.local_side) {
            warn!(%sender, stack = %to, "rejected move into a stack the sender does not own");
            return Err(MatchError::NotOwner { sender, stack: to });
        }

        let card = self.board.move_top(from, to).inspect_err(|e| {
            warn!(%sender, %from, %to, error = %e, "replicated move failed");
        })?;
        let applied = Move { from, to, card };
        self.record_move(sender, applied);
        Ok(applied)
    }

    /// Readiness from the opponent. Readiness that arrives before this peer
    /// notices the stalemate is kept for the coming recovery.
    pub fn on_ready_received(&mut self, side: Side, ready: bool) -> Result<(), MatchError> {
        self.ensure_not_finished()?;
        if side == self.local_side {
            warn!(%side, "peer sent readiness for the local side");
            return Err(MatchError::NotOwner {
                sender: side.opponent(),
                stack: StackId::DrawPile(side),
            });
        }
        match self.phase {
            MatchPhase::RecoveryPause(RecoveryStage::AwaitingReady) => {
                debug!(%side, ready, "peer readiness");
                self.players[side.index()].is_ready = ready;
                self.try_reseed()
            }
            MatchPhase::AwaitingPeers => Err(MatchError::WrongPhase {
                expected: "dealt",
                actual: self.phase.as_str(),
            }),
            _ => {
                debug!(%side, ready, phase = self.phase.as_str(), "peer readiness held for recovery");
                self.peer_ready_pending = ready;
                Ok(())
            }
        }
    }

    // ── local player ───────────────────────────────────────────────────

    /// Pick up a card for the local player.
    ///
    /// During recovery, selecting the local draw pile signals readiness.
    /// Illegal selections are logged and ignored.
    pub fn select(&mut self, stack: StackId) -> Result<(), MatchError> {
        self.ensure_not_finished()?;
        if let MatchPhase::RecoveryPause(RecoveryStage::AwaitingReady) = self.phase {
            if stack == StackId::DrawPile(self.local_side) {
                return self.signal_ready();
            }
        }
        if let Err(reason) = self.players[self.local_side.index()].select(&self.board, stack) {
            debug!(side = %self.local_side, %stack, %reason, "selection refused");
        }
        Ok(())
    }

    /// Play the local selection onto `to`.
    ///
    /// Returns `Ok(None)` when the move is illegal; the selection is cleared
    /// and nothing on the board changes.
    pub fn play_selected(&mut self, to: StackId) -> Result<Option<Move>, MatchError> {
        self.ensure_not_finished()?;
        let side = self.local_side;
        if !self.phase.is_active() {
            self.players[side.index()].clear_selection();
            debug!(%side, phase = self.phase.as_str(), "move outside play ignored");
            return Ok(None);
        }

        match self.players[side.index()].play_selected(&mut self.board, to) {
            Ok(applied) => {
                self.record_move(side, applied);
                self.outbox.push(PeerMessage::Move {
                    source: applied.from.index(),
                    destination: applied.to.index(),
                });
                Ok(Some(applied))
            }
            Err(reason) => {
                debug!(%side, %to, %reason, "illegal move rejected");
                Ok(None)
            }
        }
    }

    /// Play the first move the local hint scan finds.
    pub fn play_hint(&mut self) -> Result<Option<Move>, MatchError> {
        let Some(hint) = self.local_player().hint(&self.board) else {
            return Ok(None);
        };
        let (from, to) = hint.endpoints();
        self.select(from)?;
        self.play_selected(to)
    }

    /// Local player draws during recovery.
    pub fn signal_ready(&mut self) -> Result<(), MatchError> {
        self.ensure_not_finished()?;
        if self.phase != MatchPhase::RecoveryPause(RecoveryStage::AwaitingReady) {
            return Err(MatchError::WrongPhase {
                expected: "recovery_pause",
                actual: self.phase.as_str(),
            });
        }
        self.mark_local_ready();
        self.try_reseed()
    }

    fn mark_local_ready(&mut self) {
        let side = self.local_side;
        if self.players[side.index()].is_ready {
            return;
        }
        self.players[side.index()].is_ready = true;
        self.outbox.push(PeerMessage::Ready { side, ready: true });
    }

    fn record_move(&mut self, side: Side, applied: Move) {
        debug!(
            %side,
            from = %applied.from,
            to = %applied.to,
            card = %applied.card,
            "move applied"
        );
        self.stats.moves[side.index()] += 1;
        self.refresh_can_act();
    }

    // ── phase machine ──────────────────────────────────────────────────

    fn deal(&mut self, seed: u64) -> Result<(), MatchError> {
        self.board = Board::dealt(seed, &self.config).inspect_err(|e| {
            error!(seed, error = %e, "deal failed");
        })?;
        debug!(seed, cards = self.board.total_cards(), "board dealt");
        self.set_phase(MatchPhase::Dealing {
            remaining: self.config.deal_presentation_delay,
        });
        Ok(())
    }

    fn begin_play(&mut self) {
        for player in &mut self.players {
            player.unlock();
            player.is_ready = false;
        }
        self.refresh_can_act();
        if self.started_at.is_none() {
            self.started_at = Some(chrono::Utc::now());
        }
        self.set_phase(MatchPhase::Playing);
    }

    fn enter_recovery(&mut self) {
        for player in &mut self.players {
            player.lock();
        }
        self.set_phase(MatchPhase::RecoveryPause(RecoveryStage::AwaitingReady));

        let peer = self.local_side.opponent();
        if std::mem::take(&mut self.peer_ready_pending) {
            self.players[peer.index()].is_ready = true;
        }

        // A side with nothing left to draw has nothing to wait for
        for side in Side::ALL {
            if self.board.draw_pile(side).is_empty() {
                if side == self.local_side {
                    self.mark_local_ready();
                } else {
                    self.players[side.index()].is_ready = true;
                }
            }
        }
    }

    /// Reseed once both sides are ready.
    fn try_reseed(&mut self) -> Result<(), MatchError> {
        if self.phase != MatchPhase::RecoveryPause(RecoveryStage::AwaitingReady) {
            return Ok(());
        }
        if !self.players.iter().all(|p| p.is_ready) {
            return Ok(());
        }

        let reseeded = self.board.reseed_foundations().inspect_err(|e| {
            error!(error = %e, "reseed failed");
        })?;
        self.stats.recoveries += 1;
        debug!(?reseeded, recoveries = self.stats.recoveries, "foundations reseeded");
        self.phase = MatchPhase::RecoveryPause(RecoveryStage::Resuming { remaining: None });
        Ok(())
    }

    fn resume_play(&mut self) {
        for player in &mut self.players {
            player.is_ready = false;
            player.unlock();
        }
        self.refresh_can_act();
        self.set_phase(MatchPhase::Playing);
    }

    /// Win or stalemate check for the Playing phase. An emptied tableau wins
    /// even when both draw piles are also empty; only a double zero or a
    /// stalemate with nothing left to draw is a draw.
    fn evaluate(&mut self) {
        let emptied: Vec<Side> = Side::ALL
            .into_iter()
            .filter(|side| self.board.tableau_count(*side) == 0)
            .collect();
        match emptied.as_slice() {
            [side] => return self.finish(MatchOutcome::Winner(*side)),
            [_, _] => return self.finish(MatchOutcome::Draw),
            _ => {}
        }

        if self.players.iter().any(Player::can_act) {
            return;
        }
        let piles_left = Side::ALL
            .iter()
            .any(|side| !self.board.draw_pile(*side).is_empty());
        if piles_left {
            self.enter_recovery();
        } else {
            self.finish(MatchOutcome::Draw);
        }
    }

    /// Advance time by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> Result<(), MatchError> {
        match self.phase {
            MatchPhase::AwaitingPeers | MatchPhase::Finished(_) => {}
            MatchPhase::Dealing { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.begin_play();
                } else {
                    self.phase = MatchPhase::Dealing { remaining };
                }
            }
            MatchPhase::Playing => self.evaluate(),
            MatchPhase::RecoveryPause(RecoveryStage::AwaitingReady) => self.try_reseed()?,
            MatchPhase::RecoveryPause(RecoveryStage::Resuming { remaining }) => {
                if let Some(remaining) = remaining {
                    let remaining = remaining - dt;
                    if remaining <= 0.0 {
                        self.resume_play();
                    } else {
                        self.phase = MatchPhase::RecoveryPause(RecoveryStage::Resuming {
                            remaining: Some(remaining),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    // ── snapshots ──────────────────────────────────────────────────────

    /// Client-facing snapshot. Hidden stacks only report their size.
    pub fn to_json(&self) -> serde_json::Value {
        let side_json = |side: Side| {
            let player = self.player(side);
            let columns: Vec<serde_json::Value> = self
                .board
                .columns(side)
                .map(|(_, stack)| {
                    serde_json::json!({
                        "count": stack.count(),
                        "top": stack.visible_top().map(|c| c.face())
                    })
                })
                .collect();
            serde_json::json!({
                "side": side.index(),
                "tableau": columns,
                "draw_pile": self.board.draw_pile(side).count(),
                "can_act": player.can_act(),
                "is_ready": player.is_ready,
                "is_locked": player.is_locked,
                "moves": self.stats.moves[side.index()]
            })
        };

        let foundations: Vec<serde_json::Value> = self
            .board
            .foundations()
            .map(|(_, stack)| {
                serde_json::json!({
                    "count": stack.count(),
                    "top": stack.visible_top().map(|c| c.face())
                })
            })
            .collect();

        let mut obj = serde_json::json!({
            "phase": self.phase.as_str(),
            "local_side": self.local_side.index(),
            "seed": self.seed,
            "foundations": foundations,
            "players": [side_json(Side::First), side_json(Side::Second)],
            "recoveries": self.stats.recoveries,
            "started_at": self.started_at,
            "ended_at": self.ended_at
        });
        if let Some(outcome) = self.outcome() {
            obj["outcome"] = serde_json::json!(outcome.as_str());
            obj["winner"] = serde_json::json!(outcome.winner().map(|s| s.index()));
        }
        obj
    }
}
