//! Lock-guarded match state: the world, both sessions and the authority mode
//!
//! Every read-modify-write on a match happens through `&mut GameState` while
//! the caller holds the match lock, so applying an intent, advancing a tick
//! and building snapshots never interleave.

use crate::client_manager::{Outbound, SessionManager};
use log::{debug, info, warn};
use pong_shared::{
    AuthorityMode, BallReport, Field, Intent, ServerPacket, Side, TickEvents, WorldState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedGame = Arc<Mutex<GameState>>;

/// Furthest a ball report may run ahead of the stored sync counter, ten
/// seconds of ticks at the default rate
pub const MAX_SYNC_JUMP: u64 = 600;

/// What became of a client's intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Paddle updated; any ball report was ignored or absent
    Applied,
    /// Paddle updated and the sender's ball report replaced the stored ball
    AdoptedReport,
    /// Paddle updated, ball report older than the stored state
    StaleReport,
    /// Record carried impossible values and was dropped entirely
    Rejected,
}

#[derive(Debug)]
pub struct GameState {
    pub world: WorldState,
    pub clients: SessionManager,
    pub mode: AuthorityMode,
    pub tick: u64,
}

impl GameState {
    pub fn new(field: Field, mode: AuthorityMode) -> Self {
        Self {
            world: WorldState::new(field),
            clients: SessionManager::new(),
            mode,
            tick: 0,
        }
    }

    pub fn shared(field: Field, mode: AuthorityMode) -> SharedGame {
        Arc::new(Mutex::new(Self::new(field, mode)))
    }

    /// Physics only runs while both seats are filled
    pub fn is_live(&self) -> bool {
        self.clients.is_full()
    }

    /// Seats a new connection and queues its handshake as the first record on
    /// its outbound stream. Returns `None` when the match is full.
    pub fn connect(&mut self, addr: SocketAddr, outbound: Outbound) -> Option<Side> {
        let side = self.clients.add(addr, outbound)?;

        let handshake = ServerPacket::Handshake {
            screen_width: self.world.field.width as u32,
            screen_height: self.world.field.height as u32,
            side,
            mode: self.mode,
        };
        if let Some(session) = self.clients.get(side) {
            session.send(handshake);
        }

        if self.is_live() {
            info!("Both players connected, match running ({})", self.mode);
        }
        Some(side)
    }

    /// Removes a session. The last one out resets the world for the next
    /// match; otherwise the world stays frozen until the seat is refilled.
    pub fn disconnect(&mut self, side: Side) {
        if self.clients.remove(side).is_none() {
            return;
        }

        if self.clients.is_empty() {
            info!("Match empty, resetting world");
            self.world.reset();
            self.tick = 0;
        } else {
            info!("{} player gone, physics suspended", side);
        }
    }

    /// Applies one intent from the player on `side`.
    ///
    /// The sender is only ever trusted for its own paddle. In
    /// client-authoritative mode a ball report from the designated authority
    /// (left) replaces ball and score when its sync counter is not older than
    /// the stored one; reports from anyone else are ignored.
    pub fn apply_intent(&mut self, side: Side, intent: &Intent) -> IntentOutcome {
        if !intent.paddle_y.is_finite() {
            warn!("Dropping intent from {} with paddle_y {}", side, intent.paddle_y);
            return IntentOutcome::Rejected;
        }

        self.world.set_paddle(side, intent.paddle_y);
        if let Some(session) = self.clients.get_mut(side) {
            session.record_intent(self.world.paddle_y(side));
        }

        let Some(report) = &intent.report else {
            return IntentOutcome::Applied;
        };

        if !self.mode.is_ball_authority(side) {
            debug!("Ignoring ball report from {} in {} mode", side, self.mode);
            return IntentOutcome::Applied;
        }
        self.merge_report(side, report)
    }

    fn merge_report(&mut self, side: Side, report: &BallReport) -> IntentOutcome {
        if !self.is_live() || self.world.is_over() {
            return IntentOutcome::StaleReport;
        }

        let finite = [
            report.ball_x,
            report.ball_y,
            report.ball_x_vel,
            report.ball_y_vel,
        ]
        .iter()
        .all(|v| v.is_finite());
        let too_far_ahead = report.sync > self.world.sync.saturating_add(MAX_SYNC_JUMP);
        if !finite
            || too_far_ahead
            || report.left_score < self.world.left_score
            || report.right_score < self.world.right_score
        {
            warn!("Dropping inconsistent ball report from {}", side);
            return IntentOutcome::Rejected;
        }

        // only the authority gets here, so it also wins a tie
        if report.sync >= self.world.sync {
            self.world.adopt_report(report);
            IntentOutcome::AdoptedReport
        } else {
            IntentOutcome::StaleReport
        }
    }

    /// Runs one simulation tick if this server owns physics and the match is
    /// live; returns what happened.
    pub fn advance(&mut self) -> TickEvents {
        self.tick += 1;

        if self.mode != AuthorityMode::ServerAuthoritative || !self.is_live() {
            return TickEvents::default();
        }

        let was_over = self.world.is_over();
        let events = self.world.tick();

        if let Some(scorer) = events.scored {
            info!(
                "{} scores: {} - {}",
                scorer, self.world.left_score, self.world.right_score
            );
        }
        if !was_over {
            if let Some(winner) = self.world.winner() {
                info!("{} player wins the match", winner);
            }
        }

        events
    }

    /// Queues a snapshot of the current world to every seated player. Both
    /// snapshots come from the same world version.
    pub fn broadcast(&self) {
        for session in self.clients.iter() {
            let opponent_connected = self.clients.is_connected(session.side.opponent());
            let snapshot = self.world.snapshot_for(session.side, opponent_connected);

            if !session.send(ServerPacket::Snapshot(snapshot)) {
                debug!("Writer for {} already closed", session.side);
            }
        }
    }
}
