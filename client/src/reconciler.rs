//! Client-side merge of authoritative snapshots with local input
//!
//! The reconciler owns the client's local copy of the world. Local paddle
//! movement lands in it immediately; snapshots from the server then overwrite
//! whatever the server is authoritative for. Sound cues are derived by
//! diffing consecutive snapshots, so they fire once per event no matter how
//! the snapshot cadence lines up with the frame loop.

use log::debug;
use pong_shared::{
    AuthorityMode, BallReport, Field, Intent, Moving, Side, Snapshot, TickEvents, WorldState,
};
use std::fmt;

/// Edge-triggered audio/visual effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Bounce,
    Score(Side),
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub own_paddle_y: f32,
    pub opponent_paddle_y: f32,
    pub ball_x: f32,
    pub ball_y: f32,
    pub left_score: u32,
    pub right_score: u32,
    pub opponent_connected: bool,
    pub winner: Option<Side>,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} | ball ({:.0}, {:.0}) | paddles own {:.0} opp {:.0}{}",
            self.left_score,
            self.right_score,
            self.ball_x,
            self.ball_y,
            self.own_paddle_y,
            self.opponent_paddle_y,
            if self.opponent_connected {
                ""
            } else {
                " | opponent away"
            }
        )
    }
}

pub struct Reconciler {
    side: Side,
    mode: AuthorityMode,
    world: WorldState,
    moving: Moving,
    previous: Option<Snapshot>,
    latest: Option<Snapshot>,
}

impl Reconciler {
    pub fn new(field: Field, side: Side, mode: AuthorityMode) -> Self {
        Self {
            side,
            mode,
            world: WorldState::new(field),
            moving: Moving::None,
            previous: None,
            latest: None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn mode(&self) -> AuthorityMode {
        self.mode
    }

    /// True for the one client that simulates the ball locally
    pub fn is_ball_authority(&self) -> bool {
        self.mode.is_ball_authority(self.side)
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    /// False until a snapshot says the other seat is filled
    pub fn opponent_connected(&self) -> bool {
        self.latest.as_ref().is_some_and(|s| s.opponent_connected)
    }

    /// Moves the local paddle right away to hide latency
    pub fn apply_local_move(&mut self, moving: Moving) {
        self.moving = moving;
        self.world.move_paddle(self.side, moving);
    }

    /// Runs the physics step locally when this client holds ball authority.
    /// Paused while the opponent is away, like the server would.
    pub fn step_authority(&mut self) -> Vec<Cue> {
        if !self.is_ball_authority() || !self.opponent_connected() {
            return Vec::new();
        }
        let events = self.world.tick();
        cues_from_events(&events)
    }

    /// The record to send this frame
    pub fn outgoing_intent(&self) -> Intent {
        Intent {
            paddle_y: self.world.paddle_y(self.side),
            moving: self.moving,
            report: self.is_ball_authority().then(|| self.world.report()),
        }
    }

    /// Merges one snapshot and returns the cues it implies.
    ///
    /// Snapshots older than the last one applied are ignored. The opponent's
    /// paddle is always taken from the snapshot. In server-authoritative mode
    /// so are the own paddle, ball and score; in client-authoritative mode the
    /// authority only yields its ball to a snapshot with a newer sync counter.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> Vec<Cue> {
        if let Some(latest) = &self.latest {
            if snapshot.sync < latest.sync {
                debug!(
                    "Ignoring stale snapshot (sync {} < {})",
                    snapshot.sync, latest.sync
                );
                return Vec::new();
            }
        }

        let authority = self.is_ball_authority();
        let cues = match &self.latest {
            Some(previous) if !authority => diff_cues(previous, &snapshot),
            _ => Vec::new(),
        };

        self.world
            .set_paddle(self.side.opponent(), snapshot.opponent_paddle_y);

        match self.mode {
            AuthorityMode::ServerAuthoritative => {
                self.world.set_paddle(self.side, snapshot.own_paddle_y);
                self.world.adopt_report(&ball_of(&snapshot));
            }
            AuthorityMode::ClientAuthoritative if authority => {
                if snapshot.sync > self.world.sync {
                    self.world.adopt_report(&ball_of(&snapshot));
                }
            }
            AuthorityMode::ClientAuthoritative => {
                self.world.adopt_report(&ball_of(&snapshot));
            }
        }

        self.previous = self.latest.replace(snapshot);
        cues
    }

    /// Last known state; unchanged when no snapshot arrived this frame
    pub fn render_state(&self) -> RenderState {
        RenderState {
            own_paddle_y: self.world.paddle_y(self.side),
            opponent_paddle_y: self.world.paddle_y(self.side.opponent()),
            ball_x: self.world.ball_x,
            ball_y: self.world.ball_y,
            left_score: self.world.left_score,
            right_score: self.world.right_score,
            opponent_connected: self.opponent_connected(),
            winner: self.world.winner(),
        }
    }
}

fn ball_of(snapshot: &Snapshot) -> BallReport {
    BallReport {
        ball_x: snapshot.ball_x,
        ball_y: snapshot.ball_y,
        ball_x_vel: snapshot.ball_x_vel,
        ball_y_vel: snapshot.ball_y_vel,
        left_score: snapshot.left_score,
        right_score: snapshot.right_score,
        sync: snapshot.sync,
    }
}

fn flipped(before: f32, after: f32) -> bool {
    before * after < 0.0
}

/// Cues implied by going from `old` to `new`. A score suppresses the bounce
/// cue the re-serve would otherwise look like.
pub fn diff_cues(old: &Snapshot, new: &Snapshot) -> Vec<Cue> {
    let mut cues = Vec::new();

    if new.left_score > old.left_score {
        cues.push(Cue::Score(Side::Left));
    }
    if new.right_score > old.right_score {
        cues.push(Cue::Score(Side::Right));
    }

    if cues.is_empty()
        && (flipped(old.ball_x_vel, new.ball_x_vel) || flipped(old.ball_y_vel, new.ball_y_vel))
    {
        cues.push(Cue::Bounce);
    }

    cues
}

fn cues_from_events(events: &TickEvents) -> Vec<Cue> {
    match events.scored {
        Some(scorer) => vec![Cue::Score(scorer)],
        None if events.bounced() => vec![Cue::Bounce],
        None => Vec::new(),
    }
}
