//! Authoritative world record and the fixed-step physics tick
//!
//! Positions are top-left corners in screen pixels, velocities are pixels per
//! tick. The tick is deterministic: the same `WorldState` always advances to
//! the same successor.

use crate::protocol::{BallReport, Moving, Side, Snapshot};
use crate::{
    BALL_SIZE, BALL_SPEED, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH, PADDLE_HEIGHT,
    PADDLE_MARGIN, PADDLE_SPEED, PADDLE_SPIN, PADDLE_WIDTH, WALL_THICKNESS, WIN_THRESHOLD,
};
use serde::{Deserialize, Serialize};

/// Playfield dimensions announced in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub width: f32,
    pub height: f32,
}

impl Field {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Lowest y the ball or a paddle may occupy (bottom edge of the top wall)
    pub fn top(&self) -> f32 {
        WALL_THICKNESS
    }

    /// Top edge of the bottom wall
    pub fn bottom(&self) -> f32 {
        self.height - WALL_THICKNESS
    }

    pub fn paddle_x(&self, side: Side) -> f32 {
        match side {
            Side::Left => PADDLE_MARGIN,
            Side::Right => self.width - PADDLE_MARGIN - PADDLE_WIDTH,
        }
    }

    /// Clamps a paddle's top edge so the paddle stays between the walls
    pub fn clamp_paddle_y(&self, y: f32) -> f32 {
        // max/min rather than clamp: a degenerate field must not panic
        y.min(self.bottom() - PADDLE_HEIGHT).max(self.top())
    }

    pub fn paddle_start_y(&self) -> f32 {
        self.height / 2.0 - PADDLE_HEIGHT / 2.0
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Field {
    fn default() -> Self {
        Self::new(DEFAULT_SCREEN_WIDTH, DEFAULT_SCREEN_HEIGHT)
    }
}

/// Axis-aligned rectangle as (left, top, right, bottom)
type Bounds = (f32, f32, f32, f32);

/// Strict overlap test; rectangles that only share an edge do not collide
pub fn check_collision(a: Bounds, b: Bounds) -> bool {
    let (x1, y1, x2, y2) = a;
    let (x3, y3, x4, y4) = b;

    !(x2 <= x3 || x4 <= x1 || y2 <= y3 || y4 <= y1)
}

/// What happened during one tick, used for sound cues and sync accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEvents {
    pub moved: bool,
    pub wall_bounce: bool,
    pub paddle_bounce: Option<Side>,
    pub scored: Option<Side>,
}

impl TickEvents {
    /// True when any state-changing branch fired
    pub fn changed(&self) -> bool {
        self.moved || self.wall_bounce || self.paddle_bounce.is_some() || self.scored.is_some()
    }

    pub fn bounced(&self) -> bool {
        self.wall_bounce || self.paddle_bounce.is_some()
    }
}

/// Both paddles, the ball, the score and the sync counter of one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub field: Field,
    pub left_paddle_y: f32,
    pub right_paddle_y: f32,
    pub ball_x: f32,
    pub ball_y: f32,
    pub ball_x_vel: f32,
    pub ball_y_vel: f32,
    pub left_score: u32,
    pub right_score: u32,
    /// Freshness marker. `tick` only ever raises it; `reset` and
    /// `adopt_report` replace it wholesale, so callers adopting a report
    /// decide whether it is newer first.
    pub sync: u64,
}

impl WorldState {
    pub fn new(field: Field) -> Self {
        let (center_x, center_y) = field.center();
        let paddle_y = field.paddle_start_y();

        Self {
            field,
            left_paddle_y: paddle_y,
            right_paddle_y: paddle_y,
            ball_x: center_x,
            ball_y: center_y,
            ball_x_vel: -BALL_SPEED,
            ball_y_vel: 0.0,
            left_score: 0,
            right_score: 0,
            sync: 0,
        }
    }

    /// Restores initial values for the next match, keeping the field
    pub fn reset(&mut self) {
        *self = Self::new(self.field);
    }

    pub fn paddle_y(&self, side: Side) -> f32 {
        match side {
            Side::Left => self.left_paddle_y,
            Side::Right => self.right_paddle_y,
        }
    }

    /// Sets a paddle's position, clamped between the walls. Does not touch
    /// the ball, the score or the sync counter.
    pub fn set_paddle(&mut self, side: Side, y: f32) {
        let y = self.field.clamp_paddle_y(y);
        match side {
            Side::Left => self.left_paddle_y = y,
            Side::Right => self.right_paddle_y = y,
        }
    }

    /// Moves a paddle one frame's worth in the given direction
    pub fn move_paddle(&mut self, side: Side, moving: Moving) {
        let y = self.paddle_y(side);
        match moving {
            Moving::Up => self.set_paddle(side, y - PADDLE_SPEED),
            Moving::Down => self.set_paddle(side, y + PADDLE_SPEED),
            Moving::None => {}
        }
    }

    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left_score,
            Side::Right => self.right_score,
        }
    }

    pub fn winner(&self) -> Option<Side> {
        if self.left_score > WIN_THRESHOLD {
            Some(Side::Left)
        } else if self.right_score > WIN_THRESHOLD {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn is_over(&self) -> bool {
        self.winner().is_some()
    }

    fn ball_bounds(&self) -> Bounds {
        (
            self.ball_x,
            self.ball_y,
            self.ball_x + BALL_SIZE,
            self.ball_y + BALL_SIZE,
        )
    }

    fn paddle_bounds(&self, side: Side) -> Bounds {
        let x = self.field.paddle_x(side);
        let y = self.paddle_y(side);
        (x, y, x + PADDLE_WIDTH, y + PADDLE_HEIGHT)
    }

    /// Reflects the ball off a paddle; the further from the paddle center
    /// the hit lands, the steeper the new vertical velocity.
    fn deflect(&mut self, side: Side) {
        let ball_center = self.ball_y + BALL_SIZE / 2.0;
        let paddle_center = self.paddle_y(side) + PADDLE_HEIGHT / 2.0;

        self.ball_x_vel = -self.ball_x_vel;
        self.ball_y_vel = (ball_center - paddle_center) * PADDLE_SPIN;
    }

    /// Puts the ball back at center, heading toward `toward`
    fn serve(&mut self, toward: Side) {
        let (center_x, center_y) = self.field.center();
        self.ball_x = center_x;
        self.ball_y = center_y;
        self.ball_x_vel = match toward {
            Side::Left => -BALL_SPEED,
            Side::Right => BALL_SPEED,
        };
        self.ball_y_vel = 0.0;
    }

    /// Advances the ball by one step.
    ///
    /// Order: move, top/bottom walls, left/right paddles, side boundaries.
    /// A paddle only reflects a ball travelling toward it, so a ball still
    /// overlapping a paddle after a hit cannot bounce twice. `sync` goes up
    /// by exactly one when anything changed. Once a side has won the tick is
    /// a no-op.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();
        if self.is_over() {
            return events;
        }

        if self.ball_x_vel != 0.0 || self.ball_y_vel != 0.0 {
            self.ball_x += self.ball_x_vel;
            self.ball_y += self.ball_y_vel;
            events.moved = true;
        }

        let top = self.field.top();
        let bottom = self.field.bottom();

        if self.ball_y <= top {
            self.ball_y = top;
            if self.ball_y_vel < 0.0 {
                self.ball_y_vel = -self.ball_y_vel;
                events.wall_bounce = true;
            }
        }

        if self.ball_y + BALL_SIZE >= bottom {
            self.ball_y = bottom - BALL_SIZE;
            if self.ball_y_vel > 0.0 {
                self.ball_y_vel = -self.ball_y_vel;
                events.wall_bounce = true;
            }
        }

        if self.ball_x_vel < 0.0
            && check_collision(self.ball_bounds(), self.paddle_bounds(Side::Left))
        {
            self.ball_x = self.field.paddle_x(Side::Left) + PADDLE_WIDTH;
            self.deflect(Side::Left);
            events.paddle_bounce = Some(Side::Left);
        }

        if self.ball_x_vel > 0.0
            && check_collision(self.ball_bounds(), self.paddle_bounds(Side::Right))
        {
            self.ball_x = self.field.paddle_x(Side::Right) - BALL_SIZE;
            self.deflect(Side::Right);
            events.paddle_bounce = Some(Side::Right);
        }

        if self.ball_x <= 0.0 {
            self.right_score += 1;
            self.serve(Side::Right);
            events.scored = Some(Side::Right);
        } else if self.ball_x + BALL_SIZE >= self.field.width {
            self.left_score += 1;
            self.serve(Side::Left);
            events.scored = Some(Side::Left);
        }

        if events.changed() {
            self.sync = self.sync.saturating_add(1);
        }

        events
    }

    /// Builds the snapshot one recipient sees
    pub fn snapshot_for(&self, side: Side, opponent_connected: bool) -> Snapshot {
        Snapshot {
            own_paddle_y: self.paddle_y(side),
            opponent_paddle_y: self.paddle_y(side.opponent()),
            ball_x: self.ball_x,
            ball_y: self.ball_y,
            ball_x_vel: self.ball_x_vel,
            ball_y_vel: self.ball_y_vel,
            left_score: self.left_score,
            right_score: self.right_score,
            sync: self.sync,
            opponent_connected,
            winner: self.winner(),
        }
    }

    /// Ball and score as an authority client reports them
    pub fn report(&self) -> BallReport {
        BallReport {
            ball_x: self.ball_x,
            ball_y: self.ball_y,
            ball_x_vel: self.ball_x_vel,
            ball_y_vel: self.ball_y_vel,
            left_score: self.left_score,
            right_score: self.right_score,
            sync: self.sync,
        }
    }

    /// Overwrites ball, score and sync with a report as a whole; fields are
    /// never merged across reports.
    pub fn adopt_report(&mut self, report: &BallReport) {
        self.ball_x = report.ball_x;
        self.ball_y = report.ball_y;
        self.ball_x_vel = report.ball_x_vel;
        self.ball_y_vel = report.ball_y_vel;
        self.left_score = report.left_score;
        self.right_score = report.right_score;
        self.sync = report.sync;
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new(Field::default())
    }
}
