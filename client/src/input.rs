//! Paddle input for the headless client

use crate::reconciler::RenderState;
use log::debug;
use pong_shared::{Moving, BALL_SIZE, PADDLE_HEIGHT};

/// Default half-width of the band around the paddle centre where the
/// autopilot stops moving
pub const DEFAULT_DEAD_ZONE: f32 = 8.0;

/// Produces one `Moving` per frame.
///
/// Without an override the paddle follows the ball on its own. An override
/// (e.g. from a scripted test or a future keyboard front end) replaces the
/// autopilot until it is cleared.
pub struct InputManager {
    override_moving: Option<Moving>,
    dead_zone: f32,
    last: Moving,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    pub fn new() -> Self {
        Self::with_dead_zone(DEFAULT_DEAD_ZONE)
    }

    pub fn with_dead_zone(dead_zone: f32) -> Self {
        Self {
            override_moving: None,
            dead_zone: dead_zone.max(0.0),
            last: Moving::None,
        }
    }

    pub fn set_override(&mut self, moving: Option<Moving>) {
        self.override_moving = moving;
    }

    pub fn last(&self) -> Moving {
        self.last
    }

    /// Decides this frame's movement from the last rendered state
    pub fn update(&mut self, state: &RenderState) -> Moving {
        let moving = self
            .override_moving
            .unwrap_or_else(|| self.autopilot(state));

        if moving != self.last {
            debug!("Paddle input changed: {:?} -> {:?}", self.last, moving);
        }
        self.last = moving;
        moving
    }

    fn autopilot(&self, state: &RenderState) -> Moving {
        if state.winner.is_some() || !state.opponent_connected {
            return Moving::None;
        }

        let paddle_center = state.own_paddle_y + PADDLE_HEIGHT / 2.0;
        let ball_center = state.ball_y + BALL_SIZE / 2.0;

        if ball_center < paddle_center - self.dead_zone {
            Moving::Up
        } else if ball_center > paddle_center + self.dead_zone {
            Moving::Down
        } else {
            Moving::None
        }
    }
}
