//! Records exchanged between the server and its two clients

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which paddle a connection controls. Assigned once on accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Slot index in a two-element session table
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Who owns the ball and the score for the lifetime of a match.
///
/// Resolved once when the server starts and announced in every handshake,
/// so both clients agree on it without negotiating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthorityMode {
    /// The server runs physics; clients only send their own paddle.
    #[default]
    ServerAuthoritative,
    /// The left client runs physics and reports it; the server relays it,
    /// keeping whichever report carries the higher sync counter.
    ClientAuthoritative,
}

impl AuthorityMode {
    /// Whether a client on `side` should simulate the ball locally
    pub fn is_ball_authority(self, side: Side) -> bool {
        self == AuthorityMode::ClientAuthoritative && side == Side::Left
    }
}

impl fmt::Display for AuthorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityMode::ServerAuthoritative => write!(f, "server-authoritative"),
            AuthorityMode::ClientAuthoritative => write!(f, "client-authoritative"),
        }
    }
}

/// Local paddle movement intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Moving {
    Up,
    Down,
    #[default]
    None,
}

/// Ball and score as seen by a client that claims authority over them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallReport {
    pub ball_x: f32,
    pub ball_y: f32,
    pub ball_x_vel: f32,
    pub ball_y_vel: f32,
    pub left_score: u32,
    pub right_score: u32,
    pub sync: u64,
}

/// Per-frame client message: the sender's own paddle, and optionally its
/// view of the ball when it runs physics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub paddle_y: f32,
    pub moving: Moving,
    pub report: Option<BallReport>,
}

/// Read-only projection of the world built fresh for one recipient.
///
/// `own_paddle_y` and `opponent_paddle_y` are framed from the recipient's
/// side so a client never has to know which physical paddle it is drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub own_paddle_y: f32,
    pub opponent_paddle_y: f32,
    pub ball_x: f32,
    pub ball_y: f32,
    pub ball_x_vel: f32,
    pub ball_y_vel: f32,
    pub left_score: u32,
    pub right_score: u32,
    pub sync: u64,
    pub opponent_connected: bool,
    pub winner: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientPacket {
    Intent(Intent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    /// First record on every accepted connection
    Handshake {
        screen_width: u32,
        screen_height: u32,
        side: Side,
        mode: AuthorityMode,
    },
    Snapshot(Snapshot),
    /// Sent instead of a handshake when the match is full; the server closes
    /// the stream right after.
    Rejected { reason: String },
}
