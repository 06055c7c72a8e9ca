//! # Shared Pong Library
//!
//! Types and logic used by both the server and the client. Keeping the
//! physics step here means the authoritative server and an authority client
//! (in client-authoritative mode) advance the ball with byte-for-byte the same
//! rules.
//!
//! - [`world`]: the `WorldState` record and the fixed-step physics tick
//! - [`protocol`]: handshake, intent and snapshot records exchanged on the wire
//! - [`framing`]: length-delimited bincode frames over a reliable byte stream

pub mod framing;
pub mod protocol;
pub mod world;

pub use framing::{decode, encode, read_frame, write_frame, FrameError, MAX_FRAME_LEN};
pub use protocol::{
    AuthorityMode, BallReport, ClientPacket, Intent, Moving, ServerPacket, Side, Snapshot,
};
pub use world::{Field, TickEvents, WorldState};

pub const DEFAULT_SCREEN_WIDTH: u32 = 640;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 480;
pub const DEFAULT_PORT: u16 = 65432;

pub const WALL_THICKNESS: f32 = 10.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 50.0;
/// Horizontal gap between a paddle and its side of the screen.
pub const PADDLE_MARGIN: f32 = 10.0;
pub const PADDLE_SPEED: f32 = 5.0;

pub const BALL_SIZE: f32 = 5.0;
pub const BALL_SPEED: f32 = 5.0;
/// Vertical velocity gained per pixel of offset from the paddle center.
pub const PADDLE_SPIN: f32 = 0.5;

/// A score strictly above this ends the match (first to five).
pub const WIN_THRESHOLD: u32 = 4;

pub const TICK_RATE: u32 = 60;
