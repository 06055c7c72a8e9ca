//! # Pong Server Library
//!
//! Authoritative server for a two-player networked pong match. It seats
//! exactly two players, runs the ball physics at a fixed tick rate, and
//! pushes a snapshot of the shared world to both players after every tick.
//!
//! ## Concurrency Model
//!
//! - One reader task and one writer task per connection
//! - One simulation clock task ticking at 60Hz
//! - A single `Arc<Mutex<GameState>>` as the only shared mutable state
//!
//! Applying an intent, running a tick and building snapshots each happen in
//! one critical section, so no task ever observes a half-updated world. The
//! lock is never held across socket I/O: snapshots are handed to each
//! connection's writer through a bounded queue.
//!
//! ## Authority Modes
//!
//! The server defaults to server-authoritative play, where clients only send
//! their own paddle position. The alternate client-authoritative mode lets
//! the left client run physics and report it; the server keeps whichever
//! report carries the higher sync counter and relays it to both sides. The
//! mode is fixed for the life of the process and announced in every
//! handshake.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use pong_server::config::ServerConfig;
//! use pong_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pong_server::BoxError> {
//!     let server = Server::new(ServerConfig::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;

/// Error type for top-level server entry points
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
