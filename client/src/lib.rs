//! # Pong Client Library
//!
//! Headless client for the two-player pong server. It connects over TCP,
//! learns its side and the authority mode from the handshake, and then runs
//! a fixed-rate frame loop that never blocks on the network.
//!
//! ## Architecture Overview
//!
//! ### Local Responsiveness
//! The player's own paddle moves in the local world the moment input is
//! sampled. The server's next snapshot still has the final word on the
//! opponent's paddle and, in server-authoritative mode, on everything else.
//!
//! ### Ball Authority
//! In client-authoritative mode the left client simulates the ball itself
//! and ships a report with every intent. It only yields to a snapshot whose
//! sync counter is ahead of its own.
//!
//! ### Latency Simulation
//! `--fake-ping` and `--jitter` delay packets in both directions without
//! stalling the frame loop, which makes desync and reconciliation visible on
//! a single machine.
//!
//! ## Module Organization
//!
//! - `config`: client settings and the latency model
//! - `error`: `ClientError`
//! - `input`: per-frame paddle input (autopilot or override)
//! - `network`: the connection tasks and the frame loop
//! - `reconciler`: merging snapshots into the local world, sound cues
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use pong_client::config::ClientConfig;
//! use pong_client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pong_client::error::ClientError> {
//!     let mut client = Client::connect(&ClientConfig::default()).await?;
//!     client.run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod input;
pub mod network;
pub mod reconciler;
