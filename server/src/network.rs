//! Server network layer: TCP accept loop, per-connection workers and the
//! simulation clock
//!
//! Each accepted stream gets two tasks, a reader that applies intents and a
//! writer that drains the session's outbound queue. The simulation clock is a
//! separate task that ticks the world and queues snapshots. None of them ever
//! waits on another's socket; they only meet at the match lock, which is
//! never held across network I/O.

use crate::client_manager::outbound_channel;
use crate::config::ServerConfig;
use crate::game::{GameState, IntentOutcome, SharedGame};
use crate::BoxError;
use log::{debug, error, info, warn};
use pong_shared::{decode, read_frame, write_frame, ClientPacket, ServerPacket, Side};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};

/// Main server owning the listener and the single shared match
pub struct Server {
    listener: TcpListener,
    game: SharedGame,
    config: ServerConfig,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, BoxError> {
        config.validate()?;

        let listener = TcpListener::bind(config.address()).await?;
        info!(
            "Server listening on {} ({}, {}x{}, {}Hz)",
            listener.local_addr()?,
            config.mode,
            config.screen_width,
            config.screen_height,
            config.tick_rate
        );

        let game = GameState::shared(config.field(), config.mode);

        Ok(Server {
            listener,
            game,
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the match state, mainly for inspection
    pub fn game(&self) -> SharedGame {
        Arc::clone(&self.game)
    }

    /// Starts the simulation clock and accepts connections until the task is
    /// dropped
    pub async fn run(self) -> Result<(), BoxError> {
        let clock = tokio::spawn(run_simulation_clock(
            Arc::clone(&self.game),
            self.config.tick_duration(),
        ));

        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Could not disable Nagle for {}: {}", addr, e);
                    }
                    let game = Arc::clone(&self.game);
                    tokio::spawn(handle_connection(
                        stream,
                        addr,
                        game,
                        self.config.idle_timeout,
                    ));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    if clock.is_finished() {
                        return Err("simulation clock stopped".into());
                    }
                    sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Ticks the world at a fixed rate and queues a snapshot to every player
/// after each tick, inside the same critical section.
pub async fn run_simulation_clock(game: SharedGame, tick_duration: Duration) {
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_report = Instant::now();
    let mut last_report_tick = 0;

    loop {
        ticker.tick().await;

        let mut game = game.lock().await;
        game.advance();
        game.broadcast();

        // Periodic performance monitoring
        if game.tick % 60 == 0 && !game.clients.is_empty() {
            let elapsed = last_report.elapsed().as_secs_f32();
            // the counter restarts when an empty match is reset
            let ticks = if game.tick >= last_report_tick {
                game.tick - last_report_tick
            } else {
                game.tick
            };
            last_report = Instant::now();
            last_report_tick = game.tick;
            let idle: Vec<String> = game
                .clients
                .iter()
                .map(|s| format!("{}={}ms", s.side, s.idle_for().as_millis()))
                .collect();
            debug!(
                "Tick {}: {} players, sync {}, {:.1}Hz, idle [{}]",
                game.tick,
                game.clients.len(),
                game.world.sync,
                tick_rate_hz(ticks, elapsed),
                idle.join(", ")
            );
        }
    }
}

/// Observed tick rate over a reporting window
fn tick_rate_hz(ticks: u64, elapsed_secs: f32) -> f32 {
    ticks as f32 / elapsed_secs.max(f32::EPSILON)
}

/// Runs one player's connection from handshake to teardown. A player that
/// sends nothing for `idle_timeout` is dropped like one that hung up.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    game: SharedGame,
    idle_timeout: Duration,
) {
    let (reader, mut writer) = stream.into_split();
    let (outbound, outbound_rx) = outbound_channel();

    let side = {
        let mut game = game.lock().await;
        game.connect(addr, outbound)
    };

    let Some(side) = side else {
        warn!("Rejecting {}: match already has two players", addr);
        let packet = ServerPacket::Rejected {
            reason: "Match full".to_string(),
        };
        if let Err(e) = write_frame(&mut writer, &packet).await {
            debug!("Could not notify rejected client {}: {}", addr, e);
        }
        let _ = writer.shutdown().await;
        return;
    };

    let writer_task = tokio::spawn(run_writer(writer, outbound_rx, addr));

    let reason = read_intents(reader, side, addr, &game, idle_timeout).await;
    info!("Client {} ({}) disconnected: {}", addr, side, reason);

    {
        let mut game = game.lock().await;
        game.disconnect(side);
    }
    writer_task.abort();
}

/// Drains a session's outbound queue onto its socket
async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<ServerPacket>,
    addr: SocketAddr,
) {
    while let Some(packet) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &packet).await {
            if e.is_connection_fault() {
                debug!("Stopping writer for {}: {}", addr, e);
                break;
            }
            warn!("Skipping unencodable packet for {}: {}", addr, e);
        }
    }
    let _ = writer.shutdown().await;
}

/// Applies intents until the stream ends or goes quiet; returns why it
/// ended.
///
/// Undecodable frames are dropped without touching the match.
async fn read_intents(
    mut reader: OwnedReadHalf,
    side: Side,
    addr: SocketAddr,
    game: &SharedGame,
    idle_timeout: Duration,
) -> String {
    loop {
        let payload = match timeout(idle_timeout, read_frame(&mut reader)).await {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => return "orderly close".to_string(),
            Ok(Err(e)) => return e.to_string(),
            Err(_) => return format!("timed out after {}ms idle", idle_timeout.as_millis()),
        };

        match decode::<ClientPacket>(&payload) {
            Ok(ClientPacket::Intent(intent)) => {
                let outcome = {
                    let mut game = game.lock().await;
                    game.apply_intent(side, &intent)
                };
                if outcome == IntentOutcome::StaleReport {
                    debug!("Stale ball report from {}", side);
                }
            }
            Err(e) => {
                warn!("Dropping malformed frame from {} ({}): {}", addr, side, e);
            }
        }
    }
}
