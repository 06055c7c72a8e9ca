//! Client network layer
//!
//! A `Connection` owns the TCP stream through two background tasks, so the
//! frame loop never waits on the network: sends are queued, and received
//! snapshots are collected in a channel and drained without blocking.
//! Simulated latency is applied by stamping every packet with a delivery
//! time rather than sleeping inline, which keeps throughput intact.

use crate::config::{ClientConfig, Latency};
use crate::error::ClientError;
use crate::input::InputManager;
use crate::reconciler::{Cue, Reconciler};
use log::{debug, info, warn};
use pong_shared::{
    decode, read_frame, write_frame, AuthorityMode, ClientPacket, Field, Intent, ServerPacket,
    Side, Snapshot,
};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, timeout, timeout_at, Instant, MissedTickBehavior};

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for an opponent
pub const RECV_POLL: Duration = Duration::from_millis(10);

const CHANNEL_CAPACITY: usize = 64;

/// A value held back until its simulated arrival time
#[derive(Debug)]
struct Delayed<T> {
    deliver_at: Instant,
    value: T,
}

impl<T> Delayed<T> {
    fn new(value: T, latency: &Latency) -> Self {
        Self {
            deliver_at: Instant::now() + latency.sample(),
            value,
        }
    }
}

/// An established, handshaken connection to the server
pub struct Connection {
    side: Side,
    mode: AuthorityMode,
    field: Field,
    latency: Latency,
    outbound: mpsc::Sender<Delayed<ClientPacket>>,
    inbound: mpsc::Receiver<Delayed<Snapshot>>,
    pending: VecDeque<Delayed<Snapshot>>,
    closed: bool,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Connection {
    /// Connects and waits for the handshake. A full match surfaces as
    /// `ClientError::Rejected`.
    pub async fn connect(addr: &str, latency: Latency) -> Result<Self, ClientError> {
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (mut reader, writer) = stream.into_split();

        let payload = timeout(HANDSHAKE_TIMEOUT, read_frame(&mut reader))
            .await
            .map_err(|_| ClientError::Handshake("timed out waiting for server".to_string()))??
            .ok_or(ClientError::Closed)?;

        let (field, side, mode) = match decode::<ServerPacket>(&payload)? {
            ServerPacket::Handshake {
                screen_width,
                screen_height,
                side,
                mode,
            } => (Field::new(screen_width, screen_height), side, mode),
            ServerPacket::Rejected { reason } => return Err(ClientError::Rejected(reason)),
            ServerPacket::Snapshot(_) => {
                return Err(ClientError::Handshake(
                    "snapshot arrived before handshake".to_string(),
                ))
            }
        };

        info!(
            "Joined as {} player ({}, {}x{})",
            side, mode, field.width, field.height
        );

        let (outbound, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (inbound_tx, inbound) = mpsc::channel(CHANNEL_CAPACITY);

        let reader_task = tokio::spawn(run_reader(reader, inbound_tx, latency));
        let writer_task = tokio::spawn(run_writer(writer, outbound_rx));

        Ok(Self {
            side,
            mode,
            field,
            latency,
            outbound,
            inbound,
            pending: VecDeque::new(),
            closed: false,
            reader_task,
            writer_task,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn mode(&self) -> AuthorityMode {
        self.mode
    }

    pub fn field(&self) -> Field {
        self.field
    }

    /// Queues an intent without waiting. Dropped if the writer is backed up.
    pub fn send_intent(&self, intent: Intent) -> Result<(), ClientError> {
        let packet = Delayed::new(ClientPacket::Intent(intent), &self.latency);
        match self.outbound.try_send(packet) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full, dropping intent");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ClientError::Closed),
        }
    }

    /// Next snapshot that has "arrived", if any. `Err(Closed)` once the
    /// stream has ended and everything received has been handed out.
    pub fn try_snapshot(&mut self) -> Result<Option<Snapshot>, ClientError> {
        self.collect_inbound();

        if let Some(front) = self.pending.front() {
            if front.deliver_at <= Instant::now() {
                return Ok(self.pending.pop_front().map(|d| d.value));
            }
            return Ok(None);
        }

        if self.closed {
            Err(ClientError::Closed)
        } else {
            Ok(None)
        }
    }

    /// Waits up to `wait` for a snapshot. Timing out is not an error.
    pub async fn recv_snapshot_timeout(
        &mut self,
        wait: Duration,
    ) -> Result<Option<Snapshot>, ClientError> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(snapshot) = self.try_snapshot()? {
                return Ok(Some(snapshot));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.pending.front() {
                Some(front) => sleep_until(front.deliver_at.min(deadline)).await,
                None => match timeout_at(deadline, self.inbound.recv()).await {
                    Ok(Some(delayed)) => self.pending.push_back(delayed),
                    Ok(None) => self.closed = true,
                    Err(_) => return Ok(None),
                },
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_empty()
    }

    fn collect_inbound(&mut self) {
        loop {
            match self.inbound.try_recv() {
                Ok(delayed) => self.pending.push_back(delayed),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

/// Reads server frames and forwards snapshots stamped with their simulated
/// arrival time
async fn run_reader(
    mut reader: OwnedReadHalf,
    inbound: mpsc::Sender<Delayed<Snapshot>>,
    latency: Latency,
) {
    loop {
        let payload = match read_frame(&mut reader).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!("Connection to server lost: {}", e);
                break;
            }
        };

        match decode::<ServerPacket>(&payload) {
            Ok(ServerPacket::Snapshot(snapshot)) => {
                if inbound.send(Delayed::new(snapshot, &latency)).await.is_err() {
                    break;
                }
            }
            Ok(other) => warn!("Ignoring unexpected packet: {:?}", other),
            Err(e) => warn!("Dropping malformed frame from server: {}", e),
        }
    }
}

/// Writes queued packets once their simulated send time has passed
async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Delayed<ClientPacket>>,
) {
    while let Some(delayed) = outbound.recv().await {
        sleep_until(delayed.deliver_at).await;
        if let Err(e) = write_frame(&mut writer, &delayed.value).await {
            if e.is_connection_fault() {
                debug!("Stopping writer: {}", e);
                break;
            }
            warn!("Skipping unencodable packet: {}", e);
        }
    }
    let _ = writer.shutdown().await;
}

/// Headless game client: input, reconciliation and the frame loop
pub struct Client {
    connection: Connection,
    reconciler: Reconciler,
    input: InputManager,
    frame_duration: Duration,
    frames: u64,
}

impl Client {
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        if !config.latency.is_zero() {
            info!(
                "Simulating {}ms ping with up to {}ms jitter",
                config.latency.fake_ping.as_millis(),
                config.latency.jitter.as_millis()
            );
        }

        let connection = Connection::connect(&config.server, config.latency).await?;
        let reconciler = Reconciler::new(connection.field(), connection.side(), connection.mode());

        Ok(Self {
            connection,
            reconciler,
            input: InputManager::new(),
            frame_duration: config.frame_duration(),
            frames: 0,
        })
    }

    pub fn side(&self) -> Side {
        self.connection.side()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn input_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// One frame: sample input, move locally, step the ball if authoritative,
    /// send the intent and merge whatever snapshots have arrived.
    /// Never blocks.
    pub fn frame(&mut self) -> Result<Vec<Cue>, ClientError> {
        let moving = self.input.update(&self.reconciler.render_state());
        self.reconciler.apply_local_move(moving);

        let mut cues = self.reconciler.step_authority();
        self.connection
            .send_intent(self.reconciler.outgoing_intent())?;

        while let Some(snapshot) = self.connection.try_snapshot()? {
            cues.extend(self.reconciler.apply_snapshot(snapshot));
        }

        self.frames += 1;
        Ok(cues)
    }

    /// Blocks (with a short poll) until a snapshot reports the other seat
    /// filled
    pub async fn wait_for_opponent(&mut self) -> Result<(), ClientError> {
        let mut last_notice = Instant::now();
        while !self.reconciler.opponent_connected() {
            // keeps the seat alive while nobody else is there
            self.connection
                .send_intent(self.reconciler.outgoing_intent())?;
            if let Some(snapshot) = self.connection.recv_snapshot_timeout(RECV_POLL).await? {
                self.reconciler.apply_snapshot(snapshot);
            }
            if last_notice.elapsed() >= Duration::from_secs(5) {
                info!("Still waiting for an opponent...");
                last_notice = Instant::now();
            }
        }
        Ok(())
    }

    /// Runs the frame loop until someone wins or the server goes away
    pub async fn run(&mut self) -> Result<(), ClientError> {
        info!("Waiting for an opponent...");
        match self.wait_for_opponent().await {
            Ok(()) => info!("Opponent connected, game on"),
            Err(ClientError::Closed) => return Ok(()),
            Err(e) => return Err(e),
        }

        let mut ticker = interval(self.frame_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut opponent_was_connected = true;

        loop {
            ticker.tick().await;

            let cues = match self.frame() {
                Ok(cues) => cues,
                Err(ClientError::Closed) => {
                    info!("Disconnected from server");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            for cue in cues {
                match cue {
                    Cue::Bounce => debug!("*bounce*"),
                    Cue::Score(scorer) => info!("Point for {}", scorer),
                }
            }

            let state = self.reconciler.render_state();
            if state.opponent_connected != opponent_was_connected {
                if state.opponent_connected {
                    info!("Opponent is back");
                } else {
                    info!("Opponent disconnected, game paused");
                }
                opponent_was_connected = state.opponent_connected;
            }

            if self.frames % 60 == 0 {
                debug!("Frame {}: {}", self.frames, state);
            }

            if let Some(winner) = state.winner {
                info!(
                    "{} player wins {} - {}{}",
                    winner,
                    state.left_score,
                    state.right_score,
                    if winner == self.side() { " (you)" } else { "" }
                );
                return Ok(());
            }
        }
    }
}
