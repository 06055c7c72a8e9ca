//! Session bookkeeping for the two players of a match
//!
//! A match has exactly two slots, one per paddle. New connections take the
//! first vacant slot in order (left, then right), so the first connection of
//! a fresh match is always left and a reconnect fills whichever side was
//! vacated. A session's side never changes while its connection lives.

use log::{debug, info};
use pong_shared::{ServerPacket, Side};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Packets buffered per connection before snapshots start being dropped
pub const OUTBOUND_QUEUE: usize = 64;

pub type Outbound = mpsc::Sender<ServerPacket>;

pub fn outbound_channel() -> (Outbound, mpsc::Receiver<ServerPacket>) {
    mpsc::channel(OUTBOUND_QUEUE)
}

/// Server-side record of one connected player
#[derive(Debug)]
pub struct ClientSession {
    pub side: Side,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Last time an intent arrived from this player
    pub last_seen: Instant,
    /// Last paddle position the player sent, if any
    pub last_paddle_y: Option<f32>,
    outbound: Outbound,
}

impl ClientSession {
    pub fn new(side: Side, addr: SocketAddr, outbound: Outbound) -> Self {
        let now = Instant::now();
        Self {
            side,
            addr,
            connected_at: now,
            last_seen: now,
            last_paddle_y: None,
            outbound,
        }
    }

    /// Records an intent's paddle position and refreshes liveness
    pub fn record_intent(&mut self, paddle_y: f32) {
        self.last_seen = Instant::now();
        self.last_paddle_y = Some(paddle_y);
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    /// Queues a packet for this session's writer task. Never blocks: when a
    /// slow reader lets the queue fill up, the packet is dropped, since the
    /// next snapshot supersedes it anyway. Returns false once the writer has
    /// gone away.
    pub fn send(&self, packet: ServerPacket) -> bool {
        match self.outbound.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full for {}, dropping packet", self.side);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Both player slots of the current match
#[derive(Debug, Default)]
pub struct SessionManager {
    slots: [Option<ClientSession>; 2],
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the first vacant side for a new connection.
    ///
    /// Returns `None` when both sides are taken; the caller must close the
    /// connection without touching the existing sessions.
    pub fn add(&mut self, addr: SocketAddr, outbound: Outbound) -> Option<Side> {
        let side = Side::ALL
            .into_iter()
            .find(|side| self.slots[side.index()].is_none())?;

        info!("Player {} joined as {}", addr, side);
        self.slots[side.index()] = Some(ClientSession::new(side, addr, outbound));
        Some(side)
    }

    /// Drops a session, which also closes its outbound queue
    pub fn remove(&mut self, side: Side) -> Option<ClientSession> {
        let session = self.slots[side.index()].take();
        if let Some(session) = &session {
            info!(
                "Player {} ({}) left after {:.1}s",
                session.addr,
                side,
                session.connected_at.elapsed().as_secs_f32()
            );
        }
        session
    }

    pub fn get(&self, side: Side) -> Option<&ClientSession> {
        self.slots[side.index()].as_ref()
    }

    pub fn get_mut(&mut self, side: Side) -> Option<&mut ClientSession> {
        self.slots[side.index()].as_mut()
    }

    pub fn is_connected(&self, side: Side) -> bool {
        self.slots[side.index()].is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientSession> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn channel() -> (Outbound, mpsc::Receiver<ServerPacket>) {
        outbound_channel()
    }

    #[test]
    fn test_sides_assigned_in_slot_order() {
        let mut manager = SessionManager::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();

        assert_eq!(manager.add(test_addr(1), tx_a), Some(Side::Left));
        assert_eq!(manager.add(test_addr(2), tx_b), Some(Side::Right));
        assert!(manager.is_full());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_third_connection_rejected() {
        let mut manager = SessionManager::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let (tx_c, _rx_c) = channel();

        manager.add(test_addr(1), tx_a);
        manager.add(test_addr(2), tx_b);

        assert_eq!(manager.add(test_addr(3), tx_c), None);
        assert_eq!(manager.get(Side::Left).unwrap().addr, test_addr(1));
        assert_eq!(manager.get(Side::Right).unwrap().addr, test_addr(2));
    }

    #[test]
    fn test_reconnect_fills_vacant_side() {
        let mut manager = SessionManager::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let (tx_c, _rx_c) = channel();

        manager.add(test_addr(1), tx_a);
        manager.add(test_addr(2), tx_b);
        assert!(manager.remove(Side::Left).is_some());
        assert!(!manager.is_connected(Side::Left));

        assert_eq!(manager.add(test_addr(3), tx_c), Some(Side::Left));
        assert_eq!(manager.get(Side::Right).unwrap().addr, test_addr(2));
    }

    #[test]
    fn test_remove_missing_session() {
        let mut manager = SessionManager::new();
        assert!(manager.remove(Side::Right).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_send_queues_until_receiver_dropped() {
        let mut manager = SessionManager::new();
        let (tx, mut rx) = channel();
        let side = manager.add(test_addr(1), tx).unwrap();

        let session = manager.get(side).unwrap();
        assert!(session.send(ServerPacket::Rejected {
            reason: "test".to_string()
        }));
        assert!(rx.try_recv().is_ok());

        drop(rx);
        assert!(!manager.get(side).unwrap().send(ServerPacket::Rejected {
            reason: "test".to_string()
        }));
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let session = ClientSession::new(Side::Right, test_addr(1), tx);

        assert!(session.send(ServerPacket::Rejected {
            reason: "first".to_string()
        }));
        assert!(session.send(ServerPacket::Rejected {
            reason: "second".to_string()
        }));

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerPacket::Rejected {
                reason: "first".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_removing_session_closes_queue() {
        let mut manager = SessionManager::new();
        let (tx, mut rx) = channel();
        let side = manager.add(test_addr(1), tx).unwrap();

        manager.remove(side);

        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_record_intent_updates_liveness() {
        let (tx, _rx) = channel();
        let mut session = ClientSession::new(Side::Left, test_addr(1), tx);
        session.last_seen = Instant::now() - Duration::from_secs(2);

        session.record_intent(120.0);

        assert_eq!(session.last_paddle_y, Some(120.0));
        assert!(session.idle_for() < Duration::from_secs(1));
    }
}
