//! Integration tests for the server and client working over real sockets
//!
//! Every test starts its own server on an ephemeral loopback port.

use pong_client::config::{ClientConfig, Latency};
use pong_client::error::ClientError;
use pong_client::network::{Client, Connection};
use pong_server::config::ServerConfig;
use pong_server::game::SharedGame;
use pong_server::network::Server;
use pong_shared::{AuthorityMode, BallReport, Intent, Moving, Side, Snapshot};
use std::time::Duration;
use tokio::time::{sleep, Instant};

async fn start_server(mode: AuthorityMode, tick_rate: u32) -> (String, SharedGame) {
    let config = ServerConfig {
        port: 0,
        mode,
        tick_rate,
        ..ServerConfig::default()
    };
    let server = Server::new(config).await.expect("server should bind");
    let addr = server.local_addr().unwrap().to_string();
    let game = server.game();
    tokio::spawn(server.run());
    (addr, game)
}

async fn join(addr: &str) -> Connection {
    Connection::connect(addr, Latency::default())
        .await
        .expect("connection should be accepted")
}

/// Receives snapshots until one satisfies `condition`
async fn snapshot_where(
    connection: &mut Connection,
    condition: impl Fn(&Snapshot) -> bool,
) -> Snapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Some(snapshot) = connection
            .recv_snapshot_timeout(Duration::from_millis(100))
            .await
            .expect("connection should stay open")
        {
            if condition(&snapshot) {
                return snapshot;
            }
        }
    }
    panic!("no matching snapshot within 10s");
}

fn idle_intent(paddle_y: f32) -> Intent {
    Intent {
        paddle_y,
        moving: Moving::None,
        report: None,
    }
}

/// SESSION LIFECYCLE TESTS
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn handshake_assigns_sides_and_mode() {
        let (addr, _game) = start_server(AuthorityMode::ServerAuthoritative, 60).await;

        let a = join(&addr).await;
        let b = join(&addr).await;

        assert_eq!(a.side(), Side::Left);
        assert_eq!(b.side(), Side::Right);
        assert_eq!(a.mode(), AuthorityMode::ServerAuthoritative);
        assert_eq!(a.field().width, 640.0);
        assert_eq!(b.field().height, 480.0);
    }

    #[tokio::test]
    async fn third_client_rejected_without_disturbing_match() {
        let (addr, game) = start_server(AuthorityMode::ServerAuthoritative, 60).await;
        let mut a = join(&addr).await;
        let _b = join(&addr).await;

        let third = Connection::connect(&addr, Latency::default()).await;
        assert!(matches!(third, Err(ClientError::Rejected(_))));

        let snapshot = snapshot_where(&mut a, |s| s.opponent_connected).await;
        assert!(snapshot.winner.is_none());
        assert_eq!(game.lock().await.clients.len(), 2);
    }

    #[tokio::test]
    async fn lone_player_sees_frozen_world() {
        let (addr, _game) = start_server(AuthorityMode::ServerAuthoritative, 120).await;
        let mut a = join(&addr).await;

        let first = snapshot_where(&mut a, |_| true).await;
        sleep(Duration::from_millis(100)).await;
        let later = snapshot_where(&mut a, |_| true).await;

        assert!(!first.opponent_connected);
        assert_eq!(first.sync, 0);
        assert_eq!(later.sync, 0);
        assert_eq!(later.ball_x, first.ball_x);
    }

    #[tokio::test]
    async fn disconnect_pauses_then_last_leave_resets() {
        let (addr, game) = start_server(AuthorityMode::ServerAuthoritative, 120).await;
        let a = join(&addr).await;
        let mut b = join(&addr).await;

        let moving = snapshot_where(&mut b, |s| s.sync > 5).await;
        assert!(moving.opponent_connected);

        drop(a);
        let paused = snapshot_where(&mut b, |s| !s.opponent_connected).await;
        sleep(Duration::from_millis(100)).await;
        let still = snapshot_where(&mut b, |_| true).await;
        assert_eq!(paused.sync, still.sync);
        assert_eq!(paused.ball_x, still.ball_x);

        drop(b);
        for _ in 0..100 {
            if game.lock().await.clients.is_empty() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        let mut c = join(&addr).await;
        assert_eq!(c.side(), Side::Left);
        let fresh = snapshot_where(&mut c, |_| true).await;
        assert_eq!(fresh.sync, 0);
        assert_eq!((fresh.left_score, fresh.right_score), (0, 0));
        assert_eq!(fresh.ball_x, 320.0);
    }
}

/// SERVER-AUTHORITATIVE GAMEPLAY TESTS
mod server_authority_tests {
    use super::*;

    #[tokio::test]
    async fn intent_reaches_opponent() {
        let (addr, _game) = start_server(AuthorityMode::ServerAuthoritative, 120).await;
        let a = join(&addr).await;
        let mut b = join(&addr).await;

        a.send_intent(idle_intent(100.0)).unwrap();

        let snapshot = snapshot_where(&mut b, |s| s.opponent_paddle_y == 100.0).await;
        assert_eq!(snapshot.own_paddle_y, 215.0);
    }

    #[tokio::test]
    async fn out_of_range_paddle_clamped() {
        let (addr, _game) = start_server(AuthorityMode::ServerAuthoritative, 120).await;
        let a = join(&addr).await;
        let mut b = join(&addr).await;

        a.send_intent(idle_intent(-500.0)).unwrap();

        snapshot_where(&mut b, |s| s.opponent_paddle_y == 10.0).await;
    }

    #[tokio::test]
    async fn idle_match_plays_to_a_winner() {
        let (addr, _game) = start_server(AuthorityMode::ServerAuthoritative, 600).await;
        let mut a = join(&addr).await;
        let mut b = join(&addr).await;

        let mut last_sync = 0;
        let mut last_score = (0, 0);
        let deadline = Instant::now() + Duration::from_secs(15);
        let end = loop {
            assert!(Instant::now() < deadline, "match did not finish");
            let Some(snapshot) = a
                .recv_snapshot_timeout(Duration::from_millis(100))
                .await
                .unwrap()
            else {
                continue;
            };
            assert!(snapshot.sync >= last_sync);
            assert!(snapshot.left_score >= last_score.0);
            assert!(snapshot.right_score >= last_score.1);
            last_sync = snapshot.sync;
            last_score = (snapshot.left_score, snapshot.right_score);
            if snapshot.winner.is_some() {
                break snapshot;
            }
        };

        assert_eq!(end.winner, Some(Side::Left));
        assert_eq!((end.left_score, end.right_score), (5, 0));

        let other = snapshot_where(&mut b, |s| s.winner.is_some()).await;
        assert_eq!(other.winner, Some(Side::Left));
        assert_eq!(other.sync, end.sync);
    }

    #[tokio::test]
    async fn client_frame_loop_tracks_server() {
        let (addr, _game) = start_server(AuthorityMode::ServerAuthoritative, 120).await;
        let config = ClientConfig {
            server: addr,
            ..ClientConfig::default()
        };
        let mut left = Client::connect(&config).await.unwrap();
        let mut right = Client::connect(&config).await.unwrap();
        left.input_mut().set_override(Some(Moving::Up));
        right.input_mut().set_override(Some(Moving::None));

        left.wait_for_opponent().await.unwrap();
        for _ in 0..120 {
            left.frame().unwrap();
            right.frame().unwrap();
            sleep(Duration::from_millis(5)).await;
        }

        let left_view = left.reconciler().render_state();
        let right_view = right.reconciler().render_state();
        assert_eq!(left_view.own_paddle_y, 10.0);
        assert_eq!(right_view.opponent_paddle_y, 10.0);
        assert!(right.reconciler().latest().unwrap().sync > 0);
        assert!(left.frames() >= 120);
    }
}

/// CLIENT-AUTHORITATIVE GAMEPLAY TESTS
mod client_authority_tests {
    use super::*;

    fn report(ball_x: f32, left_score: u32, sync: u64) -> BallReport {
        BallReport {
            ball_x,
            ball_y: 240.0,
            ball_x_vel: -5.0,
            ball_y_vel: 0.0,
            left_score,
            right_score: 0,
            sync,
        }
    }

    fn reporting_intent(report: BallReport) -> Intent {
        Intent {
            paddle_y: 215.0,
            moving: Moving::None,
            report: Some(report),
        }
    }

    #[tokio::test]
    async fn newer_report_relayed_and_older_ignored() {
        let (addr, _game) = start_server(AuthorityMode::ClientAuthoritative, 120).await;
        let a = join(&addr).await;
        let mut b = join(&addr).await;
        assert_eq!(b.mode(), AuthorityMode::ClientAuthoritative);

        a.send_intent(reporting_intent(report(100.0, 1, 5))).unwrap();
        let relayed = snapshot_where(&mut b, |s| s.sync == 5).await;
        assert_eq!(relayed.ball_x, 100.0);
        assert_eq!(relayed.left_score, 1);

        a.send_intent(reporting_intent(report(50.0, 1, 3))).unwrap();
        sleep(Duration::from_millis(100)).await;
        let after = snapshot_where(&mut b, |_| true).await;
        assert_eq!(after.sync, 5);
        assert_eq!(after.ball_x, 100.0);
    }

    #[tokio::test]
    async fn report_lowering_score_rejected() {
        let (addr, _game) = start_server(AuthorityMode::ClientAuthoritative, 120).await;
        let a = join(&addr).await;
        let mut b = join(&addr).await;

        a.send_intent(reporting_intent(report(100.0, 2, 5))).unwrap();
        snapshot_where(&mut b, |s| s.sync == 5).await;

        a.send_intent(reporting_intent(report(100.0, 1, 9))).unwrap();
        sleep(Duration::from_millis(100)).await;
        let after = snapshot_where(&mut b, |_| true).await;
        assert_eq!(after.sync, 5);
        assert_eq!(after.left_score, 2);
    }

    #[tokio::test]
    async fn authority_client_drives_match_to_end() {
        let (addr, _game) = start_server(AuthorityMode::ClientAuthoritative, 600).await;
        let config = ClientConfig {
            server: addr,
            ..ClientConfig::default()
        };
        let mut left = Client::connect(&config).await.unwrap();
        let mut right = Client::connect(&config).await.unwrap();
        assert!(left.reconciler().is_ball_authority());
        assert!(!right.reconciler().is_ball_authority());

        left.input_mut().set_override(Some(Moving::None));
        right.input_mut().set_override(Some(Moving::None));
        left.wait_for_opponent().await.unwrap();
        right.wait_for_opponent().await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(20);
        while right.reconciler().render_state().winner.is_none() {
            assert!(Instant::now() < deadline, "match did not finish");
            left.frame().unwrap();
            right.frame().unwrap();
            sleep(Duration::from_millis(1)).await;
        }

        let left_view = left.reconciler().render_state();
        let right_view = right.reconciler().render_state();
        assert_eq!(left_view.winner, Some(Side::Left));
        assert_eq!(right_view.winner, Some(Side::Left));
        assert_eq!(
            (right_view.left_score, right_view.right_score),
            (left_view.left_score, left_view.right_score)
        );
    }

    #[tokio::test]
    async fn latency_does_not_break_relay() {
        let (addr, _game) = start_server(AuthorityMode::ClientAuthoritative, 120).await;
        let a = Connection::connect(&addr, Latency::new(60, 20)).await.unwrap();
        let mut b = Connection::connect(&addr, Latency::new(60, 20)).await.unwrap();

        for sync in 1..=10 {
            a.send_intent(reporting_intent(report(300.0 - sync as f32, 0, sync)))
                .unwrap();
        }

        let last = snapshot_where(&mut b, |s| s.sync == 10).await;
        assert_eq!(last.ball_x, 290.0);
    }
}
