//! Integration tests for the bidding game server and client
//!
//! These tests run a real server on a loopback port and drive it through the
//! client library, plus a full ten-round game against the core directly.

use client::network::Client;
use server::config::{GameConfig, NetworkSettings, ServerConfig};
use server::network::{Server, ShutdownHandle};
use server::session::{GameSession, GameSettings, Player, SessionEvent, SessionPhase};
use shared::{ServerLine, DEFAULT_POOL};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

/// GAME CORE SCENARIOS
mod session_tests {
    use super::*;

    /// Plays the documented ten-round scenario against the session directly
    #[test]
    fn ten_round_game_with_tie_at_top() {
        let roster = vec![
            Player::new(1, "anne"),
            Player::new(2, "mary"),
            Player::new(3, "jack"),
        ];
        let now = Instant::now();
        let mut session = assert_ok!(GameSession::start(roster, GameSettings::default()));
        assert_ok!(session.advance(now));

        // Round 1 pays exactly what was bid
        for (player, amount) in [(1, 40), (2, 30), (3, 30)] {
            assert_ok!(session.submit_bid(player, amount));
        }
        let events = assert_ok!(session.advance(now));
        match &events[0] {
            SessionEvent::RoundClosed(result) => {
                let payouts: Vec<u64> = result.entries.iter().map(|e| e.payout).collect();
                assert_eq!(payouts, vec![40, 30, 30]);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        // Round 2 is an even split with the odd unit going to the first player
        for player in 1..=3 {
            assert_ok!(session.submit_bid(player, 0));
        }
        let events = assert_ok!(session.advance(now));
        match &events[0] {
            SessionEvent::RoundClosed(result) => {
                let payouts: Vec<u64> = result.entries.iter().map(|e| e.payout).collect();
                assert_eq!(payouts, vec![34, 33, 33]);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        // anne 74, mary 63, jack 63; mary and jack then catch up to a tie
        let remaining = [
            [(1, 10), (2, 45), (3, 45)],
            [(1, 50), (2, 25), (3, 25)],
            [(1, 20), (2, 40), (3, 40)],
            [(1, 34), (2, 33), (3, 33)],
            [(1, 30), (2, 35), (3, 35)],
            [(1, 40), (2, 30), (3, 30)],
            [(1, 30), (2, 35), (3, 35)],
            [(1, 32), (2, 34), (3, 34)],
        ];
        let mut last_events = Vec::new();
        for bids in remaining {
            for (player, amount) in bids {
                assert_ok!(session.submit_bid(player, amount));
            }
            last_events = assert_ok!(session.advance(now));
        }

        assert_eq!(session.phase(), SessionPhase::Ended);
        assert_eq!(session.history().len(), 10);
        for round in session.history() {
            assert_eq!(round.total_paid(), 100);
        }

        let totals: Vec<u64> = session.standings().iter().map(|s| s.total).collect();
        assert_eq!(totals.iter().sum::<u64>(), 1000);
        assert!(totals.windows(2).all(|w| w[0] >= w[1]));

        match last_events.last() {
            Some(SessionEvent::GameEnded(outcome)) => {
                assert!(outcome.is_tie());
                assert_eq!(outcome.winners, vec![2, 3]);
                assert_eq!(outcome.top_total(), 340);
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    /// A two player roster is refused; three is enough
    #[test]
    fn roster_threshold() {
        let two = vec![Player::new(1, "anne"), Player::new(2, "mary")];
        assert_err!(GameSession::start(two, GameSettings::default()));

        let three = vec![
            Player::new(1, "anne"),
            Player::new(2, "mary"),
            Player::new(3, "jack"),
        ];
        assert_ok!(GameSession::start(three, GameSettings::default()));
    }
}

/// CLIENT-SERVER INTEGRATION TESTS
mod client_server_tests {
    use super::*;

    /// Plays a short game over TCP through the client library
    #[tokio::test]
    async fn full_game_over_tcp() {
        let (addr, handle, _shutdown) = start_server(2, 30).await;
        let mut players = join_players(addr, &["anne", "mary", "jack"]).await;

        let started = ServerLine::RoundStarted {
            round: 1,
            total_rounds: 2,
            pool: DEFAULT_POOL,
            timeout_secs: 30,
        };
        for player in players.iter_mut() {
            assert_eq!(expect_line(player, "round 1/2").await, started.to_string());
        }

        for (player, amount) in players.iter_mut().zip([40, 30, 30]) {
            assert_ok!(player.send_line(&format!("bid {}", amount)).await);
            let ack = expect_line(player, "ok: bid").await;
            assert_eq!(ack, format!("ok: bid {} recorded for round 1", amount));
        }

        for player in players.iter_mut() {
            expect_line(player, "round 1 results:").await;
            let rows = read_lines(player, 3).await;
            assert_eq!(
                rows,
                vec![
                    "  anne bid 40 payout 40 total 40",
                    "  mary bid 30 payout 30 total 30",
                    "  jack bid 30 payout 30 total 30",
                ]
            );
            expect_line(player, "round 2/2 started").await;
        }

        for player in players.iter_mut() {
            assert_ok!(player.send_line("bid 0").await);
        }

        for player in players.iter_mut() {
            expect_line(player, "round 2 results:").await;
            let rows = read_lines(player, 3).await;
            assert_eq!(rows[0], "  anne bid 0 payout 34 total 74");
            let over = expect_line(player, "game over:").await;
            assert_eq!(over, "game over: winner anne with 74");
            let standings = read_lines(player, 3).await;
            assert_eq!(standings[0], "  1. anne 74");
            assert_eq!(standings[1], "  2. mary 63");
            assert_eq!(standings[2], "  3. jack 63");
        }

        // Bids after the end are refused, then everyone leaves
        assert_ok!(players[0].send_line("bid 5").await);
        assert_eq!(expect_line(&mut players[0], "error:").await, "error: game ended");

        for player in players.iter_mut() {
            assert_ok!(player.send_line("quit").await);
            expect_line(player, "goodbye").await;
        }

        let result = timeout(Duration::from_secs(5), handle)
            .await
            .expect("server should stop once every player has left");
        assert!(result.is_ok());
    }

    /// Protocol and state errors are reported without disturbing the round
    #[tokio::test]
    async fn errors_are_local_to_the_player() {
        let (addr, handle, shutdown) = start_server(1, 30).await;

        let mut early = connect(addr).await;
        assert_ok!(early.send_line("bid 10").await);
        assert_eq!(
            expect_line(&mut early, "error:").await,
            "error: game not started"
        );

        let mut players = join_players(addr, &["anne", "mary", "jack"]).await;
        expect_line(&mut players[0], "round 1/1 started").await;

        let anne = &mut players[0];
        assert_ok!(anne.send_line("bid -1").await);
        assert_eq!(expect_line(anne, "error:").await, "error: invalid amount");
        assert_ok!(anne.send_line("bid lots").await);
        assert_eq!(expect_line(anne, "error:").await, "error: invalid amount");
        assert_ok!(anne.send_line("dance").await);
        assert_eq!(
            expect_line(anne, "error:").await,
            "error: unknown command: dance"
        );
        assert_ok!(anne.send_line("bid 20").await);
        expect_line(anne, "ok: bid 20").await;
        assert_ok!(anne.send_line("bid 90").await);
        assert_eq!(expect_line(anne, "error:").await, "error: already bid");

        // Connected but never joined
        assert_ok!(early.send_line("bid 10").await);
        assert_eq!(
            expect_line(&mut early, "error:").await,
            "error: unknown player"
        );
        assert_ok!(early.send_line("join dave").await);
        assert_eq!(
            expect_line(&mut early, "error:").await,
            "error: game in progress"
        );

        // Status shows who is missing but not anne's amount
        let mary = &mut players[1];
        assert_ok!(mary.send_line("status").await);
        let status = expect_line(mary, "info:").await;
        assert!(status.contains("waiting on: mary, jack"), "{}", status);
        assert!(!status.contains("20"), "{}", status);

        assert_ok!(mary.send_line("help").await);
        expect_line(mary, "commands:").await;

        shutdown.shutdown();
        let result = timeout(Duration::from_secs(5), handle).await;
        assert!(result.is_ok());
    }

    /// A silent player does not stall the round past its deadline
    #[tokio::test]
    async fn deadline_closes_round_with_default_bid() {
        let (addr, handle, shutdown) = start_server(1, 1).await;
        let mut players = join_players(addr, &["anne", "mary", "jack"]).await;

        for player in players.iter_mut().take(2) {
            expect_line(player, "round 1/1 started").await;
            assert_ok!(player.send_line("bid 10").await);
        }

        let started = Instant::now();
        expect_line(&mut players[2], "round 1 results:").await;
        let rows = read_lines(&mut players[2], 3).await;
        assert_eq!(rows[2], "  jack bid 0 (no bid) payout 0 total 0");
        assert_eq!(rows[0], "  anne bid 10 payout 50 total 50");
        assert!(started.elapsed() < Duration::from_secs(4));

        shutdown.shutdown();
        assert!(timeout(Duration::from_secs(5), handle).await.is_ok());
    }

    /// Dropping a connection counts as a zero bid and closes the round at once
    #[tokio::test]
    async fn disconnect_counts_as_zero_bid() {
        let (addr, handle, shutdown) = start_server(2, 30).await;
        let mut players = join_players(addr, &["anne", "mary", "jack"]).await;
        for player in players.iter_mut() {
            expect_line(player, "round 1/2 started").await;
        }

        let jack = players.pop().expect("three players joined");
        drop(jack);

        assert_ok!(players[0].send_line("bid 25").await);
        assert_ok!(players[1].send_line("bid 75").await);

        expect_line(&mut players[0], "player: jack left the game").await;
        expect_line(&mut players[0], "round 1 results:").await;
        let rows = read_lines(&mut players[0], 3).await;
        assert_eq!(rows[0], "  anne bid 25 payout 25 total 25");
        assert_eq!(rows[1], "  mary bid 75 payout 75 total 75");
        assert_eq!(rows[2], "  jack bid 0 (no bid) payout 0 total 0");

        // Jack sits out the second round entirely
        expect_line(&mut players[0], "round 2/2 started").await;
        for player in players.iter_mut() {
            assert_ok!(player.send_line("bid 0").await);
        }
        expect_line(&mut players[0], "round 2 results:").await;
        let rows = read_lines(&mut players[0], 2).await;
        assert_eq!(rows[0], "  anne bid 0 payout 50 total 75");
        assert_eq!(rows[1], "  mary bid 0 payout 50 total 125");
        assert_eq!(
            expect_line(&mut players[0], "game over:").await,
            "game over: winner mary with 125"
        );

        shutdown.shutdown();
        assert!(timeout(Duration::from_secs(5), handle).await.is_ok());
    }

    /// `quit` during an open round counts as a zero bid and the round still closes
    #[tokio::test]
    async fn quit_mid_round_counts_as_zero_bid() {
        let (addr, handle, shutdown) = start_server(1, 30).await;
        let mut players = join_players(addr, &["anne", "mary", "jack"]).await;
        for player in players.iter_mut() {
            expect_line(player, "round 1/1 started").await;
        }

        assert_ok!(players[2].send_line("quit").await);
        expect_line(&mut players[2], "goodbye").await;

        assert_ok!(players[0].send_line("bid 1").await);
        assert_ok!(players[1].send_line("bid 3").await);

        expect_line(&mut players[1], "player: jack left the game").await;
        expect_line(&mut players[1], "round 1 results:").await;
        let rows = read_lines(&mut players[1], 3).await;
        assert_eq!(
            rows,
            vec![
                "  anne bid 1 payout 25 total 25",
                "  mary bid 3 payout 75 total 75",
                "  jack bid 0 (no bid) payout 0 total 0",
            ]
        );
        assert_eq!(
            expect_line(&mut players[1], "game over:").await,
            "game over: winner mary with 75"
        );

        shutdown.shutdown();
        assert!(timeout(Duration::from_secs(5), handle).await.is_ok());
    }

    /// Names must be unique within the lobby
    #[tokio::test]
    async fn duplicate_names_rejected() {
        let (addr, handle, shutdown) = start_server(1, 30).await;
        let mut first = connect(addr).await;
        assert_ok!(first.send_line("join anne").await);
        expect_line(&mut first, "ok: joined as anne (1/3 players)").await;

        let mut second = connect(addr).await;
        assert_ok!(second.send_line("join Anne").await);
        assert_eq!(expect_line(&mut second, "error:").await, "error: name taken");
        assert_ok!(second.send_line("join").await);
        assert_eq!(expect_line(&mut second, "error:").await, "error: missing name");
        assert_ok!(second.send_line("status").await);
        assert_eq!(
            expect_line(&mut second, "info:").await,
            "info: waiting for players, 1/3 joined"
        );

        shutdown.shutdown();
        assert!(timeout(Duration::from_secs(5), handle).await.is_ok());
    }
}

// HELPER FUNCTIONS

async fn start_server(
    rounds: u32,
    bid_timeout_secs: u64,
) -> (SocketAddr, JoinHandle<()>, ShutdownHandle) {
    let config = ServerConfig {
        server: NetworkSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        game: GameConfig {
            rounds,
            bid_timeout_secs,
            ..GameConfig::default()
        },
    };

    let mut server = Server::new(config).await.expect("failed to bind server");
    let addr = server.local_addr().expect("server has an address");
    let shutdown = server.shutdown_handle();

    let handle = tokio::spawn(async move {
        server.run().await.expect("server loop failed");
    });

    (addr, handle, shutdown)
}

async fn connect(addr: SocketAddr) -> Client {
    let mut client = Client::connect(&addr.to_string())
        .await
        .expect("failed to connect");
    expect_line(&mut client, "welcome:").await;
    client
}

/// Connects and joins players one at a time so roster order is predictable
async fn join_players(addr: SocketAddr, names: &[&str]) -> Vec<Client> {
    let mut clients = Vec::new();
    for name in names {
        let mut client = connect(addr).await;
        assert_ok!(client.send_line(&format!("join {}", name)).await);
        expect_line(&mut client, &format!("ok: joined as {}", name)).await;
        clients.push(client);
    }
    clients
}

/// Reads lines until one starts with `prefix`, skipping everything else
async fn expect_line(client: &mut Client, prefix: &str) -> String {
    loop {
        let line = timeout(Duration::from_secs(5), client.next_line())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for `{}`", prefix))
            .expect("failed to read from server")
            .unwrap_or_else(|| panic!("server closed before `{}`", prefix));
        if line.starts_with(prefix) {
            return line;
        }
    }
}

async fn read_lines(client: &mut Client, count: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(count);
    for _ in 0..count {
        let line = timeout(Duration::from_secs(5), client.next_line())
            .await
            .expect("timed out reading rows")
            .expect("failed to read from server")
            .expect("server closed while reading rows");
        lines.push(line);
    }
    lines
}
