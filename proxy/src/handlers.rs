//! Background tasks of a logged-in session.
//!
//! Three tasks run per session until it closes:
//! - the incoming pump, forwarding server packets to the player,
//! - the outgoing pump, forwarding player packets to the server,
//! - the latency probe, periodically timestamping both links.
//!
//! The pumps always look the current server up again after an error. An
//! error from a connection that a transfer has already replaced is expected
//! and only means the pump should move on to the new one.

use crate::conn::BackendConnection;
use crate::error::ConnError;
use crate::session::Session;
use crate::utils::{get_timestamp, millis_since};
use log::{debug, info, warn};
use shared::Packet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

pub(crate) fn spawn(session: &Arc<Session>) {
    let period = session.options().latency_interval();

    tokio::spawn(handle_incoming(Arc::clone(session)));
    tokio::spawn(handle_outgoing(Arc::clone(session)));
    tokio::spawn(handle_latency(Arc::clone(session), period));
}

async fn handle_incoming(session: Arc<Session>) {
    let mut shutdown = session.subscribe_shutdown();

    loop {
        if session.is_closed() {
            break;
        }
        let Some(server) = session.server().await else {
            break;
        };

        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = server.read_packet() => result,
        };

        match result {
            Ok(packet) => {
                if let Err(e) = handle_server_packet(&session, &server, packet).await {
                    if !session.is_closed() {
                        debug!(
                            "Failed to forward to {}: {}",
                            session.identity().display_name,
                            e
                        );
                        let _ = session.close().await;
                    }
                    break;
                }
            }
            Err(e) => {
                if session.is_closed() {
                    break;
                }
                if !session.is_current(&server).await {
                    continue;
                }
                info!(
                    "Lost server connection of {}: {}",
                    session.identity().display_name,
                    e
                );
                session.disconnect(&e.to_string()).await;
                break;
            }
        }
    }
}

/// Handles one packet from the current server. Errors are client write
/// failures.
async fn handle_server_packet(
    session: &Arc<Session>,
    server: &Arc<dyn BackendConnection>,
    mut packet: Packet,
) -> Result<(), ConnError> {
    // Waits out a running transfer. Packets from a replaced server belong to
    // a world the client no longer sees.
    if !session.is_current(server).await {
        debug!(
            "Dropped {} from a replaced server of {}",
            packet.name(),
            session.identity().display_name
        );
        return Ok(());
    }

    match packet {
        Packet::Latency {
            timestamp,
            response: true,
        } => {
            session.set_latency_offset(millis_since(timestamp));
            return Ok(());
        }
        Packet::Latency {
            timestamp,
            response: false,
        } => {
            let _ = server
                .write_packet(Packet::Latency {
                    timestamp,
                    response: true,
                })
                .await;
            return Ok(());
        }
        Packet::Transfer { address } => {
            let session = Arc::clone(session);
            tokio::spawn(async move {
                if let Err(e) = session.transfer(&address).await {
                    warn!(
                        "Transfer of {} to {} failed: {}",
                        session.identity().display_name,
                        address,
                        e
                    );
                }
            });
            return Ok(());
        }
        _ => {}
    }

    if let Some(processor) = session.processor() {
        if !processor.process_server(&mut packet) {
            return Ok(());
        }
    }

    session.tracker().observe(&packet);
    session.client().write_packet(packet).await
}

async fn handle_outgoing(session: Arc<Session>) {
    let mut shutdown = session.subscribe_shutdown();

    loop {
        if session.is_closed() {
            break;
        }

        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = session.client().read_packet() => result,
        };

        let mut packet = match result {
            Ok(packet) => packet,
            Err(e) => {
                if !session.is_closed() {
                    debug!(
                        "Client connection of {} ended: {}",
                        session.identity().display_name,
                        e
                    );
                    let _ = session.close().await;
                }
                break;
            }
        };

        if let Some(processor) = session.processor() {
            if !processor.process_client(&mut packet) {
                continue;
            }
        }

        let Some(server) = session.server().await else {
            break;
        };
        if let Err(e) = server.write_packet(packet).await {
            if session.is_closed() {
                break;
            }
            if !session.is_current(&server).await {
                continue;
            }
            info!(
                "Lost server connection of {}: {}",
                session.identity().display_name,
                e
            );
            session.disconnect(&e.to_string()).await;
            break;
        }
    }
}

async fn handle_latency(session: Arc<Session>, period: Duration) {
    let mut shutdown = session.subscribe_shutdown();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        if session.is_closed() {
            break;
        }

        let timestamp = get_timestamp();
        let probe = Packet::Latency {
            timestamp,
            response: false,
        };

        let Some(server) = session.server().await else {
            break;
        };
        if let Err(e) = server.write_packet(probe.clone()).await {
            if session.is_closed() {
                break;
            }
            if !session.is_current(&server).await {
                continue;
            }
            debug!(
                "Latency probe to server of {} failed: {}",
                session.identity().display_name,
                e
            );
            session.disconnect(&e.to_string()).await;
            break;
        }

        if let Err(e) = session.client().write_packet(probe).await {
            if !session.is_closed() {
                debug!(
                    "Latency probe to {} failed: {}",
                    session.identity().display_name,
                    e
                );
                let _ = session.close().await;
            }
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::animation::Animation;
    use crate::conn::ClientConnection;
    use crate::mock::{game_data, logged_in, logged_in_with, MockBackend, RecordingProcessor};
    use crate::options::Options;
    use async_trait::async_trait;
    use shared::{BossEventType, GameData, Packet, Vec3};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    /// Polls `condition` until it holds or a second passes.
    async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
        timeout(Duration::from_secs(1), async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    fn text(message: &str) -> Packet {
        Packet::Text {
            source: "server".to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_incoming_forwards_and_tracks() {
        let (fixture, backend) = logged_in().await;

        backend.send(Packet::BossEvent {
            boss_id: 4,
            event: BossEventType::Show,
            title: "Dragon".to_string(),
        });
        backend.send(text("welcome"));

        let client = Arc::clone(&fixture.client);
        assert!(eventually(|| client.written().contains(&text("welcome"))).await);
        assert_eq!(fixture.session.tracker().counts().boss_bars, 1);
    }

    #[tokio::test]
    async fn test_outgoing_forwards_to_server() {
        let (fixture, backend) = logged_in().await;

        fixture.client.send(text("hi"));

        let backend_ref = Arc::clone(&backend);
        assert!(eventually(|| backend_ref.written().contains(&text("hi"))).await);
    }

    #[tokio::test]
    async fn test_processor_can_drop_packets() {
        let (fixture, backend) = logged_in().await;
        fixture
            .session
            .set_processor(Some(Arc::new(RecordingProcessor::dropping_packets())));

        fixture.client.send(text("hidden"));
        backend.send(text("secret"));
        backend.send(Packet::Latency {
            timestamp: 0,
            response: false,
        });

        // The latency echo is answered by the proxy itself, after the text.
        let backend_ref = Arc::clone(&backend);
        assert!(
            eventually(|| backend_ref
                .written()
                .iter()
                .any(|p| matches!(p, Packet::Latency { response: true, .. })))
            .await
        );
        assert!(!backend.written().contains(&text("hidden")));
        assert!(!fixture.client.written().contains(&text("secret")));
    }

    #[tokio::test]
    async fn test_latency_response_sets_offset() {
        let (fixture, backend) = logged_in().await;
        fixture.client.set_latency(Duration::from_millis(20));

        backend.send(Packet::Latency {
            timestamp: crate::utils::get_timestamp() - 30,
            response: true,
        });

        let session = Arc::clone(&fixture.session);
        assert!(eventually(|| session.latency() >= 50).await);
        assert!(fixture.session.latency() < 1_000);
    }

    #[tokio::test]
    async fn test_server_transfer_packet_moves_session() {
        let (fixture, backend) = logged_in().await;
        let next = Arc::new(MockBackend::new(game_data(
            "b",
            7,
            Vec3::new(100.0, 70.0, -40.0),
        )));
        fixture.transport.insert("b:19132", Arc::clone(&next));

        backend.send(Packet::Transfer {
            address: "b:19132".to_string(),
        });

        let transport = Arc::clone(&fixture.transport);
        assert!(eventually(|| transport.dials().contains(&"b:19132".to_string())).await);
        let session = Arc::clone(&fixture.session);
        let moved = timeout(Duration::from_secs(1), async {
            while session.server_addr().await.as_deref() != Some("b:19132") {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(moved.is_ok());
        assert_eq!(backend.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_pumps_survive_replaced_backend() {
        let (fixture, old) = logged_in().await;
        let next = Arc::new(MockBackend::new(game_data("b", 7, Vec3::default())));
        fixture.transport.insert("b:19132", Arc::clone(&next));

        fixture.session.transfer("b:19132").await.unwrap();
        assert_eq!(old.close_calls(), 1);

        next.send(text("from b"));
        fixture.client.send(text("to b"));

        let client = Arc::clone(&fixture.client);
        assert!(eventually(|| client.written().contains(&text("from b"))).await);
        let next_ref = Arc::clone(&next);
        assert!(eventually(|| next_ref.written().contains(&text("to b"))).await);
        assert!(!fixture.session.is_closed());
    }

    /// Lets the old server emit world state in the middle of a transfer.
    struct LateSpawnAnimation {
        old: Arc<MockBackend>,
    }

    #[async_trait]
    impl Animation for LateSpawnAnimation {
        async fn play(&self, _client: &dyn ClientConnection, _data: &GameData) {}

        async fn clear(&self, _client: &dyn ClientConnection, _data: &GameData) {
            self.old.send(Packet::AddActor {
                unique_id: 77,
                runtime_id: 77,
                entity_type: "minecraft:zombie".to_string(),
                position: Vec3::default(),
            });
            sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn test_replaced_server_packets_are_dropped() {
        let (fixture, old) = logged_in().await;
        let next = Arc::new(MockBackend::new(game_data("b", 7, Vec3::default())));
        fixture.transport.insert("b:19132", Arc::clone(&next));
        fixture.session.set_animation(Arc::new(LateSpawnAnimation {
            old: Arc::clone(&old),
        }));

        fixture.session.transfer("b:19132").await.unwrap();
        sleep(Duration::from_millis(20)).await;

        assert!(fixture.session.tracker().is_empty());
        assert!(!fixture
            .client
            .written()
            .iter()
            .any(|p| matches!(p, Packet::AddActor { unique_id: 77, .. })));

        // The pump moved on to the new server.
        next.send(text("from b"));
        let client = Arc::clone(&fixture.client);
        assert!(eventually(|| client.written().contains(&text("from b"))).await);
    }

    #[tokio::test]
    async fn test_lost_server_disconnects_player() {
        let (fixture, backend) = logged_in().await;

        backend.hang_up();

        let session = Arc::clone(&fixture.session);
        assert!(eventually(|| session.is_closed()).await);
        assert!(fixture
            .client
            .written()
            .iter()
            .any(|p| matches!(p, Packet::Disconnect { .. })));
        assert!(fixture.registry.is_empty());
    }

    #[tokio::test]
    async fn test_lost_client_closes_session() {
        let (fixture, backend) = logged_in().await;

        fixture.client.hang_up();

        let session = Arc::clone(&fixture.session);
        assert!(eventually(|| session.is_closed()).await);
        assert_eq!(backend.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_latency_probe_reaches_both_sides() {
        let (fixture, backend) = logged_in_with(Options {
            latency_interval_ms: 10,
            ..Options::default()
        })
        .await;

        let is_probe = |p: &Packet| matches!(p, Packet::Latency { response: false, .. });
        let backend_ref = Arc::clone(&backend);
        assert!(eventually(|| backend_ref.written().iter().any(is_probe)).await);
        let client = Arc::clone(&fixture.client);
        assert!(eventually(|| client.written().iter().any(is_probe)).await);
    }
}
