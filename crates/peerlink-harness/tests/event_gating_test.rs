//! Scenario tests for event publication and gating.
//!
//! Data events (chunks, throughput, connection changes) are only
//! published while sharing is running; `Ready` is published in every
//! lifecycle state. Connection changes carry a classified peer address.

use peerlink_engine::{ConnectionDelta, EngineEvent, EventKind, PeerAddr};
use peerlink_harness::Scenario;

#[tokio::test(start_paused = true)]
async fn data_events_require_running() {
    Scenario::new("data-events-gated")
        .engine_ready_behavior(true, false)
        .initialize()
        .emit_chunk(2048, 0)
        .start()
        .emit_chunk(4096, 1)
        .emit_throughput(125_000)
        .stop()
        .emit_chunk(512, 1)
        .emit_throughput(0)
        .emit_ready()
        .oracle(Box::new(|world| {
            let chunks = world.events_of(EventKind::DownstreamChunk);
            if chunks != vec![EngineEvent::DownstreamChunk { size: 4096, slot: 1 }] {
                return Err(format!("unexpected chunk events: {chunks:?}"));
            }
            let throughput = world.events_of(EventKind::DownstreamThroughput);
            if throughput != vec![EngineEvent::DownstreamThroughput { bytes_per_sec: 125_000 }] {
                return Err(format!("unexpected throughput events: {throughput:?}"));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn connection_changes_carry_classified_addresses() {
    Scenario::new("connection-classification")
        .initialize()
        .start()
        .emit_connection(1, 0, "198.51.100.7:443")
        .emit_connection(1, 1, "")
        .emit_connection(-1, 0, "<nil>")
        .oracle(Box::new(|world| {
            let changes = world.events_of(EventKind::ConsumerConnectionChange);
            let expected = vec![
                EngineEvent::ConsumerConnectionChange {
                    delta: ConnectionDelta::Connected,
                    slot: 0,
                    addr: PeerAddr::Known("198.51.100.7:443".to_string()),
                },
                EngineEvent::ConsumerConnectionChange {
                    delta: ConnectionDelta::Connected,
                    slot: 1,
                    addr: PeerAddr::Unknown,
                },
                EngineEvent::ConsumerConnectionChange {
                    delta: ConnectionDelta::Disconnected,
                    slot: 0,
                    addr: PeerAddr::NotApplicable,
                },
            ];
            if changes != expected {
                return Err(format!("unexpected connection events: {changes:?}"));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn invalid_connection_state_is_dropped() {
    Scenario::new("invalid-connection-state")
        .initialize()
        .start()
        .emit_connection(0, 2, "198.51.100.8:443")
        .emit_connection(1, 2, "198.51.100.8:443")
        .oracle(Box::new(|world| {
            let changes = world.events_of(EventKind::ConsumerConnectionChange);
            if changes.len() != 1 {
                return Err(format!("expected the state-0 change dropped, got {changes:?}"));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn event_order_within_a_kind_is_emission_order() {
    Scenario::new("per-kind-ordering")
        .initialize()
        .start()
        .emit_chunk(1, 0)
        .emit_chunk(2, 0)
        .emit_chunk(3, 0)
        .oracle(Box::new(|world| {
            let sizes: Vec<u64> = world
                .events_of(EventKind::DownstreamChunk)
                .into_iter()
                .map(|event| match event {
                    EngineEvent::DownstreamChunk { size, .. } => size,
                    other => unreachable!("filtered to chunks, got {other:?}"),
                })
                .collect();
            if sizes != vec![1, 2, 3] {
                return Err(format!("chunks out of order: {sizes:?}"));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}
