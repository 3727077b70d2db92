//! Concurrency tests for the bridge controller.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use peerlink_bridge::{BridgeBuilder, LifecycleState};
use peerlink_engine::{EngineConfig, EventKind, Platform, TargetKind};
use peerlink_harness::ScriptedLoader;

fn web_config() -> EngineConfig {
    EngineConfig::new(TargetKind::Web, Platform::Desktop)
}

#[tokio::test(start_paused = true)]
async fn concurrent_initializers_share_one_load() {
    let loader = ScriptedLoader::new();
    let engine = loader.handle();
    let bridge = BridgeBuilder::new(web_config()).loader(loader).build().expect("build");

    let (a, b, c) = tokio::join!(bridge.initialize(), bridge.initialize(), bridge.initialize());

    let id = a.expect("initialize should succeed");
    assert_eq!(b, Some(id));
    assert_eq!(c, Some(id));
    assert_eq!(engine.loads(), 1);
    assert_eq!(bridge.lifecycle_state(), LifecycleState::Ready);
}

#[tokio::test(start_paused = true)]
async fn clones_observe_the_same_instance() {
    let loader = ScriptedLoader::new();
    let engine = loader.handle();
    let bridge = BridgeBuilder::new(web_config()).loader(loader).build().expect("build");
    let clone = bridge.clone();

    let first = bridge.initialize().await.expect("initialize");
    let second = clone.initialize().await.expect("initialize via clone");

    assert_eq!(first, second);
    assert_eq!(engine.loads(), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_subscriber_does_not_break_delivery() {
    let loader = ScriptedLoader::new();
    let bridge = BridgeBuilder::new(web_config()).loader(loader).build().expect("build");

    let delivered = Arc::new(AtomicUsize::new(0));

    // Subscribed first, so it panics before the counting handler runs.
    bridge.subscribe(EventKind::Ready, |_| panic!("subscriber bug"));
    {
        let delivered = Arc::clone(&delivered);
        bridge.subscribe(EventKind::Ready, move |_| {
            delivered.fetch_add(1, Ordering::Relaxed);
        });
    }

    bridge.initialize().await.expect("initialize");
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(delivered.load(Ordering::Relaxed), 1);
    assert_eq!(bridge.lifecycle_state(), LifecycleState::Ready);
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_handler_receives_nothing() {
    let loader = ScriptedLoader::new();
    let bridge = BridgeBuilder::new(web_config()).loader(loader).build().expect("build");

    let delivered = Arc::new(AtomicUsize::new(0));
    let subscription = {
        let delivered = Arc::clone(&delivered);
        bridge.subscribe(EventKind::Ready, move |_| {
            delivered.fetch_add(1, Ordering::Relaxed);
        })
    };
    assert!(bridge.unsubscribe(&subscription));

    bridge.initialize().await.expect("initialize");
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(delivered.load(Ordering::Relaxed), 0);
}
