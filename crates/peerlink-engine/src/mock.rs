//! Deterministic mock engine.
//!
//! Loaded instead of the real module when `mock_mode` is set, so hosts
//! and tests can exercise the full bridge contract without any network.
//! The mock honors the event protocol exactly: `Ready` at load
//! completion, a connect on `start`, throughput samples at the configured
//! refresh rate, and a disconnect followed by `Ready` after `stop`
//! teardown.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineLoader, LoadError};
use crate::event::DISCONNECT_ADDR_SENTINEL;
use crate::tap::EventTap;

/// Fixed chunk size the mock reports, in bytes.
const MOCK_CHUNK_SIZE: u64 = 16 * 1024;

/// Documentation-range address the mock's synthetic consumer connects
/// from.
const MOCK_CONSUMER_ADDR: &str = "203.0.113.7";

/// Loader that produces [`MockEngine`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockLoader;

#[async_trait]
impl EngineLoader for MockLoader {
    async fn load(
        &self,
        config: &EngineConfig,
        tap: EventTap,
    ) -> Result<Box<dyn Engine>, LoadError> {
        if config.settings.ui_refresh_hz == 0 {
            return Err(LoadError::InvalidConfig {
                reason: "ui_refresh_hz must be non-zero".to_string(),
            });
        }

        // Yield once so load completion is observably asynchronous, like
        // a real module fetch.
        tokio::task::yield_now().await;

        let engine = MockEngine::new(tap, config.settings.ui_refresh_hz);
        engine.tap.on_ready();
        Ok(Box::new(engine))
    }
}

/// Engine stand-in that emits synthetic traffic events.
#[derive(Debug)]
pub struct MockEngine {
    tap: EventTap,
    refresh_hz: u32,
    worker: Option<AbortHandle>,
}

impl MockEngine {
    fn new(tap: EventTap, refresh_hz: u32) -> Self {
        Self { tap, refresh_hz, worker: None }
    }
}

impl Engine for MockEngine {
    fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let tap = self.tap.clone();
        let period = Duration::from_millis(1000 / u64::from(self.refresh_hz));
        let per_sec = MOCK_CHUNK_SIZE * u64::from(self.refresh_hz);
        let handle = tokio::spawn(async move {
            tap.on_consumer_connection_change(1, 0, MOCK_CONSUMER_ADDR);
            loop {
                tokio::time::sleep(period).await;
                tap.on_downstream_chunk(MOCK_CHUNK_SIZE, 0);
                tap.on_downstream_throughput(per_sec);
            }
        })
        .abort_handle();
        self.worker = Some(handle);
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        // Teardown is asynchronous: the disconnect and the Ready
        // re-emission arrive after stop() has returned.
        let tap = self.tap.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            tap.on_consumer_connection_change(-1, 0, DISCONNECT_ADDR_SENTINEL);
            tap.on_ready();
        });
    }

    fn debug(&self) {
        debug!(running = self.worker.is_some(), refresh_hz = self.refresh_hz, "mock engine state");
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
