//! Callback registration handle given to the engine at load time.

use tokio::sync::mpsc;

use crate::event::RawEngineEvent;

/// Typed callback handle the engine reports through.
///
/// One tap is created per engine load and passed into
/// [`crate::EngineLoader::load`]. The engine calls the four methods from
/// wherever its internals run; emission order is preserved per tap. If
/// the bridge side has shut down, reports are silently dropped.
#[derive(Debug, Clone)]
pub struct EventTap {
    tx: mpsc::UnboundedSender<RawEngineEvent>,
}

impl EventTap {
    /// Create a tap and the receiving end the bridge's event pump drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RawEngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// The engine is ready to be started.
    pub fn on_ready(&self) {
        self.emit(RawEngineEvent::Ready);
    }

    /// One chunk of downstream data arrived on `worker_idx`.
    pub fn on_downstream_chunk(&self, size: u64, worker_idx: usize) {
        self.emit(RawEngineEvent::DownstreamChunk { size, worker_idx });
    }

    /// Sampled system-wide downstream throughput.
    pub fn on_downstream_throughput(&self, bytes_per_sec: u64) {
        self.emit(RawEngineEvent::DownstreamThroughput { bytes_per_sec });
    }

    /// A consumer connected (`state == 1`) or disconnected
    /// (`state == -1`) on `worker_idx`.
    pub fn on_consumer_connection_change(&self, state: i8, worker_idx: usize, addr: &str) {
        self.emit(RawEngineEvent::ConsumerConnectionChange {
            state,
            worker_idx,
            addr: addr.to_string(),
        });
    }

    fn emit(&self, event: RawEngineEvent) {
        // Receiver gone means the bridge instance was torn down; the
        // engine is about to be dropped too.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tap_preserves_emission_order() {
        let (tap, mut rx) = EventTap::channel();
        tap.on_ready();
        tap.on_downstream_chunk(512, 2);
        tap.on_downstream_throughput(2048);

        assert_eq!(rx.recv().await, Some(RawEngineEvent::Ready));
        assert_eq!(rx.recv().await, Some(RawEngineEvent::DownstreamChunk { size: 512, worker_idx: 2 }));
        assert_eq!(rx.recv().await, Some(RawEngineEvent::DownstreamThroughput { bytes_per_sec: 2048 }));
    }

    #[tokio::test]
    async fn emitting_after_bridge_teardown_is_harmless() {
        let (tap, rx) = EventTap::channel();
        drop(rx);
        tap.on_ready();
        tap.on_consumer_connection_change(1, 0, "203.0.113.5");
    }
}
