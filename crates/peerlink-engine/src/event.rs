//! Raw callback shapes and the typed event union.
//!
//! [`RawEngineEvent`] mirrors the four callbacks the engine reports
//! through, exactly as they cross the boundary: connection changes carry a
//! signed `state` (`1` connect, `-1` disconnect) and a bare address
//! string. [`EngineEvent`] is what subscribers see after the bridge has
//! classified the address and turned the state into a proper variant.

use tracing::warn;

/// Address string the engine reports on disconnect callbacks.
///
/// Not a real address. Must never be parsed as one; it decodes to
/// [`PeerAddr::NotApplicable`].
pub const DISCONNECT_ADDR_SENTINEL: &str = "<nil>";

/// One of the four callbacks, as emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEngineEvent {
    /// The engine is ready to be started. Re-emitted after every
    /// completed teardown.
    Ready,
    /// One chunk of downstream data was received.
    DownstreamChunk {
        /// Chunk size in bytes.
        size: u64,
        /// Zero-based connection slot the chunk arrived on.
        worker_idx: usize,
    },
    /// Sampled system-wide downstream throughput gauge.
    DownstreamThroughput {
        /// Current inbound throughput in bytes per second.
        bytes_per_sec: u64,
    },
    /// A consumer connected to or disconnected from a slot.
    ConsumerConnectionChange {
        /// `1` for connect, `-1` for disconnect.
        state: i8,
        /// Zero-based connection slot.
        worker_idx: usize,
        /// Literal peer address text on connect (empty when extraction
        /// failed); [`DISCONNECT_ADDR_SENTINEL`] on disconnect.
        addr: String,
    },
}

/// Subscription key: which of the four events a subscriber wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`EngineEvent::Ready`].
    Ready,
    /// [`EngineEvent::DownstreamChunk`].
    DownstreamChunk,
    /// [`EngineEvent::DownstreamThroughput`].
    DownstreamThroughput,
    /// [`EngineEvent::ConsumerConnectionChange`].
    ConsumerConnectionChange,
}

/// Direction of a consumer connection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDelta {
    /// A consumer connected to the slot.
    Connected,
    /// A consumer disconnected from the slot.
    Disconnected,
}

/// Classified peer address carried by connection-change events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddr {
    /// Literal IPv4/IPv6 textual address of the peer. The bridge relays
    /// it verbatim and never parses it.
    Known(String),
    /// The engine could not extract an address. Degraded info, not an
    /// error: the connection itself is real.
    Unknown,
    /// No address applies (disconnect events).
    NotApplicable,
}

impl PeerAddr {
    /// Classify the address string of a connect callback.
    fn from_connect(addr: String) -> Self {
        if addr.is_empty() { PeerAddr::Unknown } else { PeerAddr::Known(addr) }
    }
}

/// Typed event union published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine is ready for `start`.
    Ready,
    /// One received chunk. Fires once per chunk with its exact size.
    DownstreamChunk {
        /// Chunk size in bytes.
        size: u64,
        /// Zero-based connection slot.
        slot: usize,
    },
    /// Sampled throughput gauge, emitted at the configured UI refresh
    /// rate regardless of traffic bursts. Distinct from
    /// [`EngineEvent::DownstreamChunk`] and never a per-byte signal.
    DownstreamThroughput {
        /// Current inbound throughput in bytes per second.
        bytes_per_sec: u64,
    },
    /// A consumer connected or disconnected.
    ConsumerConnectionChange {
        /// Direction of the change.
        delta: ConnectionDelta,
        /// Zero-based connection slot.
        slot: usize,
        /// Classified peer address.
        addr: PeerAddr,
    },
}

impl EngineEvent {
    /// Subscription key for this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Ready => EventKind::Ready,
            EngineEvent::DownstreamChunk { .. } => EventKind::DownstreamChunk,
            EngineEvent::DownstreamThroughput { .. } => EventKind::DownstreamThroughput,
            EngineEvent::ConsumerConnectionChange { .. } => EventKind::ConsumerConnectionChange,
        }
    }

    /// Convert a raw callback into the typed union.
    ///
    /// Returns `None` for a connection change whose `state` is neither
    /// `1` nor `-1`; the engine never emits such a value, so the bridge
    /// discards it rather than guessing a direction.
    #[must_use]
    pub fn from_raw(raw: RawEngineEvent) -> Option<Self> {
        match raw {
            RawEngineEvent::Ready => Some(EngineEvent::Ready),
            RawEngineEvent::DownstreamChunk { size, worker_idx } => {
                Some(EngineEvent::DownstreamChunk { size, slot: worker_idx })
            },
            RawEngineEvent::DownstreamThroughput { bytes_per_sec } => {
                Some(EngineEvent::DownstreamThroughput { bytes_per_sec })
            },
            RawEngineEvent::ConsumerConnectionChange { state, worker_idx, addr } => match state {
                1 => Some(EngineEvent::ConsumerConnectionChange {
                    delta: ConnectionDelta::Connected,
                    slot: worker_idx,
                    addr: PeerAddr::from_connect(addr),
                }),
                -1 => Some(EngineEvent::ConsumerConnectionChange {
                    delta: ConnectionDelta::Disconnected,
                    slot: worker_idx,
                    addr: PeerAddr::NotApplicable,
                }),
                other => {
                    warn!(state = other, slot = worker_idx, "invalid connection change state");
                    None
                },
            },
        }
    }
}
