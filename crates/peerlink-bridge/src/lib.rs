//! Lifecycle and event bridge for the Peerlink engine.
//!
//! The engine is opaque: it handles connections, throughput accounting,
//! and peer bookkeeping internally. This crate is the narrow layer
//! between it and a host UI:
//!
//! - [`Lifecycle`]: pure state machine sequencing
//!   initialize → ready → start/stop → ready. No I/O; invalid operations
//!   return typed errors the controller interprets.
//! - [`Bridge`]: the controller. Owns exactly one engine per instance,
//!   serializes initialization, pumps engine callbacks into typed events,
//!   and enforces the "wait for `Ready` after `stop`" contract.
//! - [`EventMux`]: fan-out of typed events to any number of subscribers,
//!   with per-handler failure isolation.
//! - [`SuspensionPolicy`]: arms one deferred stop when the page is hidden
//!   while sharing without background permission; disarms it the moment
//!   any input flips.
//! - [`AutoRestartStore`]: one persisted flag that resumes sharing after
//!   an externally triggered reload of the hosting context.

pub mod bridge;
pub mod lifecycle;
pub mod mux;
pub mod restart;
pub mod suspend;

pub use bridge::{Bridge, BridgeBuilder, BuildError, EngineState, HandleId};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleState};
pub use mux::{EventMux, Subscription};
pub use restart::{AutoRestartStore, FsRestartStore, MemoryRestartStore};
pub use suspend::{BackgroundSettings, SUSPEND_DELAY, SuspensionInputs, SuspensionPolicy, should_arm};
