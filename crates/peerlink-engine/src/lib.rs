//! Engine boundary for Peerlink.
//!
//! The engine is an opaque binary module that performs the actual
//! peer-to-peer connection sharing. This crate defines the narrow surface
//! the bridge sees: two control entry points (`start`, `stop`), a
//! diagnostic hook (`debug`), and four callbacks the engine reports
//! through.
//!
//! Callback registration is explicit: the bridge hands an [`EventTap`]
//! to [`EngineLoader::load`], and the engine reports exclusively through
//! it. There are no ambient callback slots to overwrite, so two loads
//! can never steal each other's reporting channel.
//!
//! # Components
//!
//! - [`Engine`] / [`EngineLoader`]: the control boundary
//! - [`EventTap`]: typed callback registration handle
//! - [`RawEngineEvent`] / [`EngineEvent`]: raw callback shapes and the
//!   typed event union the bridge publishes
//! - [`EngineConfig`]: host-supplied configuration
//! - [`MockEngine`]: deterministic stand-in used when `mock_mode` is set

pub mod config;
pub mod engine;
pub mod event;
pub mod mock;
pub mod tap;

pub use config::{ClientType, EngineConfig, EngineSettings, Platform, TargetKind};
pub use engine::{Engine, EngineLoader, LoadError};
pub use event::{
    ConnectionDelta, DISCONNECT_ADDR_SENTINEL, EngineEvent, EventKind, PeerAddr, RawEngineEvent,
};
pub use mock::{MockEngine, MockLoader};
pub use tap::EventTap;
