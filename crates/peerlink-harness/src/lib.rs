//! Deterministic scenario harness for the Peerlink bridge.
//!
//! A [`ScriptedLoader`] replaces the real engine module with an engine
//! the test drives event by event, and [`Scenario`] builds paused-clock
//! runs over a bridge wired to it. Every scenario ends in a mandatory
//! oracle over the final [`World`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod scripted;

pub use scenario::{OracleFn, RunnableScenario, Scenario, World, settle};
pub use scripted::{ScriptedHandle, ScriptedLoader};

/// Install a fmt subscriber filtered by `RUST_LOG` for scenario debugging.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
