//! The control boundary: `Engine` and `EngineLoader`.

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::tap::EventTap;

/// A loaded engine module.
///
/// `start` and `stop` are fire-and-forget requests; completion is
/// observed through the [`crate::EventTap`] the engine was loaded with,
/// not through a blocking return. In particular, after `stop` the engine
/// re-emits `Ready` once teardown finishes, and only then may the bridge
/// accept another `start`.
pub trait Engine: Send {
    /// Begin accepting and establishing peer connections.
    fn start(&mut self);

    /// Tear down peer connections. Asynchronous: the engine reports
    /// `Ready` through its tap when teardown completes, with no bound on
    /// how long that takes.
    fn stop(&mut self);

    /// Diagnostic pass-through. No state transition.
    fn debug(&self);
}

/// Loads an engine module.
///
/// Loading is the only suspending operation at the engine boundary. The
/// tap is the engine's sole reporting channel and is handed over at load
/// time, so a load can never redirect another instance's reporting.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// Load one engine instance configured by `config`, reporting
    /// through `tap`.
    async fn load(&self, config: &EngineConfig, tap: EventTap)
    -> Result<Box<dyn Engine>, LoadError>;
}

/// Why an engine failed to load.
///
/// Load failure is never fatal to the host: the bridge resets and the
/// caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The binary module could not be fetched or instantiated.
    #[error("engine module failed to load: {reason}")]
    ModuleLoad {
        /// Loader-specific description of the failure.
        reason: String,
    },

    /// The configuration was rejected before any load was attempted.
    #[error("engine configuration rejected: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },
}
