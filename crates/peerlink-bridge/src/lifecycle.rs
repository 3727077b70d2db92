//! Lifecycle state machine for one engine instance.
//!
//! # Architecture: Action-Based State Machine
//!
//! Pure state transitions, no I/O: the [`Bridge`](crate::Bridge) calls
//! these methods, executes the corresponding engine entry points itself,
//! and decides how to treat errors. Misuse of `start`/`stop` (UI input
//! racing async engine events) comes back as
//! [`LifecycleError::InvalidState`], which the controller downgrades to a
//! logged warning rather than a failure.
//!
//! # State Machine
//!
//! ```text
//! ┌───────────────┐ begin_initialize ┌──────────────┐ initialize_complete
//! │ Uninitialized │─────────────────>│ Initializing │──────────────┐
//! └───────────────┘                  └──────────────┘              │
//!         ▲                                 │ initialize_failed    ▼
//!         └─────────────────────────────────┘               ┌───────┐
//!                                                    ┌─────>│ Ready │
//!                                       engine_ready │      └───────┘
//!                                                    │        │ start
//!                                              ┌──────────┐   ▼
//!                                              │ Stopping │ ┌─────────┐
//!                                              └──────────┘ │ Running │
//!                                                    ▲      └─────────┘
//!                                                    └──── stop ┘
//! ```
//!
//! `stop` is also accepted from `Ready` (tearing down a loaded but idle
//! engine). After any `stop`, `start` is not accepted again until the
//! engine re-emits `Ready`: teardown is asynchronous and unbounded, so
//! readiness is tracked explicitly via [`Lifecycle::engine_ready`], never
//! assumed.

use std::fmt;

/// Lifecycle of one engine instance. Exactly one per bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No engine load attempted, or the last attempt failed.
    Uninitialized,
    /// An engine load is in flight.
    Initializing,
    /// Engine loaded and idle; `start` is valid.
    Ready,
    /// Engine is sharing connections.
    Running,
    /// `stop` requested; waiting for the engine to re-emit `Ready`.
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Ready => "ready",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Lifecycle transition errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The operation is not valid in the current state.
    #[error("`{operation}` is invalid in state `{state}`")]
    InvalidState {
        /// State the machine was in.
        state: LifecycleState,
        /// Operation that was attempted.
        operation: &'static str,
    },
}

/// The state machine itself.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    /// New machine in `Uninitialized`.
    pub fn new() -> Self {
        Self { state: LifecycleState::Uninitialized }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether sharing is currently active (drives the suspension
    /// policy's sharing input).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    /// `Uninitialized → Initializing`.
    ///
    /// # Errors
    /// `InvalidState` if a load is already in flight or completed. The
    /// controller never surfaces this: concurrent `initialize` calls are
    /// coalesced before reaching the state machine.
    pub fn begin_initialize(&mut self) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Uninitialized {
            return Err(self.invalid("begin_initialize"));
        }
        self.state = LifecycleState::Initializing;
        Ok(())
    }

    /// `Initializing → Ready`.
    ///
    /// # Errors
    /// `InvalidState` if no load was in flight.
    pub fn initialize_complete(&mut self) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Initializing {
            return Err(self.invalid("initialize_complete"));
        }
        self.state = LifecycleState::Ready;
        Ok(())
    }

    /// `Initializing → Uninitialized`. The failure is recoverable: a
    /// later `begin_initialize` may retry.
    ///
    /// # Errors
    /// `InvalidState` if no load was in flight.
    pub fn initialize_failed(&mut self) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Initializing {
            return Err(self.invalid("initialize_failed"));
        }
        self.state = LifecycleState::Uninitialized;
        Ok(())
    }

    /// `Ready → Running`.
    ///
    /// # Errors
    /// `InvalidState` anywhere else, including `Running` and
    /// `Stopping`, where the controller treats it as an idempotent
    /// no-op with a warning.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Ready {
            return Err(self.invalid("start"));
        }
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// `Ready | Running → Stopping`.
    ///
    /// # Errors
    /// `InvalidState` in any other state.
    pub fn stop(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Ready | LifecycleState::Running => {
                self.state = LifecycleState::Stopping;
                Ok(())
            },
            _ => Err(self.invalid("stop")),
        }
    }

    /// The engine emitted `Ready`: `Stopping → Ready`.
    ///
    /// In `Ready` this is a harmless refresh (the load-time `Ready`
    /// arrives after the controller has already completed
    /// initialization).
    ///
    /// # Errors
    /// `InvalidState` when no readiness was expected (`Uninitialized`,
    /// `Initializing`, `Running`).
    pub fn engine_ready(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Stopping => {
                self.state = LifecycleState::Ready;
                Ok(())
            },
            LifecycleState::Ready => Ok(()),
            _ => Err(self.invalid("engine_ready")),
        }
    }

    fn invalid(&self, operation: &'static str) -> LifecycleError {
        LifecycleError::InvalidState { state: self.state, operation }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.state(), LifecycleState::Uninitialized);

        lc.begin_initialize().unwrap();
        assert_eq!(lc.state(), LifecycleState::Initializing);

        lc.initialize_complete().unwrap();
        assert_eq!(lc.state(), LifecycleState::Ready);

        lc.start().unwrap();
        assert_eq!(lc.state(), LifecycleState::Running);
        assert!(lc.is_running());

        lc.stop().unwrap();
        assert_eq!(lc.state(), LifecycleState::Stopping);
        assert!(!lc.is_running());

        lc.engine_ready().unwrap();
        assert_eq!(lc.state(), LifecycleState::Ready);
    }

    #[test]
    fn start_requires_ready() {
        let mut lc = Lifecycle::new();
        assert!(matches!(lc.start(), Err(LifecycleError::InvalidState { .. })));

        lc.begin_initialize().unwrap();
        assert!(matches!(lc.start(), Err(LifecycleError::InvalidState { .. })));
    }

    #[test]
    fn start_after_stop_requires_new_ready() {
        let mut lc = Lifecycle::new();
        lc.begin_initialize().unwrap();
        lc.initialize_complete().unwrap();
        lc.start().unwrap();
        lc.stop().unwrap();

        // Teardown not confirmed yet: start must be rejected.
        assert!(matches!(lc.start(), Err(LifecycleError::InvalidState { .. })));

        lc.engine_ready().unwrap();
        lc.start().unwrap();
        assert_eq!(lc.state(), LifecycleState::Running);
    }

    #[test]
    fn double_start_is_invalid() {
        let mut lc = Lifecycle::new();
        lc.begin_initialize().unwrap();
        lc.initialize_complete().unwrap();
        lc.start().unwrap();
        assert_eq!(
            lc.start(),
            Err(LifecycleError::InvalidState {
                state: LifecycleState::Running,
                operation: "start"
            })
        );
    }

    #[test]
    fn stop_valid_from_ready_and_running_only() {
        let mut lc = Lifecycle::new();
        assert!(lc.stop().is_err());

        lc.begin_initialize().unwrap();
        assert!(lc.stop().is_err());

        lc.initialize_complete().unwrap();
        assert!(lc.stop().is_ok()); // idle teardown

        lc.engine_ready().unwrap();
        lc.start().unwrap();
        assert!(lc.stop().is_ok());
        assert!(lc.stop().is_err()); // already stopping
    }

    #[test]
    fn failed_initialize_is_retryable() {
        let mut lc = Lifecycle::new();
        lc.begin_initialize().unwrap();
        lc.initialize_failed().unwrap();
        assert_eq!(lc.state(), LifecycleState::Uninitialized);

        lc.begin_initialize().unwrap();
        lc.initialize_complete().unwrap();
        assert_eq!(lc.state(), LifecycleState::Ready);
    }

    #[test]
    fn ready_refresh_is_harmless() {
        let mut lc = Lifecycle::new();
        lc.begin_initialize().unwrap();
        lc.initialize_complete().unwrap();
        assert!(lc.engine_ready().is_ok());
        assert_eq!(lc.state(), LifecycleState::Ready);
    }

    #[test]
    fn unexpected_ready_is_invalid() {
        let mut lc = Lifecycle::new();
        assert!(lc.engine_ready().is_err());

        lc.begin_initialize().unwrap();
        lc.initialize_complete().unwrap();
        lc.start().unwrap();
        assert!(lc.engine_ready().is_err());
    }
}
