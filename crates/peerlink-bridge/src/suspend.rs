//! Background suspension policy.
//!
//! When the page is hidden while sharing is active and the user has not
//! allowed background operation for the current platform, the bridge
//! must stop the engine after a fixed delay rather than let it run
//! indefinitely in a hidden page.
//!
//! The decision is a pure function of four inputs ([`should_arm`]); the
//! policy wraps it with exactly one cancellable timer. Cancellation
//! discipline is load-bearing on desktop: mobile OSes suspend the timer
//! and the engine together when the page is backgrounded, but on desktop
//! this timer is the only thing preventing indefinite background
//! execution, so a stale timer must never fire after its arming
//! condition stopped holding. The timer handle is cleared before any
//! other mutation, and the deferred task re-checks its generation under
//! the policy lock before requesting the stop.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use peerlink_engine::Platform;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info};

/// Fixed delay between the arming condition holding and the deferred
/// stop firing.
pub const SUSPEND_DELAY: Duration = Duration::from_secs(60);

/// Per-platform "allow running in background" settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackgroundSettings {
    /// Allow background sharing on mobile.
    pub mobile: bool,
    /// Allow background sharing on desktop.
    pub desktop: bool,
}

impl BackgroundSettings {
    /// Setting that applies to `platform`.
    #[must_use]
    pub fn for_platform(self, platform: Platform) -> bool {
        match platform {
            Platform::Mobile => self.mobile,
            Platform::Desktop => self.desktop,
        }
    }
}

/// The four inputs the policy reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspensionInputs {
    /// Whether the hosting page is currently visible.
    pub page_visible: bool,
    /// Whether sharing is active (lifecycle state is running).
    pub sharing: bool,
    /// Device class of the hosting page.
    pub platform: Platform,
    /// Per-platform background permissions.
    pub background_allowed: BackgroundSettings,
}

/// Pure arming decision: hidden, sharing, and not allowed to run in the
/// background on this platform.
#[must_use]
pub fn should_arm(inputs: &SuspensionInputs) -> bool {
    !inputs.page_visible
        && inputs.sharing
        && !inputs.background_allowed.for_platform(inputs.platform)
}

struct PolicyState {
    inputs: SuspensionInputs,
    /// Bumped on every arm; a deferred task only fires if its generation
    /// is still current.
    generation: u64,
    timer: Option<AbortHandle>,
}

/// Arms and disarms the single deferred stop for one bridge instance.
///
/// Stop requests are delivered on the channel handed out by
/// [`SuspensionPolicy::new`]; the bridge's event pump executes them.
pub struct SuspensionPolicy {
    delay: Duration,
    stop_tx: mpsc::UnboundedSender<()>,
    state: Arc<Mutex<PolicyState>>,
}

impl SuspensionPolicy {
    /// New disarmed policy: page visible, not sharing, background
    /// disallowed on both platforms.
    pub fn new(platform: Platform, delay: Duration) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let state = PolicyState {
            inputs: SuspensionInputs {
                page_visible: true,
                sharing: false,
                platform,
                background_allowed: BackgroundSettings::default(),
            },
            generation: 0,
            timer: None,
        };
        (Self { delay, stop_tx, state: Arc::new(Mutex::new(state)) }, stop_rx)
    }

    /// Page visibility changed.
    pub fn set_page_visible(&self, visible: bool) {
        self.apply(|inputs| inputs.page_visible = visible);
    }

    /// Sharing state changed.
    pub fn set_sharing(&self, sharing: bool) {
        self.apply(|inputs| inputs.sharing = sharing);
    }

    /// The user toggled background permission for `platform`.
    pub fn set_background_allowed(&self, platform: Platform, allowed: bool) {
        self.apply(|inputs| match platform {
            Platform::Mobile => inputs.background_allowed.mobile = allowed,
            Platform::Desktop => inputs.background_allowed.desktop = allowed,
        });
    }

    /// Whether a deferred stop is currently outstanding.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.lock().timer.is_some()
    }

    /// Current inputs snapshot.
    #[must_use]
    pub fn inputs(&self) -> SuspensionInputs {
        self.lock().inputs
    }

    /// Disarm unconditionally (instance teardown).
    pub fn reset(&self) {
        let mut state = self.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    /// Mutate inputs and re-evaluate atomically with respect to timer
    /// scheduling: at most one timer is ever outstanding.
    fn apply(&self, change: impl FnOnce(&mut SuspensionInputs)) {
        let mut state = self.lock();
        change(&mut state.inputs);
        let want_armed = should_arm(&state.inputs);
        match (want_armed, state.timer.is_some()) {
            (true, false) => {
                state.generation += 1;
                let generation = state.generation;
                let shared = Arc::clone(&self.state);
                let stop_tx = self.stop_tx.clone();
                let delay = self.delay;
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let fire = {
                        let mut state =
                            shared.lock().unwrap_or_else(PoisonError::into_inner);
                        // A disarm or re-arm invalidates this timer even
                        // if abort lost the race with the sleep.
                        if state.generation == generation && state.timer.is_some() {
                            state.timer = None;
                            true
                        } else {
                            false
                        }
                    };
                    if fire {
                        info!("background suspension delay elapsed, requesting stop");
                        let _ = stop_tx.send(());
                    }
                })
                .abort_handle();
                state.timer = Some(handle);
                debug!(delay = ?self.delay, "suspension timer armed");
            },
            (false, true) => {
                // Clear the handle before anything else observes the
                // disarmed state.
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
                debug!("suspension timer disarmed");
            },
            _ => {},
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PolicyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
