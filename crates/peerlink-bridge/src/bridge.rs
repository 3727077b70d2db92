//! Bridge controller: owns one engine and sequences its lifecycle.
//!
//! The controller is the host-facing surface. It owns exactly one engine
//! slot per instance, serializes initialization so concurrent callers
//! coalesce onto one load, runs the event pump that turns raw engine
//! callbacks into published [`EngineEvent`]s, and wires the suspension
//! policy's deferred stop back into its own `stop`.
//!
//! `start` and `stop` are fire-and-forget: they return once the request
//! is handed to the engine, and completion is observed through the
//! `Ready` event. Misuse (`start` while running, `stop` while stopping)
//! is a warning no-op because UI input legitimately races asynchronous
//! engine state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use peerlink_engine::{
    Engine, EngineConfig, EngineEvent, EngineLoader, EventKind, EventTap, MockLoader, Platform,
    RawEngineEvent,
};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::mux::{EventMux, Subscription};
use crate::restart::{AutoRestartStore, MemoryRestartStore};
use crate::suspend::{SUSPEND_DELAY, SuspensionPolicy};

/// Identifies one successfully loaded engine instance. Concurrent
/// `initialize` callers that coalesced onto the same load observe the
/// same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

/// Load state of the engine slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No engine loaded.
    Unloaded,
    /// A load is in flight.
    Loading,
    /// Engine loaded.
    Loaded,
}

enum EngineSlot {
    Unloaded,
    Loading,
    Loaded { id: HandleId, engine: Box<dyn Engine> },
}

impl EngineSlot {
    fn state(&self) -> EngineState {
        match self {
            EngineSlot::Unloaded => EngineState::Unloaded,
            EngineSlot::Loading => EngineState::Loading,
            EngineSlot::Loaded { .. } => EngineState::Loaded,
        }
    }
}

/// Errors constructing a [`Bridge`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A real engine loader is required unless `mock_mode` is set.
    #[error("an engine loader is required unless mock_mode is set")]
    MissingLoader,
}

/// Builder for [`Bridge`].
///
/// When `config.mock_mode` is set the deterministic
/// [`MockLoader`] is used and any supplied loader is ignored; otherwise
/// a loader must be provided.
pub struct BridgeBuilder {
    config: EngineConfig,
    loader: Option<Box<dyn EngineLoader>>,
    restart: Option<Box<dyn AutoRestartStore>>,
}

impl BridgeBuilder {
    /// Builder for a bridge driving an engine configured by `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self { config, loader: None, restart: None }
    }

    /// Loader for the real engine module.
    #[must_use]
    pub fn loader(mut self, loader: impl EngineLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Persistent auto-restart flag store. Defaults to a
    /// [`MemoryRestartStore`], which does not survive a context reload.
    #[must_use]
    pub fn restart_store(mut self, store: impl AutoRestartStore + 'static) -> Self {
        self.restart = Some(Box::new(store));
        self
    }

    /// Construct the bridge.
    ///
    /// # Errors
    /// [`BuildError::MissingLoader`] if `mock_mode` is off and no loader
    /// was supplied.
    pub fn build(self) -> Result<Bridge, BuildError> {
        let loader: Box<dyn EngineLoader> = if self.config.mock_mode {
            Box::new(MockLoader)
        } else {
            self.loader.ok_or(BuildError::MissingLoader)?
        };
        let restart = self.restart.unwrap_or_else(|| Box::new(MemoryRestartStore::new()));
        let (policy, stop_rx) = SuspensionPolicy::new(self.config.platform, SUSPEND_DELAY);
        Ok(Bridge {
            inner: Arc::new(Inner {
                config: self.config,
                loader,
                restart,
                lifecycle: Mutex::new(Lifecycle::new()),
                mux: EventMux::new(),
                policy,
                stop_rx: Mutex::new(Some(stop_rx)),
                engine: AsyncMutex::new(EngineSlot::Unloaded),
                init_gate: AsyncMutex::new(()),
                pump: Mutex::new(None),
                next_handle: AtomicU64::new(1),
                restart_checked: AtomicBool::new(false),
            }),
        })
    }
}

/// The lifecycle-and-event bridge. One per app instance; cheap to clone.
///
/// All methods must be called from within a Tokio runtime: the bridge
/// spawns its event pump and the suspension timer on the ambient
/// runtime.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    loader: Box<dyn EngineLoader>,
    restart: Box<dyn AutoRestartStore>,
    lifecycle: Mutex<Lifecycle>,
    mux: EventMux,
    policy: SuspensionPolicy,
    stop_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    engine: AsyncMutex<EngineSlot>,
    init_gate: AsyncMutex<()>,
    pump: Mutex<Option<AbortHandle>>,
    next_handle: AtomicU64,
    restart_checked: AtomicBool,
}

impl Bridge {
    /// Load the engine.
    ///
    /// Idempotent by instance: if an engine is already loaded (or a load
    /// is in flight) the existing instance's [`HandleId`] is returned
    /// without a second load; concurrent callers coalesce onto the
    /// in-flight result. On load failure the state resets to
    /// uninitialized, `None` is returned, and a later call may retry.
    ///
    /// This is the only suspending bridge operation.
    pub async fn initialize(&self) -> Option<HandleId> {
        Inner::initialize(&self.inner).await
    }

    /// Start sharing. Valid only when ready; anything else is a logged
    /// no-op.
    pub async fn start(&self) {
        self.inner.start().await;
    }

    /// Stop sharing. Valid when ready or running; the engine re-emits
    /// `Ready` once teardown completes, and only then is `start`
    /// accepted again.
    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    /// Diagnostic pass-through to the engine. No state transition.
    pub async fn debug(&self) {
        self.inner.debug().await;
    }

    /// Tear down this instance: cancel the pump and any pending
    /// suspension stop, and unload the engine.
    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }

    /// Subscribe `handler` to events of `kind`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&EngineEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.mux.subscribe(kind, handler)
    }

    /// Remove a subscription. Returns whether it was still registered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inner.mux.unsubscribe(subscription)
    }

    /// Page visibility changed (re-evaluates the suspension policy).
    pub fn set_page_visible(&self, visible: bool) {
        self.inner.policy.set_page_visible(visible);
    }

    /// Background permission for `platform` changed.
    pub fn set_background_allowed(&self, platform: Platform, allowed: bool) {
        self.inner.policy.set_background_allowed(platform, allowed);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.lock_lifecycle().state()
    }

    /// Current engine slot state.
    pub async fn engine_state(&self) -> EngineState {
        self.inner.engine.lock().await.state()
    }

    /// Whether a deferred suspension stop is outstanding.
    #[must_use]
    pub fn suspension_armed(&self) -> bool {
        self.inner.policy.is_armed()
    }

    /// The configuration this bridge was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}

impl Inner {
    async fn initialize(this: &Arc<Self>) -> Option<HandleId> {
        // Serializes loads: a second caller parks here while the first
        // is loading and then observes the loaded slot.
        let _gate = this.init_gate.lock().await;

        {
            let slot = this.engine.lock().await;
            if let EngineSlot::Loaded { id, .. } = &*slot {
                info!(id = id.0, "initialize: engine already loaded");
                return Some(*id);
            }
        }

        if let Err(err) = this.lock_lifecycle().begin_initialize() {
            warn!(%err, "ignoring initialize request");
            return None;
        }
        *this.engine.lock().await = EngineSlot::Loading;

        let (tap, raw_rx) = EventTap::channel();
        info!(target = ?this.config.target, mock = this.config.mock_mode, "loading engine");
        match this.loader.load(&this.config, tap).await {
            Ok(engine) => {
                let id = HandleId(this.next_handle.fetch_add(1, Ordering::Relaxed));
                *this.engine.lock().await = EngineSlot::Loaded { id, engine };
                if let Err(err) = this.lock_lifecycle().initialize_complete() {
                    warn!(%err, "lifecycle out of sync after load");
                }
                Self::spawn_pump(this, raw_rx);
                info!(id = id.0, "engine loaded");
                Some(id)
            },
            Err(err) => {
                error!(%err, "engine failed to load");
                *this.engine.lock().await = EngineSlot::Unloaded;
                if let Err(err) = this.lock_lifecycle().initialize_failed() {
                    warn!(%err, "lifecycle out of sync after failed load");
                }
                None
            },
        }
    }

    fn spawn_pump(this: &Arc<Self>, mut raw_rx: mpsc::UnboundedReceiver<RawEngineEvent>) {
        let mut stop_rx = this.lock_stop_rx().take();
        let inner = Arc::clone(this);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    raw = raw_rx.recv() => match raw {
                        Some(raw) => inner.handle_raw_event(raw).await,
                        None => break,
                    },
                    Some(()) = recv_stop(&mut stop_rx) => {
                        info!("suspension policy requested stop");
                        inner.stop().await;
                    },
                }
            }
        })
        .abort_handle();
        *this.lock_pump() = Some(handle);
    }

    async fn handle_raw_event(&self, raw: RawEngineEvent) {
        let Some(event) = EngineEvent::from_raw(raw) else {
            return;
        };
        if event == EngineEvent::Ready {
            {
                let mut lifecycle = self.lock_lifecycle();
                match lifecycle.engine_ready() {
                    Ok(()) => info!(state = %lifecycle.state(), "engine ready"),
                    Err(err) => warn!(%err, "unexpected ready from engine"),
                }
            }
            self.mux.publish(&EngineEvent::Ready);
            self.maybe_auto_restart().await;
        } else {
            // Traffic observed between a stop request and the next
            // Ready belongs to a tearing-down instance; subscribers
            // never see it.
            if self.lock_lifecycle().is_running() {
                self.mux.publish(&event);
            }
        }
    }

    /// Consume the auto-restart flag on the first `Ready` after a
    /// successful initialization, in the one target where an external
    /// auto-update can have reloaded the hosting context mid-share.
    async fn maybe_auto_restart(&self) {
        if self.restart_checked.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.config.target.honors_auto_restart() {
            return;
        }
        if self.restart.consume_if_set() {
            info!("auto-restart flag was set before reload, resuming sharing");
            self.start().await;
        }
    }

    async fn start(&self) {
        if let Err(err) = self.lock_lifecycle().start() {
            warn!(%err, "ignoring start request");
            return;
        }
        info!("start requested");
        {
            let mut slot = self.engine.lock().await;
            if let EngineSlot::Loaded { engine, .. } = &mut *slot {
                engine.start();
            }
        }
        self.policy.set_sharing(true);
    }

    async fn stop(&self) {
        if let Err(err) = self.lock_lifecycle().stop() {
            warn!(%err, "ignoring stop request");
            return;
        }
        info!("stop requested");
        {
            let mut slot = self.engine.lock().await;
            if let EngineSlot::Loaded { engine, .. } = &mut *slot {
                engine.stop();
            }
        }
        self.policy.set_sharing(false);
    }

    async fn debug(&self) {
        let slot = self.engine.lock().await;
        if let EngineSlot::Loaded { engine, .. } = &*slot {
            engine.debug();
        } else {
            warn!("debug requested before engine load");
        }
    }

    async fn shutdown(&self) {
        self.policy.reset();
        if let Some(pump) = self.lock_pump().take() {
            pump.abort();
        }
        let mut slot = self.engine.lock().await;
        if let EngineSlot::Loaded { mut engine, .. } =
            std::mem::replace(&mut *slot, EngineSlot::Unloaded)
        {
            engine.stop();
        }
        info!("bridge shut down");
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pump(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.pump.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stop_rx(&self) -> MutexGuard<'_, Option<mpsc::UnboundedReceiver<()>>> {
        self.stop_rx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn recv_stop(rx: &mut Option<mpsc::UnboundedReceiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
