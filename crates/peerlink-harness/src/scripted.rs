//! Scripted engine double.
//!
//! A [`ScriptedLoader`] stands in for the real module loader. Unlike the
//! mock engine, which drives itself on a timer, the scripted engine emits
//! nothing on its own: every event comes from the test through a
//! [`ScriptedHandle`]. That makes event timing a scenario input instead
//! of a race.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use peerlink_engine::{Engine, EngineConfig, EngineLoader, EventTap, LoadError};
use tracing::debug;

#[derive(Default)]
struct Counters {
    loads: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    debugs: AtomicUsize,
    fail_next_loads: AtomicUsize,
}

struct Shared {
    tap: Mutex<Option<EventTap>>,
    counters: Counters,
    ready_on_load: bool,
    ready_on_stop: bool,
}

impl Shared {
    fn lock_tap(&self) -> MutexGuard<'_, Option<EventTap>> {
        self.tap.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loader that produces scripted engines.
///
/// With `ready_on_load` the engine reports `Ready` as soon as it is
/// loaded, matching a real module's boot sequence. With `ready_on_stop`
/// each `stop` is immediately followed by the post-teardown `Ready`.
/// Turn either off to hold the bridge in the intermediate state and
/// drive the transition by hand with [`ScriptedHandle::emit_ready`].
pub struct ScriptedLoader {
    shared: Arc<Shared>,
}

impl ScriptedLoader {
    /// Loader that reports `Ready` on load and after each stop.
    #[must_use]
    pub fn new() -> Self {
        Self::with_behavior(true, true)
    }

    /// Loader with explicit ready behavior.
    #[must_use]
    pub fn with_behavior(ready_on_load: bool, ready_on_stop: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                tap: Mutex::new(None),
                counters: Counters::default(),
                ready_on_load,
                ready_on_stop,
            }),
        }
    }

    /// Handle for driving and inspecting the scripted engine.
    #[must_use]
    pub fn handle(&self) -> ScriptedHandle {
        ScriptedHandle { shared: Arc::clone(&self.shared) }
    }
}

impl Default for ScriptedLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineLoader for ScriptedLoader {
    async fn load(
        &self,
        _config: &EngineConfig,
        tap: EventTap,
    ) -> Result<Box<dyn Engine>, LoadError> {
        self.shared.counters.loads.fetch_add(1, Ordering::Relaxed);

        let failures = &self.shared.counters.fail_next_loads;
        if failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            debug!("scripted loader: injected load failure");
            return Err(LoadError::ModuleLoad { reason: "injected load failure".to_string() });
        }

        if self.shared.ready_on_load {
            tap.on_ready();
        }
        *self.shared.lock_tap() = Some(tap);
        Ok(Box::new(ScriptedEngine { shared: Arc::clone(&self.shared) }))
    }
}

struct ScriptedEngine {
    shared: Arc<Shared>,
}

impl Engine for ScriptedEngine {
    fn start(&mut self) {
        self.shared.counters.starts.fetch_add(1, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        self.shared.counters.stops.fetch_add(1, Ordering::Relaxed);
        if self.shared.ready_on_stop {
            if let Some(tap) = &*self.shared.lock_tap() {
                tap.on_ready();
            }
        }
    }

    fn debug(&self) {
        self.shared.counters.debugs.fetch_add(1, Ordering::Relaxed);
    }
}

/// Drives the scripted engine and inspects what the bridge asked of it.
#[derive(Clone)]
pub struct ScriptedHandle {
    shared: Arc<Shared>,
}

impl ScriptedHandle {
    /// Make the next `count` loads fail with a module-load error.
    pub fn fail_next_loads(&self, count: usize) {
        self.shared.counters.fail_next_loads.store(count, Ordering::Relaxed);
    }

    /// Emit `Ready` from the engine.
    pub fn emit_ready(&self) {
        self.emit(|tap| tap.on_ready());
    }

    /// Emit a downstream chunk arrival.
    pub fn emit_chunk(&self, size: u64, worker_idx: usize) {
        self.emit(|tap| tap.on_downstream_chunk(size, worker_idx));
    }

    /// Emit a throughput sample.
    pub fn emit_throughput(&self, bytes_per_sec: u64) {
        self.emit(|tap| tap.on_downstream_throughput(bytes_per_sec));
    }

    /// Emit a consumer connection change with the raw wire shape.
    pub fn emit_connection(&self, state: i8, worker_idx: usize, addr: &str) {
        self.emit(|tap| tap.on_consumer_connection_change(state, worker_idx, addr));
    }

    /// How many loads the bridge attempted (including injected failures).
    #[must_use]
    pub fn loads(&self) -> usize {
        self.shared.counters.loads.load(Ordering::Relaxed)
    }

    /// How many `start` calls reached the engine.
    #[must_use]
    pub fn starts(&self) -> usize {
        self.shared.counters.starts.load(Ordering::Relaxed)
    }

    /// How many `stop` calls reached the engine.
    #[must_use]
    pub fn stops(&self) -> usize {
        self.shared.counters.stops.load(Ordering::Relaxed)
    }

    /// How many `debug` calls reached the engine.
    #[must_use]
    pub fn debugs(&self) -> usize {
        self.shared.counters.debugs.load(Ordering::Relaxed)
    }

    fn emit(&self, f: impl FnOnce(&EventTap)) {
        match &*self.shared.lock_tap() {
            Some(tap) => f(tap),
            None => debug!("scripted engine: emit before load, dropped"),
        }
    }
}
