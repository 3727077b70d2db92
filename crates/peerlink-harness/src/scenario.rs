//! Scenario builder API.
//!
//! Declarative construction of bridge scenarios that enforce the Oracle
//! Pattern: a scenario cannot run without a verification function over
//! the final [`World`].
//!
//! Scenarios are meant to run under a paused Tokio clock
//! (`#[tokio::test(start_paused = true)]`). Every step is followed by a
//! short [`settle`] so the bridge's event pump drains before the next
//! step observes state; `advance` steps then cover real delays like the
//! suspension timer without wall-clock waiting.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use peerlink_bridge::{
    Bridge, BridgeBuilder, HandleId, LifecycleState, MemoryRestartStore, Subscription,
};
use peerlink_engine::{EngineConfig, EngineEvent, EventKind, Platform, TargetKind};
use tracing::info;

use crate::scripted::{ScriptedHandle, ScriptedLoader};

/// Oracle verifying the final world state. Mandatory for every scenario.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;

/// Let the bridge's event pump drain queued events.
///
/// Under a paused clock this suspends the caller until every other task
/// is idle, so after `settle` all events emitted so far have been
/// classified and published.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

enum Step {
    Initialize,
    Start,
    Stop,
    Debug,
    Shutdown,
    EmitReady,
    EmitChunk { size: u64, worker_idx: usize },
    EmitThroughput { bytes_per_sec: u64 },
    EmitConnection { state: i8, worker_idx: usize, addr: String },
    HidePage,
    ShowPage,
    SetBackgroundAllowed { platform: Platform, allowed: bool },
    Advance(Duration),
}

/// Scenario builder.
///
/// Configure the bridge under test, queue steps, then call `.oracle()`
/// to get a [`RunnableScenario`].
pub struct Scenario {
    name: String,
    target: TargetKind,
    platform: Platform,
    ready_on_load: bool,
    ready_on_stop: bool,
    restart_flag_preset: bool,
    fail_loads: usize,
    steps: Vec<Step>,
}

impl Scenario {
    /// New scenario against a web-target, desktop-platform bridge.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: TargetKind::Web,
            platform: Platform::Desktop,
            ready_on_load: true,
            ready_on_stop: true,
            restart_flag_preset: false,
            fail_loads: 0,
            steps: Vec::new(),
        }
    }

    /// Deployment target hosting the bridge.
    #[must_use]
    pub fn target(mut self, target: TargetKind) -> Self {
        self.target = target;
        self
    }

    /// Device class of the hosting page.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Control when the scripted engine reports `Ready` on its own.
    /// Defaults to on-load and after-stop; turn one off to drive the
    /// transition by hand with [`Scenario::emit_ready`].
    #[must_use]
    pub fn engine_ready_behavior(mut self, on_load: bool, on_stop: bool) -> Self {
        self.ready_on_load = on_load;
        self.ready_on_stop = on_stop;
        self
    }

    /// Set the persisted auto-restart flag before the bridge exists, as
    /// a previous instance would have before its context was reloaded.
    #[must_use]
    pub fn restart_flag_preset(mut self) -> Self {
        self.restart_flag_preset = true;
        self
    }

    /// Make the first `count` engine loads fail.
    #[must_use]
    pub fn fail_loads(mut self, count: usize) -> Self {
        self.fail_loads = count;
        self
    }

    /// Initialize the bridge; the result is recorded in the world.
    #[must_use]
    pub fn initialize(mut self) -> Self {
        self.steps.push(Step::Initialize);
        self
    }

    /// Request start.
    #[must_use]
    pub fn start(mut self) -> Self {
        self.steps.push(Step::Start);
        self
    }

    /// Request stop.
    #[must_use]
    pub fn stop(mut self) -> Self {
        self.steps.push(Step::Stop);
        self
    }

    /// Request the diagnostic pass-through.
    #[must_use]
    pub fn debug(mut self) -> Self {
        self.steps.push(Step::Debug);
        self
    }

    /// Tear the bridge down.
    #[must_use]
    pub fn shutdown(mut self) -> Self {
        self.steps.push(Step::Shutdown);
        self
    }

    /// Engine reports `Ready`.
    #[must_use]
    pub fn emit_ready(mut self) -> Self {
        self.steps.push(Step::EmitReady);
        self
    }

    /// Engine reports a downstream chunk on `worker_idx`.
    #[must_use]
    pub fn emit_chunk(mut self, size: u64, worker_idx: usize) -> Self {
        self.steps.push(Step::EmitChunk { size, worker_idx });
        self
    }

    /// Engine reports a throughput sample.
    #[must_use]
    pub fn emit_throughput(mut self, bytes_per_sec: u64) -> Self {
        self.steps.push(Step::EmitThroughput { bytes_per_sec });
        self
    }

    /// Engine reports a consumer connection change in raw wire shape.
    #[must_use]
    pub fn emit_connection(mut self, state: i8, worker_idx: usize, addr: impl Into<String>) -> Self {
        self.steps.push(Step::EmitConnection { state, worker_idx, addr: addr.into() });
        self
    }

    /// The hosting page becomes hidden.
    #[must_use]
    pub fn hide_page(mut self) -> Self {
        self.steps.push(Step::HidePage);
        self
    }

    /// The hosting page becomes visible again.
    #[must_use]
    pub fn show_page(mut self) -> Self {
        self.steps.push(Step::ShowPage);
        self
    }

    /// Flip the run-in-background permission for `platform`.
    #[must_use]
    pub fn set_background_allowed(mut self, platform: Platform, allowed: bool) -> Self {
        self.steps.push(Step::SetBackgroundAllowed { platform, allowed });
        self
    }

    /// Advance simulated time by `duration`.
    #[must_use]
    pub fn advance(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Advance(duration));
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario: build the bridge with a scripted engine,
    /// run every step with a settle in between, then invoke the oracle
    /// on the final world.
    pub async fn run(self) -> Result<(), String> {
        let scenario = self.scenario;
        info!(name = %scenario.name, steps = scenario.steps.len(), "running scenario");

        let config = EngineConfig::new(scenario.target, scenario.platform);
        let loader = ScriptedLoader::with_behavior(scenario.ready_on_load, scenario.ready_on_stop);
        let engine = loader.handle();
        if scenario.fail_loads > 0 {
            engine.fail_next_loads(scenario.fail_loads);
        }

        let store = MemoryRestartStore::new();
        if scenario.restart_flag_preset {
            use peerlink_bridge::AutoRestartStore;
            store.write();
        }

        let bridge = BridgeBuilder::new(config)
            .loader(loader)
            .restart_store(store)
            .build()
            .map_err(|e| format!("Scenario '{}': bridge build failed: {e}", scenario.name))?;

        let events = Arc::new(Mutex::new(Vec::new()));
        let kinds = [
            EventKind::Ready,
            EventKind::DownstreamChunk,
            EventKind::DownstreamThroughput,
            EventKind::ConsumerConnectionChange,
        ];
        let subscriptions = kinds
            .into_iter()
            .map(|kind| {
                let events = Arc::clone(&events);
                bridge.subscribe(kind, move |event| {
                    events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
                })
            })
            .collect();

        let mut world = World {
            bridge,
            engine,
            init_results: Vec::new(),
            events,
            _subscriptions: subscriptions,
        };

        for step in scenario.steps {
            match step {
                Step::Initialize => {
                    let id = world.bridge.initialize().await;
                    world.init_results.push(id);
                },
                Step::Start => world.bridge.start().await,
                Step::Stop => world.bridge.stop().await,
                Step::Debug => world.bridge.debug().await,
                Step::Shutdown => world.bridge.shutdown().await,
                Step::EmitReady => world.engine.emit_ready(),
                Step::EmitChunk { size, worker_idx } => world.engine.emit_chunk(size, worker_idx),
                Step::EmitThroughput { bytes_per_sec } => {
                    world.engine.emit_throughput(bytes_per_sec);
                },
                Step::EmitConnection { state, worker_idx, addr } => {
                    world.engine.emit_connection(state, worker_idx, &addr);
                },
                Step::HidePage => world.bridge.set_page_visible(false),
                Step::ShowPage => world.bridge.set_page_visible(true),
                Step::SetBackgroundAllowed { platform, allowed } => {
                    world.bridge.set_background_allowed(platform, allowed);
                },
                Step::Advance(duration) => tokio::time::sleep(duration).await,
            }
            settle().await;
        }

        (self.oracle)(&world)?;

        Ok(())
    }
}

/// Final state the oracle verifies.
pub struct World {
    bridge: Bridge,
    engine: ScriptedHandle,
    init_results: Vec<Option<HandleId>>,
    events: Arc<Mutex<Vec<EngineEvent>>>,
    _subscriptions: Vec<Subscription>,
}

impl World {
    /// The bridge under test.
    #[must_use]
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// The scripted engine's counters and emitters.
    #[must_use]
    pub fn engine(&self) -> &ScriptedHandle {
        &self.engine
    }

    /// Result of each `initialize` step, in order.
    #[must_use]
    pub fn init_results(&self) -> &[Option<HandleId>] {
        &self.init_results
    }

    /// Every event published to subscribers, in publication order.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Published events of one kind.
    #[must_use]
    pub fn events_of(&self, kind: EventKind) -> Vec<EngineEvent> {
        self.events().into_iter().filter(|event| event.kind() == kind).collect()
    }

    /// Number of published `Ready` events.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.events_of(EventKind::Ready).len()
    }

    /// Bridge lifecycle state after the last step.
    #[must_use]
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.bridge.lifecycle_state()
    }

    /// Whether a deferred suspension stop is still pending.
    #[must_use]
    pub fn suspension_armed(&self) -> bool {
        self.bridge.suspension_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new("test").initialize().oracle(Box::new(|_world| Ok(())));

        // This should NOT compile - no oracle
        // let scenario = Scenario::new("test").initialize();
        // scenario.run(); // ERROR: no method `run` on type `Scenario`
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_records_init_results() {
        Scenario::new("init-recorded")
            .initialize()
            .oracle(Box::new(|world| {
                if world.init_results().len() != 1 {
                    return Err("expected one recorded initialize".to_string());
                }
                if world.init_results()[0].is_none() {
                    return Err("initialize should have succeeded".to_string());
                }
                Ok(())
            }))
            .run()
            .await
            .expect("scenario should succeed");
    }
}
