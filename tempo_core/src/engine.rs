//! Target-control engine.
//!
//! Owns the live (strategy, state, config) triple, feeds every `hr:reading`
//! through the strategy and republishes the outcome. Per reading it publishes,
//! in this order:
//!
//! 1. `algo:modeChanged`, only if the mode changed
//! 2. `algo:stateChanged`, always
//! 3. `algo:target`, only if the strategy emitted one
//!
//! Consumers registered after the engine rely on this order.

use crate::bus::{EventBus, SubscriptionId, WeakEventBus};
use crate::clock::Clock;
use crate::events::topic;
use crate::strategy::{strategy_for, Computation, Strategy, StrategyKind};
use crate::{AlgorithmConfig, AlgorithmState, BpmTarget, HeartRateReading, ModeChange};
use std::cell::RefCell;
use std::rc::Rc;

struct EngineCore {
    strategy: Box<dyn Strategy>,
    state: AlgorithmState,
    config: AlgorithmConfig,
}

/// What one reading produced, ready to publish
struct Step {
    mode_change: Option<ModeChange>,
    state: AlgorithmState,
    target: Option<BpmTarget>,
}

impl EngineCore {
    fn step(&mut self, reading: &HeartRateReading) -> Step {
        let previous_mode = self.state.current_mode;
        let Computation { next_state, target } =
            self.strategy.compute(reading, &self.state, &self.config);
        self.state = next_state;

        let mode_change = (self.state.current_mode != previous_mode).then(|| ModeChange {
            from: previous_mode,
            to: self.state.current_mode,
            timestamp: reading.timestamp,
        });

        Step {
            mode_change,
            state: self.state.clone(),
            target,
        }
    }

    fn reset(&mut self, strategy: Box<dyn Strategy>, now_ms: i64) {
        self.state = strategy.initial_state(&self.config, now_ms);
        self.strategy = strategy;
    }
}

/// Drives a [`Strategy`] from the heart-rate stream
pub struct TargetEngine {
    bus: EventBus,
    clock: Rc<dyn Clock>,
    core: Rc<RefCell<EngineCore>>,
    subscription: Option<SubscriptionId>,
}

impl TargetEngine {
    pub fn new(bus: EventBus, config: AlgorithmConfig, clock: Rc<dyn Clock>) -> Self {
        let strategy = strategy_for(config.strategy);
        let state = strategy.initial_state(&config, clock.now_ms());
        Self {
            bus,
            clock,
            core: Rc::new(RefCell::new(EngineCore {
                strategy,
                state,
                config,
            })),
            subscription: None,
        }
    }

    /// Subscribe to `hr:reading`. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if self.subscription.is_some() {
            return;
        }

        let core = Rc::clone(&self.core);
        let bus = self.bus.downgrade();
        let id = self
            .bus
            .on::<topic::HrReading, _>(move |reading| on_reading(&core, &bus, reading));
        self.subscription = Some(id);

        tracing::info!(
            "Target engine started ({} strategy)",
            self.core.borrow().strategy.kind()
        );
    }

    /// Unsubscribe. The state is kept as-is until the next start.
    pub fn stop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.bus.unsubscribe(id);
            tracing::info!("Target engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Replace the configuration, effective from the next reading.
    ///
    /// Switching to a different strategy re-initializes the state and drops
    /// the reading history.
    pub fn update_config(&self, config: AlgorithmConfig) {
        let mut core = self.core.borrow_mut();
        let switch = config.strategy != core.strategy.kind();
        core.config = config;
        if switch {
            let kind = core.config.strategy;
            core.reset(strategy_for(kind), self.clock.now_ms());
            tracing::info!("Switched to {} strategy", kind);
        }
    }

    /// Swap in a strategy and start it from its initial state
    pub fn set_strategy(&self, kind: StrategyKind) {
        let mut core = self.core.borrow_mut();
        core.config.strategy = kind;
        core.reset(strategy_for(kind), self.clock.now_ms());
        tracing::info!("Strategy set to {}", kind);
    }

    pub fn state(&self) -> AlgorithmState {
        self.core.borrow().state.clone()
    }

    pub fn config(&self) -> AlgorithmConfig {
        self.core.borrow().config.clone()
    }
}

impl Drop for TargetEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn on_reading(core: &RefCell<EngineCore>, bus: &WeakEventBus, reading: &HeartRateReading) {
    let Some(bus) = bus.upgrade() else {
        return;
    };

    // The borrow ends here; subscribers may query or reconfigure the engine
    let step = core.borrow_mut().step(reading);

    if let Some(change) = step.mode_change {
        tracing::debug!("Mode changed {} -> {}", change.from, change.to);
        bus.emit::<topic::AlgoModeChanged>(change);
    }
    bus.emit::<topic::AlgoStateChanged>(step.state);
    if let Some(target) = step.target {
        tracing::debug!("New target {} BPM: {}", target.target_bpm, target.reason);
        bus.emit::<topic::AlgoTarget>(target);
    }
}
