use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::daily::{DayRecord, daily_tick};
use crate::data::Design;
use crate::events::{Choice, EventDef, apply_next_day_flags};
use crate::resources::InitialSnapshot;
use crate::result::{Metrics, RunSummary, summarize};
use crate::rng::RngBundle;
use crate::state::{EngineError, RunSetup, RunState, initialize_run};

/// High-level session binding a shared design to one run and its RNG streams.
#[derive(Debug, Clone)]
pub struct RunSession {
    design: Arc<Design>,
    setup: RunSetup,
    state: RunState,
    initial: InitialSnapshot,
    rng: RngBundle,
    seed: u64,
}

/// Everything worth keeping once a run is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u64,
    pub setup: RunSetup,
    pub initial: InitialSnapshot,
    pub state: RunState,
    pub metrics: Metrics,
    pub summary: RunSummary,
}

impl RunSession {
    /// Initialize a run and snapshot its starting stocks.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError`] from run initialization.
    pub fn new(design: Arc<Design>, setup: &RunSetup, seed: u64) -> Result<Self, EngineError> {
        let state = initialize_run(&design, setup)?;
        let initial = state.snapshot();
        Ok(Self {
            design,
            setup: setup.clone(),
            state,
            initial,
            rng: RngBundle::from_user_seed(seed),
            seed,
        })
    }

    #[must_use]
    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    /// Event scheduled for the current day, if the run is still going.
    #[must_use]
    pub fn current_event(&self) -> Option<&EventDef> {
        if self.is_over() {
            return None;
        }
        self.design
            .event_for_day(&self.state.planet_key, self.state.day)
    }

    /// Choices the current event offers under the current flags.
    #[must_use]
    pub fn available_choices(&self) -> &[Choice] {
        self.current_event()
            .map(|event| event.choices_for(self.state.flags.sensor_state()))
            .unwrap_or_default()
    }

    /// Resolve pending next-day deltas, then run one tick.
    ///
    /// Returns `None` without touching the state once the run is over.
    pub fn advance(&mut self, choice_id: Option<&str>) -> Option<DayRecord> {
        if self.is_over() {
            return None;
        }
        apply_next_day_flags(&mut self.state);
        let mut risk_rng = self.rng.risk();
        Some(daily_tick(
            &self.design,
            &mut self.state,
            choice_id,
            &mut *risk_rng,
        ))
    }

    /// Play to the end, asking `choose` for a choice id each day.
    pub fn run_to_end<F>(&mut self, mut choose: F)
    where
        F: FnMut(&Self) -> Option<String>,
    {
        while !self.is_over() {
            let choice = choose(self);
            self.advance(choice.as_deref());
        }
    }

    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.summary().metrics
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        summarize(&self.design, &self.state, &self.initial)
    }

    #[must_use]
    pub fn design(&self) -> &Design {
        &self.design
    }

    #[must_use]
    pub const fn state(&self) -> &RunState {
        &self.state
    }

    #[must_use]
    pub const fn initial(&self) -> &InitialSnapshot {
        &self.initial
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// RNG streams; drivers draw their own decisions from `policy()`.
    #[must_use]
    pub const fn rng_bundle(&self) -> &RngBundle {
        &self.rng
    }

    /// Consume the session and score it.
    #[must_use]
    pub fn finish(self) -> RunReport {
        let summary = self.summary();
        RunReport {
            seed: self.seed,
            setup: self.setup,
            initial: self.initial,
            metrics: summary.metrics,
            summary,
            state: self.state,
        }
    }
}
