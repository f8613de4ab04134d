//! TerraNova Simulation Engine
//!
//! Platform-agnostic core logic for the TerraNova habitat survival game:
//! content catalog, effect formulas, the daily tick, event choices and
//! end-of-run scoring. This crate performs no I/O beyond parsing JSON handed
//! to it.

mod constants;
pub mod daily;
pub mod data;
pub mod events;
pub mod expr;
pub mod loadout;
pub mod numbers;
pub mod resources;
pub mod result;
pub mod rng;
pub mod session;
pub mod state;

use rand::Rng;
use std::sync::Arc;

// Re-export commonly used types
pub use daily::{DayRecord, daily_tick};
pub use data::{
    CascadeRules, CrewCostRules, Design, DesignError, EffectMap, EndingMessages, GameMeta,
    GameRules, HvacRules, Metabolism, ModuleDef, Planet, PlanetFlavor, PlanetModifiers,
};
pub use events::{
    Choice, ChoiceDelta, DeltaOp, EventBranch, EventDef, FlagMap, FlagValue, RawDelta, Risk,
    RiskOutcome, apply_choice_delta, apply_next_day_flags, pick_choice,
};
pub use expr::{EffectValue, EvalContext, evaluate_str};
pub use loadout::{LoadoutCost, LoadoutError, crew_cost, validate_loadout};
pub use resources::{
    FailureSet, InitialSnapshot, PowerLog, Resource, ResourceDelta, ResourceLedger, StockSnapshot,
};
pub use result::{Metrics, RunSummary, Verdict, compute_metrics, summarize};
pub use rng::{CountingRng, RngBundle};
pub use session::{RunReport, RunSession};
pub use state::{EngineError, RunFlags, RunSetup, RunState, initialize_run};

/// Trait for abstracting where a design catalog comes from.
/// Platform-specific implementations should provide this
pub trait DesignLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the design catalog from the platform-specific source
    ///
    /// # Errors
    ///
    /// Returns an error if the design cannot be loaded or fails validation.
    fn load_design(&self) -> Result<Design, Self::Error>;
}

/// Loader for the design bundled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDesignLoader;

impl DesignLoader for StaticDesignLoader {
    type Error = DesignError;

    fn load_design(&self) -> Result<Design, Self::Error> {
        Design::load_from_static()
    }
}

/// Main engine facade binding one loaded design to its entry points.
#[derive(Debug, Clone)]
pub struct Engine {
    design: Arc<Design>,
}

impl Engine {
    /// Load a design through `loader`.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the design cannot be produced.
    pub fn new<L: DesignLoader>(loader: &L) -> Result<Self, L::Error> {
        loader.load_design().map(Self::from_design)
    }

    #[must_use]
    pub fn from_design(design: Design) -> Self {
        Self {
            design: Arc::new(design),
        }
    }

    #[must_use]
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// Shared handle to the loaded design.
    #[must_use]
    pub fn shared_design(&self) -> Arc<Design> {
        Arc::clone(&self.design)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::UnknownPlanet`] or [`EngineError::EmptyCrew`].
    pub fn initialize_run(&self, setup: &RunSetup) -> Result<RunState, EngineError> {
        initialize_run(&self.design, setup)
    }

    pub fn daily_tick<R>(
        &self,
        state: &mut RunState,
        choice_id: Option<&str>,
        rng: &mut R,
    ) -> DayRecord
    where
        R: Rng + ?Sized,
    {
        daily_tick(&self.design, state, choice_id, rng)
    }

    pub fn apply_next_day_flags(&self, state: &mut RunState) {
        apply_next_day_flags(state);
    }

    #[must_use]
    pub fn compute_metrics(&self, state: &RunState, initial: &InitialSnapshot) -> Metrics {
        compute_metrics(&self.design, state, initial)
    }

    /// # Errors
    ///
    /// Returns the first loadout rule the selection breaks.
    pub fn validate_loadout(&self, setup: &RunSetup) -> Result<LoadoutCost, LoadoutError> {
        validate_loadout(&self.design, setup.crew, &setup.modules)
    }

    /// Construct a seeded run session.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be initialized.
    pub fn create_session(&self, setup: &RunSetup, seed: u64) -> Result<RunSession, EngineError> {
        RunSession::new(self.shared_design(), setup, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl DesignLoader for FixtureLoader {
        type Error = Infallible;

        fn load_design(&self) -> Result<Design, Self::Error> {
            let mut design = Design::load_from_static().unwrap();
            design.game.days = 2;
            Ok(design)
        }
    }

    #[test]
    fn engine_loads_bundled_design() {
        let engine = Engine::new(&StaticDesignLoader).unwrap();
        assert_eq!(engine.design().game.title, "TerraNova");
        assert!(engine.design().planet("proximab").is_some());
    }

    #[test]
    fn engine_drives_a_run_with_custom_loader() {
        let engine = Engine::new(&FixtureLoader).unwrap();
        let setup = RunSetup::new("kepler22b", 3, ["hab_dome", "battery", "solar_array"]);
        let mut state = engine.initialize_run(&setup).unwrap();
        let initial = state.snapshot();
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        while !state.is_over() {
            engine.apply_next_day_flags(&mut state);
            engine.daily_tick(&mut state, None, &mut rng);
        }
        assert_eq!(state.day, 3);
        let metrics = engine.compute_metrics(&state, &initial);
        assert!(metrics.verdict.is_success());
    }

    #[test]
    fn engine_sessions_share_the_design() {
        let engine = Engine::new(&StaticDesignLoader).unwrap();
        let setup = RunSetup::new("trappist1e", 3, ["hab_dome"]);
        let session = engine.create_session(&setup, 11).unwrap();
        assert_eq!(session.seed(), 11);
        assert!(Arc::ptr_eq(&engine.shared_design(), &engine.shared_design()));
        assert_eq!(engine.validate_loadout(&setup).unwrap().total, 32);
    }

    #[test]
    fn engine_rejects_unknown_planet() {
        let engine = Engine::new(&StaticDesignLoader).unwrap();
        let setup = RunSetup::new("hoth", 3, ["hab_dome"]);
        assert!(matches!(
            engine.create_session(&setup, 1),
            Err(EngineError::UnknownPlanet(planet)) if planet == "hoth"
        ));
    }
}
