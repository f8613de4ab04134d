//! Mutable run state and run initialization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{BASELINE_CREW, SENSOR_FIXED_FLAG};
use crate::daily::DayRecord;
use crate::data::{Design, Planet};
use crate::events::{FlagMap, FlagValue};
use crate::expr::EvalContext;
use crate::resources::{InitialSnapshot, PowerLog, Resource, ResourceDelta, ResourceLedger};

/// Errors that prevent a run from starting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unknown planet: {0}")]
    UnknownPlanet(String),
    #[error("a run needs at least one crew member")]
    EmptyCrew,
}

/// What the player picked before launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSetup {
    pub planet_key: String,
    pub crew: u32,
    pub modules: Vec<String>,
}

impl RunSetup {
    #[must_use]
    pub fn new<I, S>(planet_key: impl Into<String>, crew: u32, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            planet_key: planet_key.into(),
            crew,
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }
}

/// Named flags set by choices, and queued next-day deltas.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunFlags {
    #[serde(default)]
    pub named: FlagMap,
    #[serde(default)]
    pub next_day: ResourceDelta,
}

impl RunFlags {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.named.get(name)
    }

    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(FlagValue::is_truthy)
    }

    #[must_use]
    pub fn sensor_fixed(&self) -> bool {
        self.is_set(SENSOR_FIXED_FLAG)
    }

    /// The sensor flag's truthiness, or `None` while no choice has set it.
    #[must_use]
    pub fn sensor_state(&self) -> Option<bool> {
        self.get(SENSOR_FIXED_FLAG).map(FlagValue::is_truthy)
    }
}

/// Everything that changes while a run is played.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunState {
    pub day: u32,
    pub days_total: u32,
    pub crew: u32,
    pub planet_key: String,
    pub planet: Planet,
    #[serde(flatten)]
    pub ledger: ResourceLedger,
    pub modules: Vec<String>,
    /// Recurring per-day deltas installed by past choices.
    #[serde(default)]
    pub ongoing: ResourceDelta,
    #[serde(default)]
    pub flags: RunFlags,
    #[serde(flatten)]
    pub power_log: PowerLog,
    pub successful_choices: u32,
    pub counted_choices: u32,
    #[serde(default)]
    pub history: Vec<DayRecord>,
}

impl RunState {
    /// Stocks as they stand now.
    #[must_use]
    pub const fn snapshot(&self) -> InitialSnapshot {
        self.ledger.stocks()
    }

    #[must_use]
    pub const fn days_completed(&self) -> bool {
        self.day > self.days_total
    }

    /// A run ends after its last day or once a fatal resource is exhausted.
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.days_completed() || self.ledger.exhausted_fatal().is_some()
    }

    pub(crate) const fn eval_context<'a>(&'a self, hvac_base: f64) -> EvalContext<'a> {
        EvalContext {
            crew_count: self.crew,
            planet: Some(&self.planet),
            hvac_base,
        }
    }
}

/// Build the day-one state for a planet, crew and module selection.
///
/// Stocks start at the design baseline scaled by `crew / 3`, then the
/// planet's start adjustments and each installed module's start bonus are
/// added. Unknown module ids are kept in the run but contribute nothing.
///
/// # Errors
///
/// Returns [`EngineError::UnknownPlanet`] when the planet key is not in the
/// design and [`EngineError::EmptyCrew`] for a crew of zero.
pub fn initialize_run(design: &Design, setup: &RunSetup) -> Result<RunState, EngineError> {
    let planet = design
        .planet(&setup.planet_key)
        .ok_or_else(|| EngineError::UnknownPlanet(setup.planet_key.clone()))?;
    if setup.crew == 0 {
        return Err(EngineError::EmptyCrew);
    }

    let mut state = RunState {
        day: 1,
        days_total: design.game.days,
        crew: setup.crew,
        planet_key: setup.planet_key.clone(),
        planet: planet.clone(),
        modules: setup.modules.clone(),
        ..RunState::default()
    };

    let crew_scale = f64::from(setup.crew) / f64::from(BASELINE_CREW);
    let base = design.rules.base_stocks;
    for resource in Resource::STOCKS {
        let authored = match resource {
            Resource::Oxygen => base.oxygen,
            Resource::Water => base.water,
            Resource::Food => base.food,
            _ => base.power,
        };
        state.ledger.apply(resource, authored * crew_scale);
    }

    for (&resource, &amount) in &planet.start_adjustments {
        if resource.is_stock() {
            state.ledger.apply(resource, amount);
        }
    }

    let ctx = state.eval_context(design.rules.hvac.base_power);
    let mut bonuses = ResourceDelta::new();
    for module_id in &state.modules {
        let Some(module) = design.find_component_by_id(module_id) else {
            log::warn!("run setup references unknown module {module_id}; skipping");
            continue;
        };
        let Some(bonus) = design.start_bonus_for(module) else {
            continue;
        };
        for (&resource, value) in bonus {
            if resource.is_stock() {
                *bonuses.entry(resource).or_insert(0.0) += value.evaluate(&ctx);
            }
        }
    }
    state.ledger.apply_changes(&bonuses);

    log::debug!(
        "initialized run on {} with crew {}: {:?}",
        state.planet_key,
        state.crew,
        state.ledger
    );
    Ok(state)
}
