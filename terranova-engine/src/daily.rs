//! The ordered per-day state transition.
//!
//! One tick runs, in order: event resolution, module daily effects, crew
//! metabolism, baseline vital decay, ongoing O2 and Health per-day effects,
//! clamp with failure cascade and power logging, then the day advance.
//! Reordering these steps changes outcomes.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{ONGOING_RESOURCES, POWER_METABOLISM_USES_PLANET_MODIFIER};
use crate::data::{CascadeRules, Design, Metabolism};
use crate::events::{RiskOutcome, apply_choice_delta, pick_choice};
use crate::expr::EvalContext;
use crate::numbers::usize_to_f64;
use crate::resources::{FailureSet, Resource, ResourceDelta, ResourceLedger};
use crate::state::RunState;

/// What happened on one simulated day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayRecord {
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskOutcome>,
    pub power_produced: f64,
    pub power_consumed: f64,
    #[serde(default)]
    pub failures: FailureSet,
    /// Ledger at the end of the day, after clamping.
    pub ledger: ResourceLedger,
}

impl DayRecord {
    #[must_use]
    pub fn new(day: u32) -> Self {
        Self {
            day,
            ..Self::default()
        }
    }
}

/// Advance `state` by exactly one day.
///
/// `choice_id` picks among the day's event choices; an unknown or missing id
/// falls back to the first choice. Pending next-day deltas are not consumed
/// here; call [`crate::events::apply_next_day_flags`] before each tick.
pub fn daily_tick<R>(
    design: &Design,
    state: &mut RunState,
    choice_id: Option<&str>,
    rng: &mut R,
) -> DayRecord
where
    R: Rng + ?Sized,
{
    let mut record = DayRecord::new(state.day);

    if let Some(event) = design.event_for_day(&state.planet_key, state.day) {
        let choices = event.choices_for(state.flags.sensor_state());
        if let Some(choice) = pick_choice(choices, choice_id) {
            record.event = Some(event.title.clone());
            record.choice = Some(choice.id.clone());
            record.risk = apply_choice_delta(state, choice, &design.rules, rng);
        }
    }

    let (produced, module_draw) = apply_module_effects(design, state);
    let crew_draw = apply_metabolism(
        &design.rules.metabolism,
        state.planet.modifiers.metabolism,
        state.crew,
        &mut state.ledger,
    );
    let consumed = module_draw + crew_draw;

    state
        .ledger
        .apply(Resource::Health, design.rules.metabolism.health_delta);
    state
        .ledger
        .apply(Resource::Morale, design.rules.metabolism.morale_delta);

    for resource in ONGOING_RESOURCES {
        if let Some(&amount) = state.ongoing.get(&resource)
            && amount != 0.0
        {
            state.ledger.apply(resource, amount);
        }
    }

    let failures = clamp_with_cascade(&design.rules.cascade, &mut state.ledger);
    state.power_log.record(produced, consumed);

    log::debug!(
        "day {} on {}: event={:?} choice={:?} produced={produced:.2} consumed={consumed:.2} failures={failures:?}",
        state.day,
        state.planet_key,
        record.event,
        record.choice,
    );

    state.day += 1;

    record.power_produced = produced;
    record.power_consumed = consumed;
    record.failures = failures;
    record.ledger = state.ledger;
    state.history.push(record.clone());
    record
}

/// Sum stock deltas across modules and apply them once; vitals apply per
/// module. Returns the day's produced and consumed power from modules.
fn apply_module_effects(design: &Design, state: &mut RunState) -> (f64, f64) {
    let ctx = EvalContext {
        crew_count: state.crew,
        planet: Some(&state.planet),
        hvac_base: design.rules.hvac.base_power,
    };
    let mut stock_totals = ResourceDelta::new();
    for module_id in &state.modules {
        let Some(module) = design.find_component_by_id(module_id) else {
            log::trace!("module {module_id} not in catalog; no daily effect");
            continue;
        };
        for (&resource, value) in &module.daily_effects {
            let amount = value.evaluate(&ctx);
            if resource.is_stock() {
                *stock_totals.entry(resource).or_insert(0.0) += amount;
            } else {
                state.ledger.apply(resource, amount);
            }
        }
    }
    state.ledger.apply_changes(&stock_totals);

    let net_power = stock_totals.get(&Resource::Power).copied().unwrap_or(0.0);
    (net_power.max(0.0), (-net_power).max(0.0))
}

/// Crew consumption of every stock. Returns the power drawn.
fn apply_metabolism(
    metabolism: &Metabolism,
    planet_metabolism: f64,
    crew: u32,
    ledger: &mut ResourceLedger,
) -> f64 {
    let crew = f64::from(crew);
    let mut power_draw = 0.0;
    for resource in Resource::STOCKS {
        let scaled = resource != Resource::Power || POWER_METABOLISM_USES_PLANET_MODIFIER;
        let modifier = if scaled { planet_metabolism } else { 1.0 };
        let delta = -metabolism.rate(resource) * crew * modifier;
        ledger.apply(resource, delta);
        if resource == Resource::Power {
            power_draw = (-delta).max(0.0);
        }
    }
    power_draw
}

/// Clamp, then charge Health for every failed stock and Morale once if
/// Health failed, then clamp again.
fn clamp_with_cascade(rules: &CascadeRules, ledger: &mut ResourceLedger) -> FailureSet {
    let mut failures = ledger.clamp_and_check();
    let failed_stocks = failures.iter().filter(|resource| resource.is_stock()).count();
    if failed_stocks == 0 && !failures.contains(&Resource::Health) {
        return failures;
    }

    if failed_stocks > 0 {
        ledger.apply(
            Resource::Health,
            rules.health_per_failed_stock * usize_to_f64(failed_stocks),
        );
    }
    if failures.contains(&Resource::Health) || ledger.health < 0.0 {
        ledger.apply(Resource::Morale, rules.morale_on_health_failure);
    }
    for late in ledger.clamp_and_check() {
        if !failures.contains(&late) {
            failures.push(late);
        }
    }
    failures
}
