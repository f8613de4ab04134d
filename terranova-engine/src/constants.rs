//! Centralized balance and tuning constants for TerraNova engine logic.
//!
//! Content (planets, modules, events, metabolism rates) comes from the design
//! catalog. The values here are structural: they define how the engine reads
//! that content and how results are rounded, so they only change through
//! reviewed code.

use crate::resources::Resource;

// Run setup ----------------------------------------------------------------
/// Crew size the design's base stocks are authored for.
pub(crate) const BASELINE_CREW: u32 = 3;
pub(crate) const VITAL_MIN: f64 = 0.0;
pub(crate) const VITAL_MAX: f64 = 100.0;
pub(crate) const STOCK_FLOOR: f64 = 0.0;
pub(crate) const DEFAULT_PROTECTED_MODULE: &str = "hab_dome";

// Metabolism ---------------------------------------------------------------
/// Crew power draw is a flat per-person figure; only O2/H2O/Food scale with
/// the planet's metabolism modifier.
pub(crate) const POWER_METABOLISM_USES_PLANET_MODIFIER: bool = false;

// Event flags --------------------------------------------------------------
pub(crate) const SENSOR_FIXED_FLAG: &str = "sensor_fixed";
pub(crate) const PER_DAY_SUFFIX: &str = "_per_day";
/// Resources a `_per_day` delta may recur on.
pub(crate) const ONGOING_RESOURCES: [Resource; 2] = [Resource::Oxygen, Resource::Health];
pub(crate) const NEXT_DAY_SUFFIX: &str = "_next_day";
pub(crate) const SACRIFICE_MODULE_KEY: &str = "sacrifice_module";
pub(crate) const RISK_KEY: &str = "risk";

// Expression defaults ------------------------------------------------------
/// Substitute for an unresolvable `planet.<key>` in a plain planet formula.
pub(crate) const PLANET_FIELD_MISSING: f64 = 0.0;
/// Substitute for an unresolvable `planet.<key>` in an `hvac_base` formula.
pub(crate) const PLANET_FIELD_NEUTRAL: f64 = 1.0;

// Ledger and scoring -------------------------------------------------------
pub(crate) const STOCK_DECIMALS: u32 = 2;
pub(crate) const METRIC_DECIMALS: u32 = 1;
pub(crate) const RATIO_EPSILON: f64 = 1e-9;
pub(crate) const RESOURCE_SCORE_WEIGHT: f64 = 50.0;
pub(crate) const EFFICIENCY_SCALE: f64 = 100.0;
pub(crate) const EXCELLENT_SCORE_THRESHOLD: f64 = 200.0;
pub(crate) const EXCELLENT_POWER_BALANCE_MIN: f64 = 0.0;

// Loadout ------------------------------------------------------------------
pub(crate) const CREW_CAPACITY_KEY: &str = "crew";

// RNG stream domains -------------------------------------------------------
pub(crate) const RNG_DOMAIN_RISK: &[u8] = b"risk";
pub(crate) const RNG_DOMAIN_POLICY: &[u8] = b"policy";

#[cfg(test)]
pub(crate) const FLOAT_EPSILON: f64 = 1e-9;
