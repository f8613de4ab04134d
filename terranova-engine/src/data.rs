//! Content catalog: planets, modules, events, rule constants and endings.
//!
//! The catalog is loaded once and treated as immutable input. Every rule
//! field carries a serde default matching the bundled content so partial
//! designs remain usable in tests and tooling.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::constants::DEFAULT_PROTECTED_MODULE;
use crate::events::EventDef;
use crate::expr::EffectValue;
use crate::resources::{Resource, ResourceDelta, StockSnapshot};

const BUNDLED_DESIGN: &str = include_str!("../assets/data/design.json");

/// Resource name to literal-or-formula effect.
pub type EffectMap = BTreeMap<Resource, EffectValue>;

/// Errors raised while loading or validating a design catalog.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("design JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("game.days must be at least 1 (got {0})")]
    InvalidDays(u32),
    #[error("design declares no planets")]
    NoPlanets,
    #[error("event on {planet} is scheduled for day {day}, outside 1..={days}")]
    EventDayOutOfRange { planet: String, day: u32, days: u32 },
    #[error("risk probability {prob} on {planet} day {day} choice {choice} is outside [0, 1]")]
    RiskProbability {
        planet: String,
        day: u32,
        choice: String,
        prob: f64,
    },
    #[error("module id {0} appears more than once in the catalog")]
    DuplicateModule(String),
    #[error("rule {field} must not be negative (got {value})")]
    NegativeRule { field: &'static str, value: f64 },
}

/// Game-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMeta {
    #[serde(default = "GameMeta::default_title")]
    pub title: String,
    #[serde(default = "GameMeta::default_days")]
    pub days: u32,
    #[serde(default = "GameMeta::default_points_budget")]
    pub points_budget: u32,
}

impl GameMeta {
    fn default_title() -> String {
        "TerraNova".to_string()
    }

    const fn default_days() -> u32 {
        5
    }

    const fn default_points_budget() -> u32 {
        100
    }
}

impl Default for GameMeta {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            days: Self::default_days(),
            points_budget: Self::default_points_budget(),
        }
    }
}

/// Per-person daily consumption and the baseline vital decay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metabolism {
    #[serde(rename = "O2")]
    pub oxygen: f64,
    #[serde(rename = "H2O")]
    pub water: f64,
    #[serde(rename = "Food")]
    pub food: f64,
    #[serde(rename = "Power")]
    pub power: f64,
    #[serde(rename = "Health_delta")]
    pub health_delta: f64,
    #[serde(rename = "Morale_delta")]
    pub morale_delta: f64,
}

impl Default for Metabolism {
    fn default() -> Self {
        Self {
            oxygen: 0.84,
            water: 3.0,
            food: 0.6,
            power: 1.0,
            health_delta: -2.0,
            morale_delta: -2.0,
        }
    }
}

impl Metabolism {
    /// Per-person consumption rate of a stock; vitals have none.
    #[must_use]
    pub const fn rate(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Oxygen => self.oxygen,
            Resource::Water => self.water,
            Resource::Food => self.food,
            Resource::Power => self.power,
            Resource::Health | Resource::Morale => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvacRules {
    #[serde(rename = "hvac_base_power_kwh_per_day")]
    pub base_power: f64,
}

impl Default for HvacRules {
    fn default() -> Self {
        Self { base_power: 2.0 }
    }
}

/// Secondary penalties applied after a tick's clamp reports failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeRules {
    pub health_per_failed_stock: f64,
    pub morale_on_health_failure: f64,
}

impl Default for CascadeRules {
    fn default() -> Self {
        Self {
            health_per_failed_stock: -10.0,
            morale_on_health_failure: -10.0,
        }
    }
}

/// Points charged per crew member during loadout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewCostRules {
    pub base_members: u32,
    pub per_base_member: u32,
    pub per_extra_member: u32,
}

impl Default for CrewCostRules {
    fn default() -> Self {
        Self {
            base_members: 3,
            per_base_member: 4,
            per_extra_member: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    #[serde(
        rename = "base_stocks_for_3_crew_5_days",
        default = "GameRules::default_base_stocks"
    )]
    pub base_stocks: StockSnapshot,
    #[serde(rename = "per_person_daily_metabolism", default)]
    pub metabolism: Metabolism,
    #[serde(default)]
    pub hvac: HvacRules,
    #[serde(default)]
    pub cascade: CascadeRules,
    #[serde(default)]
    pub crew_cost: CrewCostRules,
    #[serde(default = "GameRules::default_protected_modules")]
    pub protected_modules: Vec<String>,
}

impl GameRules {
    const fn default_base_stocks() -> StockSnapshot {
        StockSnapshot {
            oxygen: 15.0,
            water: 60.0,
            food: 12.0,
            power: 80.0,
        }
    }

    fn default_protected_modules() -> Vec<String> {
        vec![DEFAULT_PROTECTED_MODULE.to_string()]
    }

    /// Whether `module_id` may never be sacrificed and must be installed.
    #[must_use]
    pub fn is_protected(&self, module_id: &str) -> bool {
        self.protected_modules.iter().any(|id| id == module_id)
    }

    fn validate(&self) -> Result<(), DesignError> {
        let checks = [
            ("base_stocks.O2", self.base_stocks.oxygen),
            ("base_stocks.H2O", self.base_stocks.water),
            ("base_stocks.Food", self.base_stocks.food),
            ("base_stocks.Power", self.base_stocks.power),
            ("metabolism.O2", self.metabolism.oxygen),
            ("metabolism.H2O", self.metabolism.water),
            ("metabolism.Food", self.metabolism.food),
            ("metabolism.Power", self.metabolism.power),
            ("hvac.base_power", self.hvac.base_power),
        ];
        for (field, value) in checks {
            if value < 0.0 {
                return Err(DesignError::NegativeRule { field, value });
            }
        }
        Ok(())
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            base_stocks: Self::default_base_stocks(),
            metabolism: Metabolism::default(),
            hvac: HvacRules::default(),
            cascade: CascadeRules::default(),
            crew_cost: CrewCostRules::default(),
            protected_modules: Self::default_protected_modules(),
        }
    }
}

/// Environmental multipliers; all default to neutral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetModifiers {
    pub metabolism: f64,
    pub solar: f64,
    pub hvac: f64,
    pub water_eff: f64,
    pub shield_need: f64,
}

impl Default for PlanetModifiers {
    fn default() -> Self {
        Self {
            metabolism: 1.0,
            solar: 1.0,
            hvac: 1.0,
            water_eff: 1.0,
            shield_need: 0.0,
        }
    }
}

impl PlanetModifiers {
    fn get(&self, key: &str) -> Option<f64> {
        match key {
            "metabolism" => Some(self.metabolism),
            "solar" => Some(self.solar),
            "hvac" => Some(self.hvac),
            "water_eff" => Some(self.water_eff),
            "shield_need" => Some(self.shield_need),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Planet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
    #[serde(
        rename = "distFromEarth",
        alias = "dist_from_earth",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dist_from_earth: Option<f64>,
    #[serde(
        rename = "surfaceGravity",
        alias = "surface_gravity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub surface_gravity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star: Option<String>,
    #[serde(default)]
    pub modifiers: PlanetModifiers,
    #[serde(default)]
    pub start_adjustments: ResourceDelta,
}

impl Planet {
    /// Resolve a `planet.<key>` reference: modifiers first, then numeric
    /// top-level fields.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<f64> {
        self.modifiers.get(key).or(match key {
            "difficulty" => self.difficulty,
            "distFromEarth" | "dist_from_earth" => self.dist_from_earth,
            "surfaceGravity" | "surface_gravity" => self.surface_gravity,
            _ => None,
        })
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// An installable habitat component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cost: u32,
    #[serde(default)]
    pub daily_effects: EffectMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_bonus: Option<EffectMap>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charges: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ModuleDef {
    #[must_use]
    pub fn capacity_for(&self, key: &str) -> u32 {
        self.capacity.get(key).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanetFlavor {
    #[serde(default)]
    pub success: String,
    #[serde(default)]
    pub failure: String,
}

/// Narrative closing text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndingMessages {
    pub success_generic: String,
    pub failure_generic: String,
    pub by_cause: BTreeMap<Resource, String>,
    pub planet_flavor: BTreeMap<String, PlanetFlavor>,
}

/// The complete content catalog a run is played against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub game: GameMeta,
    #[serde(default)]
    pub rules: GameRules,
    pub planets: BTreeMap<String, Planet>,
    #[serde(default)]
    pub components: BTreeMap<String, Vec<ModuleDef>>,
    #[serde(default)]
    pub start_bonuses: BTreeMap<String, EffectMap>,
    #[serde(default)]
    pub events: BTreeMap<String, Vec<EventDef>>,
    #[serde(default)]
    pub endings: EndingMessages,
}

impl Design {
    /// Parse and validate a design from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::Json`] when the text does not match the catalog
    /// shape, or a validation variant when the content is inconsistent.
    pub fn from_json(json: &str) -> Result<Self, DesignError> {
        let design: Self = serde_json::from_str(json)?;
        design.validate()?;
        design.log_inert_deltas();
        Ok(design)
    }

    /// Load the design bundled with the engine.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bundled asset is corrupt.
    pub fn load_from_static() -> Result<Self, DesignError> {
        Self::from_json(BUNDLED_DESIGN)
    }

    /// Check cross-field consistency of the catalog.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), DesignError> {
        if self.game.days == 0 {
            return Err(DesignError::InvalidDays(self.game.days));
        }
        if self.planets.is_empty() {
            return Err(DesignError::NoPlanets);
        }
        self.rules.validate()?;

        let mut seen = BTreeSet::new();
        for module in self.modules() {
            if !seen.insert(module.id.as_str()) {
                return Err(DesignError::DuplicateModule(module.id.clone()));
            }
        }

        for (planet, events) in &self.events {
            for event in events {
                if event.day == 0 || event.day > self.game.days {
                    return Err(DesignError::EventDayOutOfRange {
                        planet: planet.clone(),
                        day: event.day,
                        days: self.game.days,
                    });
                }
                for choice in event.all_choices() {
                    if let Some(prob) = choice.delta.invalid_risk_probability() {
                        return Err(DesignError::RiskProbability {
                            planet: planet.clone(),
                            day: event.day,
                            choice: choice.id.clone(),
                            prob,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn log_inert_deltas(&self) {
        for (planet, events) in &self.events {
            for event in events {
                for choice in event.all_choices() {
                    for key in choice.delta.inert_keys() {
                        log::warn!(
                            "{planet} day {} choice {}: delta key {key:?} has no engine effect",
                            event.day,
                            choice.id
                        );
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn planet(&self, key: &str) -> Option<&Planet> {
        self.planets.get(key)
    }

    /// Every module across all groups.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleDef> {
        self.components.values().flatten()
    }

    /// First module with the given id across all groups.
    #[must_use]
    pub fn find_component_by_id(&self, id: &str) -> Option<&ModuleDef> {
        self.modules().find(|module| module.id == id)
    }

    /// One-time start bonus of a module: its own, else the catalog fallback.
    #[must_use]
    pub fn start_bonus_for<'a>(&'a self, module: &'a ModuleDef) -> Option<&'a EffectMap> {
        module
            .start_bonus
            .as_ref()
            .or_else(|| self.start_bonuses.get(&module.id))
    }

    #[must_use]
    pub fn events_for(&self, planet_key: &str) -> &[EventDef] {
        self.events
            .get(planet_key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn event_for_day(&self, planet_key: &str, day: u32) -> Option<&EventDef> {
        self.events_for(planet_key)
            .iter()
            .find(|event| event.day == day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundled() -> Design {
        Design::load_from_static().unwrap()
    }

    #[test]
    fn bundled_design_loads() {
        let design = bundled();
        assert_eq!(design.game.days, 5);
        assert_eq!(design.game.points_budget, 100);
        assert_eq!(design.planets.len(), 5);
        assert_eq!(design.modules().count(), 20);
        assert!(design.rules.is_protected("hab_dome"));
        assert!((design.rules.hvac.base_power - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn finds_components_across_groups() {
        let design = bundled();
        let dome = design.find_component_by_id("hab_dome").unwrap();
        assert_eq!(dome.capacity_for("crew"), 4);
        let solar = design.find_component_by_id("solar_array").unwrap();
        assert_eq!(
            solar.daily_effects.get(&Resource::Power),
            Some(&EffectValue::from("6 * planet.solar"))
        );
        assert!(design.find_component_by_id("warp_core").is_none());
    }

    #[test]
    fn start_bonus_prefers_module_then_fallback() {
        let design = bundled();
        let battery = design.find_component_by_id("battery").unwrap();
        let own = design.start_bonus_for(battery).unwrap();
        assert_eq!(own.get(&Resource::Power), Some(&EffectValue::Number(50.0)));

        let lss = design.find_component_by_id("lss_bio").unwrap();
        assert!(lss.start_bonus.is_none());
        let fallback = design.start_bonus_for(lss).unwrap();
        assert_eq!(fallback.get(&Resource::Oxygen), Some(&EffectValue::Number(5.0)));

        let dome = design.find_component_by_id("hab_dome").unwrap();
        assert!(design.start_bonus_for(dome).is_none());
    }

    #[test]
    fn start_bonus_resolves_for_modules_outside_the_catalog() {
        let design = bundled();
        let custom = ModuleDef {
            id: "cargo_pod".to_string(),
            start_bonus: Some(EffectMap::from([(Resource::Food, EffectValue::Number(4.0))])),
            ..ModuleDef::default()
        };
        let bonus = design.start_bonus_for(&custom).unwrap();
        assert_eq!(bonus.get(&Resource::Food), Some(&EffectValue::Number(4.0)));

        let renamed = ModuleDef {
            id: "lss_bio".to_string(),
            ..ModuleDef::default()
        };
        let fallback = design.start_bonus_for(&renamed).unwrap();
        assert_eq!(fallback.get(&Resource::Oxygen), Some(&EffectValue::Number(5.0)));
    }

    #[test]
    fn planet_lookup_checks_modifiers_then_top_level() {
        let design = bundled();
        let planet = design.planet("kepler22b").unwrap();
        assert_eq!(planet.lookup("water_eff"), Some(1.2));
        assert_eq!(planet.lookup("difficulty"), Some(1.0));
        assert_eq!(planet.lookup("distFromEarth"), Some(620.0));
        assert_eq!(planet.lookup("gravity_well"), None);
        assert_eq!(planet.display_name(), "Kepler-22b");
    }

    #[test]
    fn events_are_indexed_by_day() {
        let design = bundled();
        let event = design.event_for_day("trappist1e", 4).unwrap();
        assert!(event.branch.is_some());
        assert!(design.event_for_day("trappist1e", 6).is_none());
        assert!(design.events_for("nowhere").is_empty());
    }

    #[test]
    fn partial_design_uses_rule_defaults() {
        let design = Design::from_json(r#"{"planets": {"p": {"id": "p"}}}"#).unwrap();
        assert_eq!(design.game.days, 5);
        assert!((design.rules.metabolism.oxygen - 0.84).abs() < f64::EPSILON);
        assert!((design.rules.base_stocks.power - 80.0).abs() < f64::EPSILON);
        assert_eq!(design.rules.protected_modules, vec!["hab_dome".to_string()]);
        let planet = design.planet("p").unwrap();
        assert!((planet.modifiers.metabolism - 1.0).abs() < f64::EPSILON);
        assert!(planet.modifiers.shield_need.abs() < f64::EPSILON);
    }

    #[test]
    fn validation_rejects_inconsistent_content() {
        let no_planets = Design::from_json(r#"{"planets": {}}"#);
        assert!(matches!(no_planets, Err(DesignError::NoPlanets)));

        let zero_days = Design::from_json(r#"{"game": {"days": 0}, "planets": {"p": {"id": "p"}}}"#);
        assert!(matches!(zero_days, Err(DesignError::InvalidDays(0))));

        let late_event = Design::from_json(
            r#"{"planets": {"p": {"id": "p"}},
                "events": {"p": [{"day": 9, "title": "Late", "choices": []}]}}"#,
        );
        assert!(matches!(
            late_event,
            Err(DesignError::EventDayOutOfRange { day: 9, .. })
        ));

        let bad_risk = Design::from_json(
            r#"{"planets": {"p": {"id": "p"}},
                "events": {"p": [{"day": 1, "title": "Gamble", "choices": [
                    {"id": "A", "text": "Roll", "delta": {"risk": {"prob": 1.5, "onFail": {"Power": -1}}}}
                ]}]}}"#,
        );
        assert!(matches!(bad_risk, Err(DesignError::RiskProbability { .. })));

        let duplicate = Design::from_json(
            r#"{"planets": {"p": {"id": "p"}},
                "components": {"a": [{"id": "x"}], "b": [{"id": "x"}]}}"#,
        );
        assert!(matches!(duplicate, Err(DesignError::DuplicateModule(id)) if id == "x"));

        let negative = Design::from_json(
            r#"{"planets": {"p": {"id": "p"}},
                "rules": {"per_person_daily_metabolism": {"O2": -1}}}"#,
        );
        assert!(matches!(
            negative,
            Err(DesignError::NegativeRule { field: "metabolism.O2", .. })
        ));

        assert!(matches!(Design::from_json("{"), Err(DesignError::Json(_))));
    }
}
