//! Per-day narrative events, player choices, and the choice resolver.
//!
//! Choice deltas are authored as open string-keyed maps (`"O2_per_day"`,
//! `"sacrifice_module"`, a nested `"risk"`). They are parsed into typed
//! [`DeltaOp`]s when the catalog loads, so ticks never inspect key suffixes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::{
    NEXT_DAY_SUFFIX, ONGOING_RESOURCES, PER_DAY_SUFFIX, RISK_KEY, SACRIFICE_MODULE_KEY,
};
use crate::data::GameRules;
use crate::resources::Resource;
use crate::state::RunState;

/// A delta as it appears in content.
pub type RawDelta = BTreeMap<String, Value>;

/// Named flags a choice may set.
pub type FlagMap = BTreeMap<String, FlagValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FlagValue {
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::Text(value) => !value.is_empty(),
        }
    }
}

/// One typed effect of a choice.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOp {
    /// Add directly to a resource.
    Adjust { resource: Resource, amount: f64 },
    /// Install a recurring daily delta.
    PerDay { resource: Resource, amount: f64 },
    /// Queue a delta for the start of the next day.
    NextDay { resource: Resource, amount: f64 },
    /// Remove the most recently installed unprotected module.
    SacrificeModule,
    /// An authored key with no engine effect, kept for round-tripping.
    Inert { key: String, value: Value },
}

impl DeltaOp {
    fn parse(key: String, value: Value) -> Self {
        if key == SACRIFICE_MODULE_KEY && json_truthy(&value) {
            return Self::SacrificeModule;
        }
        let Some(amount) = value.as_f64() else {
            return Self::Inert { key, value };
        };
        if let Some(base) = key.strip_suffix(PER_DAY_SUFFIX)
            && let Ok(resource) = base.parse::<Resource>()
            && ONGOING_RESOURCES.contains(&resource)
        {
            return Self::PerDay { resource, amount };
        }
        if let Some(base) = key.strip_suffix(NEXT_DAY_SUFFIX)
            && let Ok(resource) = base.parse::<Resource>()
        {
            return Self::NextDay { resource, amount };
        }
        match key.parse::<Resource>() {
            Ok(resource) => Self::Adjust { resource, amount },
            Err(()) => Self::Inert { key, value },
        }
    }

    fn into_entry(self) -> (String, Value) {
        match self {
            Self::Adjust { resource, amount } => (resource.as_str().to_string(), Value::from(amount)),
            Self::PerDay { resource, amount } => {
                (format!("{resource}{PER_DAY_SUFFIX}"), Value::from(amount))
            }
            Self::NextDay { resource, amount } => {
                (format!("{resource}{NEXT_DAY_SUFFIX}"), Value::from(amount))
            }
            Self::SacrificeModule => (SACRIFICE_MODULE_KEY.to_string(), Value::Bool(true)),
            Self::Inert { key, value } => (key, value),
        }
    }
}

fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Probabilistic failure branch of a choice.
#[derive(Debug, Clone, PartialEq)]
pub struct Risk {
    pub prob: f64,
    pub on_fail: Box<ChoiceDelta>,
}

impl Risk {
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let prob = object.get("prob")?.as_f64()?;
        let on_fail: RawDelta = object
            .get("onFail")?
            .as_object()?
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Self {
            prob,
            on_fail: Box::new(ChoiceDelta::from(on_fail)),
        })
    }

    fn into_value(self) -> Value {
        let on_fail: serde_json::Map<String, Value> =
            RawDelta::from(*self.on_fail).into_iter().collect();
        let mut object = serde_json::Map::new();
        object.insert("prob".to_string(), Value::from(self.prob));
        object.insert("onFail".to_string(), Value::Object(on_fail));
        Value::Object(object)
    }
}

/// Typed form of a choice's `delta` record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawDelta", into = "RawDelta")]
pub struct ChoiceDelta {
    pub ops: Vec<DeltaOp>,
    pub risk: Option<Risk>,
}

impl From<RawDelta> for ChoiceDelta {
    fn from(raw: RawDelta) -> Self {
        let mut delta = Self::default();
        for (key, value) in raw {
            if key == RISK_KEY {
                match Risk::from_value(&value) {
                    Some(risk) => delta.risk = Some(risk),
                    None => delta.ops.push(DeltaOp::Inert { key, value }),
                }
                continue;
            }
            delta.ops.push(DeltaOp::parse(key, value));
        }
        delta
    }
}

impl From<ChoiceDelta> for RawDelta {
    fn from(delta: ChoiceDelta) -> Self {
        let mut raw: Self = delta.ops.into_iter().map(DeltaOp::into_entry).collect();
        if let Some(risk) = delta.risk {
            raw.insert(RISK_KEY.to_string(), risk.into_value());
        }
        raw
    }
}

impl ChoiceDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.risk.is_none()
    }

    /// First risk probability, at any nesting depth, outside `[0, 1]`.
    #[must_use]
    pub fn invalid_risk_probability(&self) -> Option<f64> {
        let risk = self.risk.as_ref()?;
        if !(0.0..=1.0).contains(&risk.prob) {
            return Some(risk.prob);
        }
        risk.on_fail.invalid_risk_probability()
    }

    /// Keys the engine will ignore, including those inside a risk branch.
    #[must_use]
    pub fn inert_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .ops
            .iter()
            .filter_map(|op| match op {
                DeltaOp::Inert { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        if let Some(risk) = &self.risk {
            keys.extend(risk.on_fail.inert_keys());
        }
        keys
    }
}

/// A player choice within an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub delta: ChoiceDelta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: FlagMap,
}

/// Alternative choice lists gated on the sensor flag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventBranch {
    #[serde(default)]
    pub if_sensor_fixed: Vec<Choice>,
    #[serde(default)]
    pub if_sensor_failed: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    pub day: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<EventBranch>,
}

impl EventDef {
    /// Choices offered given the current sensor flag. A branch takes
    /// precedence over a flat list and stays silent until the flag is set;
    /// an empty result means no event fires.
    #[must_use]
    pub fn choices_for(&self, sensor: Option<bool>) -> &[Choice] {
        match (&self.branch, sensor) {
            (Some(branch), Some(true)) => &branch.if_sensor_fixed,
            (Some(branch), Some(false)) => &branch.if_sensor_failed,
            (Some(_), None) => &[],
            (None, _) => &self.choices,
        }
    }

    /// Every authored choice, across the flat list and both branches.
    pub fn all_choices(&self) -> impl Iterator<Item = &Choice> {
        let branched = self
            .branch
            .iter()
            .flat_map(|branch| branch.if_sensor_fixed.iter().chain(&branch.if_sensor_failed));
        self.choices.iter().chain(branched)
    }
}

/// Result of a probabilistic choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskOutcome {
    Passed,
    Failed,
}

/// Select `wanted` when offered, else the first choice.
#[must_use]
pub fn pick_choice<'a>(choices: &'a [Choice], wanted: Option<&str>) -> Option<&'a Choice> {
    wanted
        .and_then(|id| choices.iter().find(|choice| choice.id == id))
        .or_else(|| choices.first())
}

/// Apply a choice to the run and merge its flags.
///
/// When the delta carries a risk, one uniform draw below `prob` replaces the
/// rest of the delta with the failure branch. The choice's own flags are
/// merged on either outcome.
pub fn apply_choice_delta<R>(
    state: &mut RunState,
    choice: &Choice,
    rules: &GameRules,
    rng: &mut R,
) -> Option<RiskOutcome>
where
    R: Rng + ?Sized,
{
    let outcome = apply_delta(state, &choice.delta, rules, rng);
    for (name, value) in &choice.flags {
        state.flags.named.insert(name.clone(), value.clone());
    }
    outcome
}

fn apply_delta<R>(
    state: &mut RunState,
    delta: &ChoiceDelta,
    rules: &GameRules,
    rng: &mut R,
) -> Option<RiskOutcome>
where
    R: Rng + ?Sized,
{
    let mut outcome = None;
    if let Some(risk) = &delta.risk {
        state.counted_choices += 1;
        if rng.r#gen::<f64>() < risk.prob {
            apply_delta(state, &risk.on_fail, rules, rng);
            return Some(RiskOutcome::Failed);
        }
        state.successful_choices += 1;
        outcome = Some(RiskOutcome::Passed);
    }

    for op in &delta.ops {
        match op {
            DeltaOp::Adjust { resource, amount } => state.ledger.apply(*resource, *amount),
            DeltaOp::PerDay { resource, amount } => {
                *state.ongoing.entry(*resource).or_insert(0.0) += amount;
            }
            DeltaOp::NextDay { resource, amount } => {
                *state.flags.next_day.entry(*resource).or_insert(0.0) += amount;
            }
            DeltaOp::SacrificeModule => {
                if let Some(index) = state
                    .modules
                    .iter()
                    .rposition(|id| !rules.is_protected(id))
                {
                    let removed = state.modules.remove(index);
                    log::debug!("day {}: sacrificed module {removed}", state.day);
                }
            }
            DeltaOp::Inert { .. } => {}
        }
    }
    outcome
}

/// Resolve queued next-day deltas against the stocks, then zero every entry.
///
/// Queued vitals are discarded.
pub fn apply_next_day_flags(state: &mut RunState) {
    for (resource, amount) in &mut state.flags.next_day {
        if resource.is_stock() && *amount != 0.0 {
            state.ledger.apply(*resource, *amount);
        }
        *amount = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FLOAT_EPSILON;
    use crate::resources::ResourceLedger;
    use rand::SeedableRng;
    use rand::rngs::mock::StepRng;
    use rand_chacha::ChaCha20Rng;

    fn choice(json: &str) -> Choice {
        serde_json::from_str(json).unwrap()
    }

    fn state_with(ledger: ResourceLedger, modules: &[&str]) -> RunState {
        RunState {
            day: 1,
            days_total: 5,
            crew: 3,
            ledger,
            modules: modules.iter().map(ToString::to_string).collect(),
            ..RunState::default()
        }
    }

    /// Always draws 0.0, so every risk fails.
    fn failing_rng() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Always draws just under 1.0, so every risk passes.
    fn passing_rng() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn deltas_parse_into_typed_ops() {
        let parsed = choice(
            r#"{"id": "B", "text": "Delay", "delta": {
                "O2_per_day": -2, "Health_per_day": -3, "O2_next_day": -5,
                "Power": 10, "sacrifice_module": true, "Food_end_bonus": 10,
                "risk": {"prob": 0.25, "onFail": {"Power": -20, "Health": -10}}
            }}"#,
        );
        let ops = &parsed.delta.ops;
        assert!(ops.contains(&DeltaOp::PerDay {
            resource: Resource::Oxygen,
            amount: -2.0
        }));
        assert!(ops.contains(&DeltaOp::PerDay {
            resource: Resource::Health,
            amount: -3.0
        }));
        assert!(ops.contains(&DeltaOp::NextDay {
            resource: Resource::Oxygen,
            amount: -5.0
        }));
        assert!(ops.contains(&DeltaOp::Adjust {
            resource: Resource::Power,
            amount: 10.0
        }));
        assert!(ops.contains(&DeltaOp::SacrificeModule));
        assert_eq!(parsed.delta.inert_keys(), vec!["Food_end_bonus"]);

        let risk = parsed.delta.risk.as_ref().unwrap();
        assert!((risk.prob - 0.25).abs() < FLOAT_EPSILON);
        assert_eq!(risk.on_fail.ops.len(), 2);
    }

    #[test]
    fn per_day_deltas_recur_only_on_oxygen_and_health() {
        let parsed = choice(
            r#"{"id": "B", "delta": {"Power_per_day": -4, "Morale_per_day": 1, "O2_per_day": -1}}"#,
        );
        let recurring: Vec<&DeltaOp> = parsed
            .delta
            .ops
            .iter()
            .filter(|op| matches!(op, DeltaOp::PerDay { .. }))
            .collect();
        assert_eq!(
            recurring,
            vec![&DeltaOp::PerDay {
                resource: Resource::Oxygen,
                amount: -1.0
            }]
        );
        assert_eq!(
            parsed.delta.inert_keys(),
            vec!["Morale_per_day", "Power_per_day"]
        );
    }

    #[test]
    fn delta_serializes_back_to_authored_shape() {
        let parsed = choice(
            r#"{"id": "B", "text": "Push", "delta": {
                "Power": 10, "risk": {"prob": 0.25, "onFail": {"Power": -20}}
            }}"#,
        );
        let value = serde_json::to_value(&parsed.delta).unwrap();
        assert_eq!(value["Power"], serde_json::json!(10.0));
        assert_eq!(value["risk"]["prob"], serde_json::json!(0.25));
        assert_eq!(value["risk"]["onFail"]["Power"], serde_json::json!(-20.0));
    }

    #[test]
    fn malformed_risk_stays_inert() {
        let parsed = choice(r#"{"id": "A", "delta": {"risk": {"prob": "high"}}}"#);
        assert!(parsed.delta.risk.is_none());
        assert_eq!(parsed.delta.inert_keys(), vec!["risk"]);
    }

    #[test]
    fn pick_choice_falls_back_to_first() {
        let choices = vec![
            choice(r#"{"id": "A", "delta": {}}"#),
            choice(r#"{"id": "B", "delta": {}}"#),
        ];
        assert_eq!(pick_choice(&choices, Some("B")).unwrap().id, "B");
        assert_eq!(pick_choice(&choices, Some("Z")).unwrap().id, "A");
        assert_eq!(pick_choice(&choices, None).unwrap().id, "A");
        assert!(pick_choice(&[], Some("A")).is_none());
    }

    #[test]
    fn branch_selects_on_sensor_flag() {
        let event: EventDef = serde_json::from_str(
            r#"{"day": 4, "title": "Flare", "branch": {
                "if_sensor_fixed": [{"id": "A"}, {"id": "B"}],
                "if_sensor_failed": [{"id": "AUTO"}]
            }}"#,
        )
        .unwrap();
        assert_eq!(event.choices_for(Some(true)).len(), 2);
        assert_eq!(event.choices_for(Some(false))[0].id, "AUTO");
        assert!(event.choices_for(None).is_empty());
        assert_eq!(event.all_choices().count(), 3);
    }

    #[test]
    fn water_leak_clamps_and_flags_failure() {
        let mut state = state_with(
            ResourceLedger {
                water: 10.0,
                ..ResourceLedger::default()
            },
            &["hab_dome"],
        );
        let delay = choice(r#"{"id": "B", "delta": {"H2O": -20, "Health": -5}}"#);
        apply_choice_delta(&mut state, &delay, &GameRules::default(), &mut failing_rng());
        let failures = state.ledger.clamp_and_check();
        assert!(state.ledger.water.abs() < FLOAT_EPSILON);
        assert!(failures.contains(&Resource::Water));
        assert!((state.ledger.health - 95.0).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn sacrifice_skips_protected_modules() {
        let rules = GameRules::default();
        let sacrifice = choice(r#"{"id": "B", "delta": {"sacrifice_module": true}}"#);

        let mut state = state_with(ResourceLedger::default(), &["hab_dome", "battery"]);
        apply_choice_delta(&mut state, &sacrifice, &rules, &mut failing_rng());
        assert_eq!(state.modules, vec!["hab_dome".to_string()]);

        apply_choice_delta(&mut state, &sacrifice, &rules, &mut failing_rng());
        assert_eq!(state.modules, vec!["hab_dome".to_string()]);

        let mut mixed = state_with(
            ResourceLedger::default(),
            &["battery", "hab_dome", "solar_array"],
        );
        apply_choice_delta(&mut mixed, &sacrifice, &rules, &mut failing_rng());
        assert_eq!(mixed.modules, vec!["battery".to_string(), "hab_dome".to_string()]);
    }

    #[test]
    fn risk_failure_replaces_rest_of_delta() {
        let rules = GameRules::default();
        let gamble = choice(
            r#"{"id": "B", "delta": {
                "Power": 10, "risk": {"prob": 0.25, "onFail": {"Power": -20, "Health": -10}}
            }, "flags": {"reactor_pushed": true}}"#,
        );
        let ledger = ResourceLedger {
            power: 50.0,
            ..ResourceLedger::default()
        };

        let mut failed = state_with(ledger, &[]);
        let outcome = apply_choice_delta(&mut failed, &gamble, &rules, &mut failing_rng());
        assert_eq!(outcome, Some(RiskOutcome::Failed));
        assert!((failed.ledger.power - 30.0).abs() < FLOAT_EPSILON);
        assert!((failed.ledger.health - 90.0).abs() < FLOAT_EPSILON);
        assert_eq!((failed.successful_choices, failed.counted_choices), (0, 1));
        assert!(failed.flags.is_set("reactor_pushed"));

        let mut passed = state_with(ledger, &[]);
        let outcome = apply_choice_delta(&mut passed, &gamble, &rules, &mut passing_rng());
        assert_eq!(outcome, Some(RiskOutcome::Passed));
        assert!((passed.ledger.power - 60.0).abs() < FLOAT_EPSILON);
        assert!((passed.ledger.health - 100.0).abs() < FLOAT_EPSILON);
        assert_eq!((passed.successful_choices, passed.counted_choices), (1, 1));
        assert!(passed.flags.is_set("reactor_pushed"));
    }

    #[test]
    fn ongoing_and_next_day_accumulate() {
        let rules = GameRules::default();
        let delay = choice(r#"{"id": "B", "delta": {"O2_per_day": -2, "O2_next_day": -5}}"#);
        let mut state = state_with(
            ResourceLedger {
                oxygen: 20.0,
                ..ResourceLedger::default()
            },
            &[],
        );
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        apply_choice_delta(&mut state, &delay, &rules, &mut rng);
        apply_choice_delta(&mut state, &delay, &rules, &mut rng);
        assert_eq!(state.ongoing.get(&Resource::Oxygen), Some(&-4.0));
        assert_eq!(state.flags.next_day.get(&Resource::Oxygen), Some(&-10.0));
        assert!((state.ledger.oxygen - 20.0).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn next_day_flags_apply_stocks_once() {
        let mut state = state_with(
            ResourceLedger {
                oxygen: 20.0,
                ..ResourceLedger::default()
            },
            &[],
        );
        state.flags.next_day.insert(Resource::Oxygen, -10.0);
        state.flags.next_day.insert(Resource::Health, -50.0);

        apply_next_day_flags(&mut state);
        assert!((state.ledger.oxygen - 10.0).abs() < FLOAT_EPSILON);
        assert!((state.ledger.health - 100.0).abs() < FLOAT_EPSILON);
        assert!(state.flags.next_day.values().all(|amount| *amount == 0.0));

        apply_next_day_flags(&mut state);
        assert!((state.ledger.oxygen - 10.0).abs() < FLOAT_EPSILON);
    }
}
