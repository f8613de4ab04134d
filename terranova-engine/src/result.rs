//! End-of-run scoring and the narrative summary.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    EFFICIENCY_SCALE, EXCELLENT_POWER_BALANCE_MIN, EXCELLENT_SCORE_THRESHOLD, METRIC_DECIMALS,
    RATIO_EPSILON, RESOURCE_SCORE_WEIGHT, VITAL_MAX, VITAL_MIN,
};
use crate::data::Design;
use crate::numbers::round_to_places;
use crate::resources::{InitialSnapshot, Resource};
use crate::state::RunState;

/// Final categorical outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verdict {
    Excellent,
    Survived,
    Failed,
}

impl Verdict {
    pub const ALL: [Self; 3] = [Self::Excellent, Self::Survived, Self::Failed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Survived => "Survived",
            Self::Failed => "Failed",
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three end-of-run metrics, each rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metrics {
    pub survival_score: f64,
    pub resource_efficiency: f64,
    pub power_balance: f64,
    #[serde(rename = "verdict")]
    pub verdict: Verdict,
}

/// Score a finished (or abandoned) run against its starting stocks.
#[must_use]
pub fn compute_metrics(design: &Design, state: &RunState, initial: &InitialSnapshot) -> Metrics {
    let ratio = state.ledger.aggregate() / initial.aggregate().max(RATIO_EPSILON);
    let survival_score = state.ledger.health.clamp(VITAL_MIN, VITAL_MAX)
        + state.ledger.morale.clamp(VITAL_MIN, VITAL_MAX)
        + RESOURCE_SCORE_WEIGHT * ratio;
    let resource_efficiency = EFFICIENCY_SCALE * ratio;
    let power_balance = state.power_log.balance();

    let success = state.day > design.game.days
        && state.ledger.health > 0.0
        && state.ledger.oxygen > 0.0
        && state.ledger.water > 0.0
        && state.ledger.food > 0.0;
    let verdict = if !success {
        Verdict::Failed
    } else if survival_score >= EXCELLENT_SCORE_THRESHOLD
        && power_balance >= EXCELLENT_POWER_BALANCE_MIN
    {
        Verdict::Excellent
    } else {
        Verdict::Survived
    };

    Metrics {
        survival_score: round_to_places(survival_score, METRIC_DECIMALS),
        resource_efficiency: round_to_places(resource_efficiency, METRIC_DECIMALS),
        power_balance: round_to_places(power_balance, METRIC_DECIMALS),
        verdict,
    }
}

/// Metrics plus the closing text a presentation layer would show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub metrics: Metrics,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Resource>,
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

#[must_use]
pub fn summarize(design: &Design, state: &RunState, initial: &InitialSnapshot) -> RunSummary {
    let metrics = compute_metrics(design, state, initial);
    let success = metrics.verdict.is_success();
    let cause = if success {
        None
    } else {
        state.ledger.exhausted_fatal()
    };

    let endings = &design.endings;
    let headline = if success {
        endings.success_generic.clone()
    } else {
        endings.failure_generic.clone()
    };
    let cause_message = cause.and_then(|resource| endings.by_cause.get(&resource).cloned());
    let flavor = endings.planet_flavor.get(&state.planet_key).map(|flavor| {
        if success {
            flavor.success.clone()
        } else {
            flavor.failure.clone()
        }
    });

    RunSummary {
        metrics,
        success,
        cause,
        headline,
        cause_message,
        flavor,
    }
}
