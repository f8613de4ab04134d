use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use terranova_engine::numbers::usize_to_f64;
use terranova_engine::{
    Design, Metrics, Resource, ResourceLedger, RiskOutcome, RunReport, RunSession, RunSetup,
    Verdict,
};

use crate::policy::{ChoicePolicy, PolicyKind};

const MAX_PREALLOCATED_RUNS: usize = 1024;

/// Everything needed to play a batch of runs.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub setup: RunSetup,
    pub policy: PolicyKind,
    pub script: Vec<String>,
    pub seeds: Vec<u64>,
    pub iterations: u32,
}

impl SimulationPlan {
    /// Seed for one iteration of a base seed. Iteration zero plays the seed itself.
    #[must_use]
    pub const fn run_seed(base: u64, iteration: u32) -> u64 {
        base.wrapping_add(iteration as u64)
    }

    /// Total runs the plan plays, saturating instead of overflowing.
    #[must_use]
    pub fn run_count(&self) -> usize {
        let iterations = usize::try_from(self.iterations).unwrap_or(usize::MAX);
        self.seeds.len().saturating_mul(iterations)
    }
}

/// One finished run, trimmed to what reports show.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub base_seed: u64,
    pub iteration: u32,
    pub seed: u64,
    pub days_played: usize,
    pub metrics: Metrics,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Resource>,
    pub headline: String,
    pub choices: Vec<String>,
    pub risks_taken: u32,
    pub risks_failed: usize,
    pub final_ledger: ResourceLedger,
}

impl RunRecord {
    fn from_report(base_seed: u64, iteration: u32, report: &RunReport) -> Self {
        let history = &report.state.history;
        Self {
            base_seed,
            iteration,
            seed: report.seed,
            days_played: history.len(),
            metrics: report.metrics,
            success: report.summary.success,
            cause: report.summary.cause,
            headline: report.summary.headline.clone(),
            choices: history
                .iter()
                .map(|day| day.choice.clone().unwrap_or_else(|| "-".to_string()))
                .collect(),
            risks_taken: report.state.counted_choices,
            risks_failed: history
                .iter()
                .filter(|day| day.risk == Some(RiskOutcome::Failed))
                .count(),
            final_ledger: report.state.ledger,
        }
    }
}

/// Batch statistics across every run of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationAggregate {
    pub runs: usize,
    pub verdicts: BTreeMap<Verdict, usize>,
    pub success_rate: f64,
    pub mean_survival_score: f64,
    pub mean_resource_efficiency: f64,
    pub mean_power_balance: f64,
    pub mean_days_played: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_failure_rate: Option<f64>,
}

/// Play one seeded run to the end under `policy`.
pub fn run_seed(
    design: &Arc<Design>,
    setup: &RunSetup,
    policy: &mut dyn ChoicePolicy,
    seed: u64,
) -> Result<RunReport> {
    let mut session = RunSession::new(Arc::clone(design), setup, seed)
        .with_context(|| format!("failed to start run on {} (seed {seed})", setup.planet_key))?;
    session.run_to_end(|current| {
        let choice = policy.pick_choice(current);
        log::debug!(
            "seed {seed} day {}: {} picks {}",
            current.state().day,
            policy.name(),
            choice.as_deref().unwrap_or("default")
        );
        choice
    });
    Ok(session.finish())
}

/// Play every `(seed, iteration)` pair of the plan.
pub fn run_plan(design: &Arc<Design>, plan: &SimulationPlan) -> Result<Vec<RunRecord>> {
    let mut records = Vec::with_capacity(plan.run_count().min(MAX_PREALLOCATED_RUNS));
    for &base_seed in &plan.seeds {
        for iteration in 0..plan.iterations {
            let seed = SimulationPlan::run_seed(base_seed, iteration);
            let mut policy = plan.policy.create_policy(&plan.script);
            let report = run_seed(design, &plan.setup, policy.as_mut(), seed)?;
            log::info!(
                "seed {seed}: {} after {} days",
                report.metrics.verdict,
                report.state.history.len()
            );
            records.push(RunRecord::from_report(base_seed, iteration, &report));
        }
    }
    Ok(records)
}

#[must_use]
pub fn aggregate_runs(records: &[RunRecord]) -> SimulationAggregate {
    let mut verdicts: BTreeMap<Verdict, usize> =
        Verdict::ALL.iter().map(|verdict| (*verdict, 0)).collect();
    let mut survival = 0.0;
    let mut efficiency = 0.0;
    let mut power = 0.0;
    let mut days = 0_usize;
    let mut successes = 0_usize;
    let mut risks_taken = 0_u32;
    let mut risks_failed = 0_usize;

    for record in records {
        *verdicts.entry(record.metrics.verdict).or_default() += 1;
        survival += record.metrics.survival_score;
        efficiency += record.metrics.resource_efficiency;
        power += record.metrics.power_balance;
        days += record.days_played;
        if record.success {
            successes += 1;
        }
        risks_taken = risks_taken.saturating_add(record.risks_taken);
        risks_failed += record.risks_failed;
    }

    let runs = usize_to_f64(records.len().max(1));
    SimulationAggregate {
        runs: records.len(),
        verdicts,
        success_rate: usize_to_f64(successes) / runs,
        mean_survival_score: survival / runs,
        mean_resource_efficiency: efficiency / runs,
        mean_power_balance: power / runs,
        mean_days_played: usize_to_f64(days) / runs,
        risk_failure_rate: (risks_taken > 0)
            .then(|| usize_to_f64(risks_failed) / f64::from(risks_taken)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTER: [&str; 3] = ["hab_dome", "battery", "solar_array"];

    fn design() -> Arc<Design> {
        Arc::new(Design::load_from_static().unwrap())
    }

    fn plan(planet: &str, policy: PolicyKind, seeds: Vec<u64>, iterations: u32) -> SimulationPlan {
        SimulationPlan {
            setup: RunSetup::new(planet, 3, STARTER),
            policy,
            script: Vec::new(),
            seeds,
            iterations,
        }
    }

    #[test]
    fn run_seed_wraps_around() {
        assert_eq!(SimulationPlan::run_seed(10, 0), 10);
        assert_eq!(SimulationPlan::run_seed(10, 3), 13);
        assert_eq!(SimulationPlan::run_seed(u64::MAX, 1), 0);
    }

    #[test]
    fn run_count_saturates_for_huge_plans() {
        assert_eq!(plan("kepler22b", PolicyKind::First, vec![1, 50], 3).run_count(), 6);
        let huge = plan("kepler22b", PolicyKind::First, vec![1, 2], u32::MAX);
        let expected = usize::try_from(2 * u64::from(u32::MAX)).unwrap_or(usize::MAX);
        assert_eq!(huge.run_count(), expected);
    }

    #[test]
    fn plays_every_seed_and_iteration() {
        let records = run_plan(&design(), &plan("kepler22b", PolicyKind::First, vec![1, 50], 3))
            .unwrap();
        assert_eq!(records.len(), 6);
        let seeds: Vec<u64> = records.iter().map(|record| record.seed).collect();
        assert_eq!(seeds, vec![1, 2, 3, 50, 51, 52]);
        assert!(records.iter().all(|record| record.days_played == 5));
        assert!(
            records
                .iter()
                .all(|record| record.metrics.verdict == Verdict::Excellent)
        );
    }

    #[test]
    fn aggregate_counts_verdicts_and_means() {
        let records = run_plan(&design(), &plan("kepler22b", PolicyKind::First, vec![7], 2))
            .unwrap();
        let aggregate = aggregate_runs(&records);
        assert_eq!(aggregate.runs, 2);
        assert_eq!(aggregate.verdicts[&Verdict::Excellent], 2);
        assert_eq!(aggregate.verdicts[&Verdict::Failed], 0);
        assert!((aggregate.success_rate - 1.0).abs() < f64::EPSILON);
        assert!((aggregate.mean_survival_score - 206.9).abs() < 1e-9);
        assert!((aggregate.mean_days_played - 5.0).abs() < f64::EPSILON);
        assert!(aggregate.risk_failure_rate.is_none());
    }

    #[test]
    fn scripted_gamble_tracks_risk_outcomes() {
        let mut gamble = plan("55cancrie", PolicyKind::Scripted, (0..16).collect(), 1);
        gamble.script = ["B", "B", "B", "B", "A"].map(String::from).to_vec();
        let records = run_plan(&design(), &gamble).unwrap();
        assert!(records.iter().all(|record| record.risks_taken == 1));
        let aggregate = aggregate_runs(&records);
        let rate = aggregate.risk_failure_rate.unwrap();
        assert!((0.0..=1.0).contains(&rate));
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        let aggregate = aggregate_runs(&[]);
        assert_eq!(aggregate.runs, 0);
        assert!(aggregate.success_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_planet_carries_context() {
        let err = run_plan(&design(), &plan("hoth", PolicyKind::First, vec![1], 1)).unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("hoth"));
    }
}
