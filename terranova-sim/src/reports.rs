use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use terranova_engine::Verdict;

use crate::runner::{RunRecord, SimulationAggregate};

/// Batch header plus results, as written by every report format.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub generated_at: String,
    pub planet: String,
    pub planet_name: String,
    pub crew: u32,
    pub modules: Vec<String>,
    pub policy: String,
    pub iterations: u32,
    pub aggregate: SimulationAggregate,
    pub runs: Vec<RunRecord>,
}

impl SimulationReport {
    #[must_use]
    pub fn timestamp() -> String {
        Utc::now().to_rfc3339()
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn verdict_label(verdict: Verdict) -> colored::ColoredString {
    match verdict {
        Verdict::Excellent => verdict.as_str().bright_green().bold(),
        Verdict::Survived => verdict.as_str().yellow(),
        Verdict::Failed => verdict.as_str().red(),
    }
}

pub fn generate_console_report(
    out: &mut dyn Write,
    report: &SimulationReport,
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Simulation Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=====================".cyan())?;
    writeln!(out, "Generated: {}", report.generated_at)?;
    writeln!(
        out,
        "Planet: {} ({})  Crew: {}  Policy: {}",
        report.planet_name.bold(),
        report.planet,
        report.crew,
        report.policy
    )?;
    writeln!(out, "Modules: {}", report.modules.join(", "))?;
    writeln!(out)?;

    let aggregate = &report.aggregate;
    writeln!(out, "Total runs: {}", aggregate.runs)?;
    for (verdict, count) in &aggregate.verdicts {
        writeln!(out, "  {:<10} {count}", verdict_label(*verdict))?;
    }
    writeln!(out, "Success rate: {}", percent(aggregate.success_rate))?;
    writeln!(
        out,
        "Mean SurvivalScore: {:.2}",
        aggregate.mean_survival_score
    )?;
    writeln!(
        out,
        "Mean ResourceEfficiency: {:.2}",
        aggregate.mean_resource_efficiency
    )?;
    writeln!(out, "Mean PowerBalance: {:.2}", aggregate.mean_power_balance)?;
    writeln!(out, "Mean days played: {:.2}", aggregate.mean_days_played)?;
    if let Some(rate) = aggregate.risk_failure_rate {
        writeln!(out, "Risk failure rate: {}", percent(rate))?;
    }
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for run in &report.runs {
        let status = if run.success {
            "✅".green()
        } else {
            "❌".red()
        };
        writeln!(
            out,
            "{status} seed {} [{}] {} days: {}",
            run.seed,
            run.choices.join(" "),
            run.days_played,
            verdict_label(run.metrics.verdict)
        )?;
        writeln!(
            out,
            "   Score {:.1} | Efficiency {:.1} | Power {:.1}",
            run.metrics.survival_score, run.metrics.resource_efficiency, run.metrics.power_balance
        )?;
        if let Some(cause) = run.cause {
            writeln!(out, "   Cause: {}", cause.to_string().red())?;
        }
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    let json_output = serde_json::to_string_pretty(report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    writeln!(out, "# TerraNova Simulation Report\n")?;
    writeln!(out, "_Generated {}_\n", report.generated_at)?;

    writeln!(out, "## Setup\n")?;
    writeln!(
        out,
        "- **Planet**: {} (`{}`)",
        report.planet_name, report.planet
    )?;
    writeln!(out, "- **Crew**: {}", report.crew)?;
    writeln!(out, "- **Modules**: {}", report.modules.join(", "))?;
    writeln!(out, "- **Policy**: {}", report.policy)?;
    writeln!(out, "- **Iterations per seed**: {}\n", report.iterations)?;

    let aggregate = &report.aggregate;
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total runs**: {}", aggregate.runs)?;
    for (verdict, count) in &aggregate.verdicts {
        writeln!(out, "- **{verdict}**: {count}")?;
    }
    writeln!(
        out,
        "- **Success rate**: {}",
        percent(aggregate.success_rate)
    )?;
    writeln!(
        out,
        "- **Mean SurvivalScore**: {:.2}",
        aggregate.mean_survival_score
    )?;
    writeln!(
        out,
        "- **Mean ResourceEfficiency**: {:.2}",
        aggregate.mean_resource_efficiency
    )?;
    writeln!(
        out,
        "- **Mean PowerBalance**: {:.2}",
        aggregate.mean_power_balance
    )?;
    if let Some(rate) = aggregate.risk_failure_rate {
        writeln!(out, "- **Risk failure rate**: {}", percent(rate))?;
    }
    writeln!(out)?;

    writeln!(out, "## Runs\n")?;
    writeln!(
        out,
        "| Seed | Choices | Days | Verdict | SurvivalScore | ResourceEfficiency | PowerBalance | Cause |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|---|")?;
    for run in &report.runs {
        let cause = run
            .cause
            .map_or_else(|| "-".to_string(), |cause| cause.to_string());
        writeln!(
            out,
            "| {} | {} | {} | {} | {:.1} | {:.1} | {:.1} | {cause} |",
            run.seed,
            run.choices.join(" "),
            run.days_played,
            run.metrics.verdict,
            run.metrics.survival_score,
            run.metrics.resource_efficiency,
            run.metrics.power_balance
        )?;
    }
    Ok(())
}
