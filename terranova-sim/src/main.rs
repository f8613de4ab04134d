mod loader;
mod policy;
mod reports;
mod runner;
mod util;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use terranova_engine::{Engine, RunSetup, StaticDesignLoader};

use loader::FileDesignLoader;
use policy::PolicyKind;
use reports::SimulationReport;
use runner::{SimulationPlan, aggregate_runs, run_plan};
use util::{resolve_seeds, split_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored summary for a terminal
    Console,
    /// Machine-readable batch results
    Json,
    /// Summary and per-run table
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "terranova-sim", version)]
#[command(about = "Headless TerraNova run driver - plays seeded runs and reports their scores")]
struct Args {
    /// Planet key to land on
    #[arg(long, default_value = "kepler22b")]
    planet: String,

    /// Crew size
    #[arg(long, default_value_t = 3)]
    crew: u32,

    /// Installed modules (comma-separated ids)
    #[arg(long, default_value = "hab_dome,battery,solar_array")]
    modules: String,

    /// Choice ids per day for the scripted policy (comma-separated)
    #[arg(long, default_value = "")]
    choices: String,

    /// How event choices are made
    #[arg(long, value_enum, default_value_t = PolicyKind::First)]
    policy: PolicyKind,

    /// Seeds to run (comma-separated, decimal or 0x hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Runs per seed; iteration n plays seed + n
    #[arg(long, default_value_t = 1)]
    iterations: u32,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Load a design catalog from this JSON file instead of the bundled one
    #[arg(long)]
    design: Option<PathBuf>,

    /// Play loadouts that break the crew, capacity or budget rules
    #[arg(long)]
    skip_loadout_check: bool,

    /// List planets and exit
    #[arg(long)]
    list_planets: bool,

    /// List modules and exit
    #[arg(long)]
    list_modules: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let engine = load_engine(&args)?;

    if maybe_list_catalog(&args, &engine)? {
        return Ok(());
    }

    if args.report == ReportFormat::Console {
        announce_banner();
    }

    let start_time = Instant::now();
    let plan = build_plan(&args, &engine)?;
    let runs = run_plan(&engine.shared_design(), &plan)?;

    let planet_name = engine
        .design()
        .planet(&plan.setup.planet_key)
        .map_or_else(
            || plan.setup.planet_key.clone(),
            |planet| planet.display_name().to_string(),
        );
    let report = SimulationReport {
        generated_at: SimulationReport::timestamp(),
        planet: plan.setup.planet_key.clone(),
        planet_name,
        crew: plan.setup.crew,
        modules: plan.setup.modules.clone(),
        policy: plan.policy.to_string(),
        iterations: plan.iterations,
        aggregate: aggregate_runs(&runs),
        runs,
    };

    write_report(&args, &report, start_time)
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn load_engine(args: &Args) -> Result<Engine> {
    match &args.design {
        Some(path) => Engine::new(&FileDesignLoader::new(path))
            .with_context(|| format!("failed to load design from {}", path.display())),
        None => Engine::new(&StaticDesignLoader).context("bundled design is invalid"),
    }
}

fn build_plan(args: &Args, engine: &Engine) -> Result<SimulationPlan> {
    let setup = RunSetup::new(args.planet.as_str(), args.crew, split_csv(&args.modules));
    if engine.design().planet(&setup.planet_key).is_none() {
        bail!("Unknown planet: {}", setup.planet_key);
    }
    if args.iterations == 0 {
        bail!("--iterations must be at least 1");
    }

    match engine.validate_loadout(&setup) {
        Ok(cost) => log::debug!(
            "loadout costs {} of {} points ({} remaining)",
            cost.total,
            cost.budget,
            cost.remaining()
        ),
        Err(err) if args.skip_loadout_check => {
            log::warn!("playing invalid loadout: {err}");
        }
        Err(err) => {
            return Err(err)
                .context("invalid loadout (pass --skip-loadout-check to play it anyway)");
        }
    }

    let script = split_csv(&args.choices);
    if args.policy == PolicyKind::Scripted && script.is_empty() {
        log::warn!("scripted policy without --choices plays the default choice every day");
    }

    Ok(SimulationPlan {
        setup,
        policy: args.policy,
        script,
        seeds: resolve_seeds(&split_csv(&args.seeds))?,
        iterations: args.iterations,
    })
}

fn maybe_list_catalog(args: &Args, engine: &Engine) -> Result<bool> {
    if !args.list_planets && !args.list_modules {
        return Ok(false);
    }
    let design = engine.design();
    let mut output_target = OutputTarget::new(args.output.clone())?;

    if args.list_planets {
        writeln!(output_target.writer(), "Available planets:")?;
        for (key, planet) in &design.planets {
            let difficulty = planet
                .difficulty
                .map_or_else(|| "?".to_string(), |level| level.to_string());
            writeln!(
                output_target.writer(),
                "  {key:12} - {} (difficulty {difficulty})",
                planet.display_name()
            )?;
        }
    }

    if args.list_modules {
        writeln!(output_target.writer(), "Available modules:")?;
        for (group, modules) in &design.components {
            writeln!(output_target.writer(), "  [{group}]")?;
            for module in modules {
                writeln!(
                    output_target.writer(),
                    "    {:12} - {} ({} pts)",
                    module.id,
                    module.name,
                    module.cost
                )?;
            }
        }
    }

    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🪐 TerraNova Simulation Driver".bright_cyan().bold());
    println!("{}", "==============================".cyan());
}

fn write_report(args: &Args, report: &SimulationReport, start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => reports::generate_json_report(&mut output_target, report)?,
        ReportFormat::Markdown => reports::generate_markdown_report(&mut output_target, report)?,
        ReportFormat::Console => {
            reports::generate_console_report(&mut output_target, report, start_time.elapsed())?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
