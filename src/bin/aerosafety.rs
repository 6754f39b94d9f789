//! AeroSafety CLI - crash survivability analysis from the terminal
//!
//! Usage:
//!   aerosafety brands <PARTIAL>
//!   aerosafety models <BRAND> [--year N]
//!   aerosafety run [--brand B] [--model M] [--speed KPH] ... [--dry-run]
//!   aerosafety health
//!
//! Example:
//!   aerosafety run --brand Volvo --model XC90 --year 2021 --speed 80 --object Wall -v

use aerosafety::model::{AiModel, AirbagStatus, ImpactObject, RunState};
use aerosafety::provider::build_provider;
use aerosafety::render::{self, Palette};
use aerosafety::{AppConfig, InferenceClient, Simulation, SimulationController, prompt};
use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_CONFIG_FILE: &str = "aerosafety.toml";

fn print_usage() {
    eprintln!(
        r#"
{} - Crash survivability analysis backed by a generative model

{}
    aerosafety <COMMAND> [OPTIONS]

{}
    brands <PARTIAL>            Suggest manufacturers matching PARTIAL
    models <BRAND>              Suggest series/models for BRAND
    run                         Resolve vehicle specs and run the crash analysis
    health                      Check that the inference backend is reachable

{}
    --brand <BRAND>             Vehicle brand (default from config: Tesla)
    --model <MODEL>             Vehicle model (default from config: Model 3)
    --series <SERIES>           Vehicle series
    --year <YEAR>               Model year (default from config: 2023)
    --speed <KPH>               Impact speed in km/h (default: 60)
    --angle <DEG>               Impact angle 0-90, 90 is head-on (default: 90)
    --object <OBJECT>           Vehicle | Wall | Tree/Pole | Ditch (default: Vehicle)
    --airbag <STATUS>           None | Partial | Optimal (default: Optimal)
    --no-seatbelt               Occupant is unbelted
    --fast                      Use the fast model for the analysis
    --dry-run                   Print the prompts and parameters without calling out

{}
    -c, --config <PATH>         Config file (default: ./aerosafety.toml if present)
    -v, --verbose               Info-level logs on stderr
    -vv                         Debug-level logs on stderr
    -h, --help                  Print this help message

{}
    aerosafety brands Vo
    aerosafety models Volvo --year 2021
    aerosafety run --brand Volvo --model XC90 --speed 80 --object Wall
    aerosafety run --no-seatbelt --airbag None --dry-run

{}
    GEMINI_API_KEY (or API_KEY)  API key for the Gemini backend
"#,
        "AeroSafety".bold(),
        "USAGE:".bold(),
        "COMMANDS:".bold(),
        "RUN OPTIONS:".bold(),
        "GLOBAL OPTIONS:".bold(),
        "EXAMPLES:".bold(),
        "ENVIRONMENT:".bold(),
    );
}

#[derive(Default)]
struct RunArgs {
    brand: Option<String>,
    model: Option<String>,
    series: Option<String>,
    year: Option<u16>,
    speed: Option<f64>,
    angle: Option<f64>,
    object: Option<ImpactObject>,
    airbag: Option<AirbagStatus>,
    no_seatbelt: bool,
    fast: bool,
    dry_run: bool,
}

enum Command {
    Brands { partial: String },
    Models { brand: String, year: Option<u16> },
    Run(RunArgs),
    Health,
}

struct CliArgs {
    command: Command,
    config: Option<PathBuf>,
    verbose: u8, // 0=warn, 1=info, 2=debug
}

fn value_of<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.as_str()),
        None => bail!("{flag} requires a value"),
    }
}

fn parse_args() -> Result<CliArgs> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        std::process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let mut config = None;
    let mut verbose: u8 = 0;
    let mut positional: Vec<String> = Vec::new();
    let mut run = RunArgs::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" | "-c" => config = Some(PathBuf::from(value_of(&args, &mut i, flag)?)),
            "--verbose" | "-v" => verbose = verbose.max(1),
            "-vv" => verbose = 2,
            "--brand" => run.brand = Some(value_of(&args, &mut i, flag)?.to_string()),
            "--model" => run.model = Some(value_of(&args, &mut i, flag)?.to_string()),
            "--series" => run.series = Some(value_of(&args, &mut i, flag)?.to_string()),
            "--year" => {
                let value = value_of(&args, &mut i, flag)?;
                run.year = Some(value.parse().with_context(|| format!("Invalid year: {value}"))?);
            }
            "--speed" => {
                let value = value_of(&args, &mut i, flag)?;
                run.speed = Some(value.parse().with_context(|| format!("Invalid speed: {value}"))?);
            }
            "--angle" => {
                let value = value_of(&args, &mut i, flag)?;
                run.angle = Some(value.parse().with_context(|| format!("Invalid angle: {value}"))?);
            }
            "--object" => run.object = Some(value_of(&args, &mut i, flag)?.parse()?),
            "--airbag" => run.airbag = Some(value_of(&args, &mut i, flag)?.parse()?),
            "--no-seatbelt" => run.no_seatbelt = true,
            "--fast" => run.fast = true,
            "--dry-run" => run.dry_run = true,
            other if other.starts_with('-') => bail!("Unknown option: {other}"),
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("brands") => Command::Brands {
            partial: positional.next().context("brands requires a partial name")?,
        },
        Some("models") => Command::Models {
            brand: positional.next().context("models requires a brand")?,
            year: run.year,
        },
        Some("run") => Command::Run(run),
        Some("health") => Command::Health,
        Some(other) => bail!("Unknown command: {other}"),
        None => bail!("No command given"),
    };

    Ok(CliArgs {
        command,
        config,
        verbose,
    })
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => AppConfig::load(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("Failed to load config: {DEFAULT_CONFIG_FILE}")),
        None => Ok(AppConfig::default()),
    }
}

fn build_simulation(config: &AppConfig, args: &RunArgs) -> Result<Simulation> {
    let mut identity = config.vehicle.clone();
    if let Some(brand) = &args.brand {
        identity.brand = brand.clone();
    }
    if let Some(model) = &args.model {
        identity.model = model.clone();
    }
    if let Some(series) = &args.series {
        identity.series = series.clone();
    }
    if let Some(year) = args.year {
        identity.year = year;
    }
    if identity.brand.trim().is_empty() || identity.model.trim().is_empty() {
        bail!("Both a brand and a model are required");
    }

    let mut settings = config.settings.clone();
    if args.fast {
        settings.ai_model = AiModel::Fast;
    }

    let mut simulation = Simulation::new(identity, Default::default(), settings);
    let mut params = simulation.params().clone();
    if let Some(speed) = args.speed {
        params.speed_kph = speed;
    }
    if let Some(angle) = args.angle {
        params.impact_angle = angle;
    }
    if let Some(object) = args.object {
        params.object_of_impact = object;
    }
    if let Some(airbag) = args.airbag {
        params.airbag_status = airbag;
    }
    if args.no_seatbelt {
        params.seatbelt_used = false;
    }
    simulation.update_params(params)?;
    Ok(simulation)
}

fn print_dry_run(config: &AppConfig, simulation: &Simulation) -> Result<()> {
    let identity = simulation.identity();
    let analysis_model = config.models.for_analysis(simulation.settings().ai_model);

    eprintln!("{}", "DRY RUN MODE - No inference calls will be made".yellow());
    eprintln!();
    eprintln!("{}", "Would perform the following:".dimmed());
    eprintln!("  1. Resolve specs for {identity} on {}", config.models.fast);
    eprintln!("  2. Run the crash analysis on {analysis_model} with search grounding");
    eprintln!();
    eprintln!("{}", "Spec lookup prompt:".bold());
    println!(
        "{}",
        prompt::spec_lookup(&identity.brand, &identity.model, identity.year)
    );
    eprintln!();
    eprintln!("{}", "Crash parameters (settings merged):".bold());
    println!(
        "{}",
        serde_json::to_string_pretty(&simulation.effective_params())?
    );
    Ok(())
}

async fn run_simulation(controller: &SimulationController, palette: Palette) -> RunState {
    let run = controller.run();
    tokio::pin!(run);
    let mut ticker = tokio::time::interval(Duration::from_millis(100));

    let state = loop {
        tokio::select! {
            state = &mut run => break state,
            _ = ticker.tick() => {
                let snapshot = controller.snapshot();
                if snapshot.state().is_in_flight() {
                    eprint!(
                        "\r{}",
                        render::progress_line(snapshot.state(), snapshot.progress(), &palette)
                    );
                    let _ = std::io::stderr().flush();
                }
            }
        }
    };
    eprint!("\r{}\r", " ".repeat(60));
    state
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    init_logging(args.verbose)?;
    let config = load_config(args.config.as_deref())?;

    let run_args = match &args.command {
        Command::Run(run) => Some(build_simulation(&config, run).map(|sim| (sim, run.dry_run))?),
        _ => None,
    };
    if let Some((simulation, true)) = &run_args {
        return print_dry_run(&config, simulation);
    }

    let provider =
        build_provider(&config.provider).context("Failed to configure the inference backend")?;
    let client = InferenceClient::new(
        provider.clone(),
        config.models.clone(),
        config.autocomplete.max_brand_suggestions,
    );

    match args.command {
        Command::Brands { partial } => {
            let brands = client.suggest_brands(&partial).await;
            if brands.is_empty() {
                eprintln!("{}", "No suggestions".dimmed());
            }
            for brand in brands {
                println!("{brand}");
            }
        }
        Command::Models { brand, year } => {
            let year = year.unwrap_or(config.vehicle.year);
            let models = client.suggest_models(&brand, year).await;
            if models.is_empty() {
                eprintln!("{}", "No suggestions".dimmed());
            }
            for suggestion in models {
                println!("{}  {}", suggestion.model.bold(), suggestion.series.dimmed());
            }
        }
        Command::Health => {
            let status = provider.health_check().await;
            if status.healthy {
                println!(
                    "{} {} ({} ms)",
                    "✓".green(),
                    provider.name(),
                    status.latency_ms.unwrap_or_default()
                );
            } else {
                eprintln!(
                    "{} {}: {}",
                    "✗".red(),
                    provider.name(),
                    status.error.unwrap_or_else(|| "unreachable".to_string())
                );
                std::process::exit(1);
            }
        }
        Command::Run(_) => {
            let Some((simulation, _)) = run_args else {
                bail!("Run command without a simulation");
            };
            let palette = Palette::for_theme(simulation.settings().theme);
            let controller = SimulationController::new(client, simulation);

            let state = run_simulation(&controller, palette).await;
            let snapshot = controller.snapshot();
            print!("{}", render::dashboard(&snapshot));

            if state == RunState::Error {
                if args.verbose > 0
                    && let Some(cause) = snapshot.last_failure()
                {
                    eprintln!("{} {}", "Cause:".red().bold(), cause);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
