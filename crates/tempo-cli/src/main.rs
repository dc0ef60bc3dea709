use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;

use tempo_conductor::{
    run_simulator, Conductor, SimulatorConfig, TimeConductorController, TokioFrameScheduler,
};
use tempo_time::FormatRegistry;

mod config;

use config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Command::new("tempo")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Time conductor engine")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("demo")
                .about("Run a configured conductor session and print window changes")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to a TOML config (built-in defaults when omitted)"),
                )
                .arg(
                    Arg::new("duration")
                        .long("duration")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("How long to run, in seconds"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the randomized invariant simulator")
                .arg(
                    Arg::new("operations")
                        .long("ops")
                        .default_value("10000")
                        .value_parser(value_parser!(u64))
                        .help("Number of operations to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output a JSON summary"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Parse and validate a TOML config")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to the config file"),
                ),
        );

    match cli.get_matches().subcommand() {
        Some(("demo", args)) => {
            let config = match args.get_one::<PathBuf>("config") {
                Some(path) => AppConfig::load(path)?,
                None => AppConfig::default(),
            };
            let duration = *args.get_one::<u64>("duration").unwrap_or(&10);
            run_demo(config, Duration::from_secs(duration)).await
        }
        Some(("simulate", args)) => {
            let config = SimulatorConfig {
                seed: *args.get_one::<u64>("seed").unwrap_or(&42),
                total_operations: *args.get_one::<u64>("operations").unwrap_or(&10_000),
                stop_on_first_violation: args.get_flag("stop-on-violation"),
                ..Default::default()
            };
            let report = run_simulator(config);

            if args.get_flag("json") {
                let summary = serde_json::json!({
                    "seed": report.config.seed,
                    "operations": report.stats.total_operations,
                    "successful": report.stats.successful_operations,
                    "declined": report.stats.failed_operations,
                    "violations": report.violations.len(),
                    "passed": report.passed(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("check-config", args)) => {
            let path = args.get_one::<PathBuf>("path").expect("path is required");
            match AppConfig::load(path) {
                Ok(config) => {
                    println!("OK: {} ({} time systems)", path.display(), config.time_systems.len());
                    Ok(())
                }
                Err(error) => {
                    eprintln!("invalid config: {error:#}");
                    std::process::exit(1);
                }
            }
        }
        _ => Ok(()),
    }
}

async fn run_demo(config: AppConfig, duration: Duration) -> anyhow::Result<()> {
    let (registry, clocks) = config.build_registry();
    let formats = FormatRegistry::with_defaults();

    let conductor = Arc::new(Conductor::new(config.initial_bounds()));
    let controller = TimeConductorController::new(
        Arc::clone(&conductor),
        registry,
        Arc::new(TokioFrameScheduler::default()),
    )?;

    let mode = config.mode()?;
    let current = controller.active_mode_key();
    controller.set_mode(mode, current)?;

    let form = controller.form();
    let format = formats
        .get(&form.time_system.format)
        .or_else(|_| formats.get("millis"))?;

    println!("tempo demo: mode {mode}, {duration:?}");
    let print_format = format.clone();
    let _bounds_sub = conductor.on_bounds(Arc::new(move |bounds| {
        println!(
            "  window [{} .. {}]",
            print_format.format(bounds.start),
            print_format.format(bounds.end)
        );
    }));

    for clock in &clocks {
        clock.start();
    }

    tokio::time::sleep(duration).await;

    for clock in &clocks {
        clock.stop();
    }

    let bounds = conductor.bounds();
    println!(
        "final window [{} .. {}]",
        format.format(bounds.start),
        format.format(bounds.end)
    );
    Ok(())
}
