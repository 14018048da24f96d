use std::{env, fs, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use rcaprep::{
    baro,
    config::{self, Config},
    diagnostic::Report,
    pipeline::{self, Pipeline},
};
use rcaprep_histogram::{BucketCounts, Calibration, Estimate, Quantile};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

const CONFIG_ENV: &str = "RCAPREP_CONFIG";

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid rcaprep config: {0}")]
    Config(#[from] config::Error),
    #[error(transparent)]
    Pipeline(#[from] pipeline::Error),
    #[error("Wide export failed: {0}")]
    Baro(#[from] baro::Error),
    #[error("Invalid histogram: {0}")]
    Histogram(#[from] rcaprep_histogram::Error),
}

fn default_config_path() -> String {
    "/etc/rcaprep/rcaprep.yaml".to_string()
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dataset from every configured case
    Run(RunCommand),
    /// Lay the accumulated per-service metrics side by side for BARO
    ExportBaro(RunCommand),
    /// Validate configuration file and exit
    ConfigCheck(ConfigArgs),
    /// Print P90/P95/P99 estimates of one histogram
    Estimate(EstimateCommand),
}

#[derive(Args)]
struct ConfigArgs {
    /// path on disk to the configuration file
    #[clap(long, default_value_t = default_config_path())]
    config_path: String,
}

#[derive(Args)]
struct RunCommand {
    #[command(flatten)]
    config: ConfigArgs,
    /// exit non-zero if the run recorded any diagnostic
    #[clap(long)]
    strict: bool,
}

#[derive(Args)]
struct EstimateCommand {
    /// bucket counts, smallest latency bucket first, e.g. "[0, 3, 1.5, ...]"
    buckets: BucketCounts,
    /// total sample count to normalize by, defaults to the buckets' sum
    #[clap(long)]
    count: Option<f64>,
}

fn load_config_contents(config_path: &str) -> Result<String, Error> {
    if let Ok(env_var_value) = env::var(CONFIG_ENV) {
        debug!("Using config from env var '{CONFIG_ENV}'");
        Ok(env_var_value)
    } else {
        debug!("Attempting to open configuration file at: {}", config_path);
        fs::read_to_string(config_path).map_err(|err| {
            error!("Could not read config file '{}': {}", config_path, err);
            Error::Io(err)
        })
    }
}

fn get_config(args: &ConfigArgs) -> Result<Config, Error> {
    let contents = load_config_contents(&args.config_path)?;
    config::parse(&contents).map_err(|err| {
        error!("Configuration validation failed: {}", err);
        Error::Config(err)
    })
}

fn run(command: &RunCommand) -> Result<ExitCode, Error> {
    let config = get_config(&command.config)?;
    let report = Pipeline::new(config).run()?;
    Ok(conclude(&report, command.strict))
}

fn export_baro(command: &RunCommand) -> Result<ExitCode, Error> {
    let config = get_config(&command.config)?;
    let mut report = Report::new();
    let rows = baro::export(&config, &mut report)?;
    info!(rows, "Wide export written");
    Ok(conclude(&report, command.strict))
}

fn conclude(report: &Report, strict: bool) -> ExitCode {
    for (kind, count) in report.counts() {
        warn!(%kind, count, "Diagnostics recorded");
    }
    if report.is_clean() {
        info!("Finished without diagnostics");
        return ExitCode::SUCCESS;
    }
    if strict {
        error!(
            diagnostics = report.diagnostics().len(),
            "Diagnostics recorded in strict mode"
        );
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[allow(clippy::print_stdout)]
fn estimate(command: &EstimateCommand) -> Result<ExitCode, Error> {
    let total = command.count.unwrap_or_else(|| command.buckets.total());
    let normalized = command.buckets.normalize(total)?;
    let estimate = Estimate::from_buckets(normalized.as_slice(), &Calibration::default())?;
    for quantile in Quantile::ALL {
        println!("{quantile:?}\t{}", estimate.get(quantile));
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode, Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting rcaprep {version}.");

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(command) => run(&command),
        Commands::ExportBaro(command) => export_baro(&command),
        Commands::ConfigCheck(args) => match get_config(&args) {
            Ok(_) => {
                info!("Configuration file is valid");
                Ok(ExitCode::SUCCESS)
            }
            Err(_) => Ok(ExitCode::FAILURE),
        },
        Commands::Estimate(command) => estimate(&command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::parse_from(["rcaprep", "run", "--config-path", "/tmp/r.yaml", "--strict"]);
        match cli.command {
            Commands::Run(command) => {
                assert_eq!(command.config.config_path, "/tmp/r.yaml");
                assert!(command.strict);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn cli_parses_export_baro() {
        let cli = Cli::parse_from(["rcaprep", "export-baro", "--config-path", "/tmp/r.yaml"]);
        match cli.command {
            Commands::ExportBaro(command) => {
                assert_eq!(command.config.config_path, "/tmp/r.yaml");
                assert!(!command.strict);
            }
            _ => panic!("expected export-baro"),
        }
    }

    #[test]
    fn clean_report_succeeds_even_when_strict() {
        assert_eq!(conclude(&Report::new(), true), ExitCode::SUCCESS);
    }

    #[test]
    fn cli_parses_bucket_list() {
        let cli = Cli::parse_from([
            "rcaprep",
            "estimate",
            "[0,0,0,0,0,0,0,0,0,0,0,0,0,0,4]",
            "--count",
            "4",
        ]);
        match cli.command {
            Commands::Estimate(command) => {
                assert_eq!(command.count, Some(4.0));
                assert!((command.buckets.total() - 4.0).abs() < f64::EPSILON);
            }
            _ => panic!("expected estimate"),
        }
    }

    #[test]
    fn malformed_bucket_list_is_rejected() {
        assert!(Cli::try_parse_from(["rcaprep", "estimate", "0,1,2"]).is_err());
    }

    #[test]
    fn config_check_defaults_path() {
        let cli = Cli::parse_from(["rcaprep", "config-check"]);
        match cli.command {
            Commands::ConfigCheck(args) => assert_eq!(args.config_path, default_config_path()),
            _ => panic!("expected config-check"),
        }
    }
}
