use std::process;
use std::path::PathBuf;
use std::time::Duration;
use clap::{Args, Parser, Subcommand, ValueEnum};
use anyhow::{anyhow, Context, Result};
use log::info;
use simple_logger::SimpleLogger;

use sweepmon::core::aggregate::evaluate_leaf;
use sweepmon::core::config::{OutputFormat as ReportFormat, SweepConfig};
use sweepmon::core::error::SweepError;
use sweepmon::core::model::Limits;
use sweepmon::core::runner::SweepRunner;
use sweepmon::core::status::Status;
use sweepmon::reporters::{Reporter, text::TextReporter, json::JsonReporter, csv::CsvReporter};
use sweepmon::sources::power::PowerSupplySimulator;
use sweepmon::store::ResultStore;
use sweepmon::store::http::HttpStore;
use sweepmon::store::memory::InMemoryStore;


#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show every measurement and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Only print the overall result
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}


#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Csv => ReportFormat::Csv,
        }
    }
}


#[derive(Subcommand)]
enum Commands {
    /// Run the sweep and upload results to a test monitor service
    Run {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Base URL of the test monitor service
        #[arg(long, env = "SWEEPMON_URL")]
        url: Option<String>,

        /// API key sent with every request
        #[arg(long, env = "SWEEPMON_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Per-request timeout, e.g. 30s
        #[arg(long, value_parser = SweepConfig::parse_timeout)]
        timeout: Option<Duration>,
    },

    /// Run the sweep against an in-process store
    Simulate {
        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Evaluate one measurement against inclusive limits
    Check {
        #[arg(allow_negative_numbers = true)]
        measured: f64,

        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        low: f64,

        #[arg(long, default_value_t = 70.0, allow_negative_numbers = true)]
        high: f64,
    },
}


#[derive(Clone, Debug)]
struct StimulusList(Vec<f64>);

fn parse_stimulus(value: &str) -> std::result::Result<StimulusList, String> {
    SweepConfig::parse_range(value).map(StimulusList)
}


#[derive(Args)]
struct SweepArgs {
    /// Currents to sweep: `start..end` or a comma-separated list
    #[arg(long, value_parser = parse_stimulus)]
    currents: Option<StimulusList>,

    /// Voltages to sweep per current: `start..end` or a comma-separated list
    #[arg(long, value_parser = parse_stimulus)]
    voltages: Option<StimulusList>,

    #[arg(long, allow_negative_numbers = true)]
    low_limit: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    high_limit: Option<f64>,

    /// Seed for the simulated losses
    #[arg(long)]
    seed: Option<u64>,

    /// Largest fraction of current and of voltage the simulator may lose
    #[arg(long)]
    max_loss: Option<f64>,

    /// Process currents concurrently
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel (0 = one per CPU)
    #[arg(long)]
    threads: Option<u32>,

    #[arg(long)]
    program_name: Option<String>,

    #[arg(long)]
    operator: Option<String>,

    #[arg(long)]
    part_number: Option<String>,

    #[arg(long)]
    serial_number: Option<String>,
}

/// Exit code when the result finalizes `Failed` or a checked value is out of limits.
const EXIT_FAILED: i32 = 1;

/// Exit code for any error that kept the sweep from finishing.
const EXIT_ERROR: i32 = 2;

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(status) if status.is_failure() => process::exit(EXIT_FAILED),
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(sweep_error) = e.downcast_ref::<SweepError>() {
                eprintln!("{}", sweep_error.guidance());
            }
            process::exit(EXIT_ERROR);
        }
    }
}


fn run(cli: Cli) -> Result<Status> {
    let mut config = match &cli.config {
        Some(path) => SweepConfig::from_file(&path.to_string_lossy()).map_err(|e| anyhow!(e))?,
        None => SweepConfig::default(),
    };

    if let Some(format) = cli.format {
        config.output_format = format.into();
    }
    if cli.output.is_some() {
        config.output_file = cli.output.clone();
    }
    config.verbose |= cli.verbose;
    config.quiet |= cli.quiet;


    // Keep machine-readable output on stdout clean
    let log_level = if config.verbose {
        log::LevelFilter::Debug
    } else if config.quiet || config.output_format != ReportFormat::Text {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };

    SimpleLogger::new()
        .with_level(log_level)
        .init()
        .context("Failed to initialize logger")?;

    info!("Sweepmon v{}", env!("CARGO_PKG_VERSION"));


    let store: Box<dyn ResultStore + Send + Sync> = match &cli.command {
        Commands::Run { sweep, url, api_key, timeout } => {
            update_config_from_args(&mut config, sweep);
            if url.is_some() {
                config.store_url = url.clone();
            }
            if api_key.is_some() {
                config.api_key = api_key.clone();
            }
            if let Some(timeout) = timeout {
                config.request_timeout = *timeout;
            }

            let url = config.store_url.clone()
                .ok_or_else(|| anyhow!("No store URL given; pass --url or set SWEEPMON_URL"))?;
            Box::new(HttpStore::new(&url, config.api_key.clone(), config.request_timeout)
                .context("Failed to create store client")?)
        }

        Commands::Simulate { sweep } => {
            update_config_from_args(&mut config, sweep);
            Box::new(InMemoryStore::new())
        }

        Commands::Check { measured, low, high } => {
            return check_measurement(*measured, *low, *high);
        }
    };


    let reporter: Box<dyn Reporter + Send + Sync> = match config.output_format {
        ReportFormat::Text => Box::new(TextReporter::new(config.verbose, config.quiet)),
        ReportFormat::Json => Box::new(JsonReporter::new(config.output_file.clone(), config.verbose)),
        ReportFormat::Csv => Box::new(CsvReporter::new(config.output_file.clone())),
    };

    let source = PowerSupplySimulator::with_max_loss(config.max_loss);
    let runner = SweepRunner::new(store, Box::new(source), reporter, config);
    runner.setup_interrupt_handler()
        .context("Failed to install interrupt handler")?;

    let summary = runner.execute().context("Sweep failed")?;
    Ok(summary.status())
}


fn update_config_from_args(config: &mut SweepConfig, args: &SweepArgs) {
    if let Some(currents) = &args.currents {
        config.currents = currents.0.clone();
    }

    if let Some(voltages) = &args.voltages {
        config.voltages = voltages.0.clone();
    }

    if let Some(low) = args.low_limit {
        config.low_limit = low;
    }

    if let Some(high) = args.high_limit {
        config.high_limit = high;
    }

    if args.seed.is_some() {
        config.seed = args.seed;
    }

    if let Some(max_loss) = args.max_loss {
        config.max_loss = max_loss;
    }

    config.parallel |= args.parallel;

    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    if let Some(name) = &args.program_name {
        config.program_name = name.clone();
    }

    if let Some(operator) = &args.operator {
        config.operator = operator.clone();
    }

    if let Some(part_number) = &args.part_number {
        config.part_number = part_number.clone();
    }

    if args.serial_number.is_some() {
        config.serial_number = args.serial_number.clone();
    }
}


fn check_measurement(measured: f64, low: f64, high: f64) -> Result<Status> {
    let limits = Limits::new(low, high).context("Invalid limits")?;
    let status = evaluate_leaf(measured, limits.low(), limits.high());

    println!("{} within [{}, {}]: {}", measured, limits.low(), limits.high(), status.status_type());
    Ok(status)
}
