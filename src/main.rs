use std::io::{self, Write};
use std::path::PathBuf;
use clap::Parser;
use log::{error, warn};
use nodescope::collectors::Monitor;
use nodescope::collectors::gpu::AcceleratorCorrelator;
use nodescope::collectors::process::SysinfoProcessTable;
use nodescope::config::{Config, DEFAULT_INTERVAL, parse_alias, sampling_period};
use nodescope::errors::MonitorError;
use nodescope::mode::OutputMode;
use nodescope::registry::CommandRegistry;
use nodescope::render::{JsonLines, Presenter, Screen, TableView};
use nodescope::resolver::WorkerResolver;
use nodescope::session;
use nodescope::shutdown::Shutdown;


fn main() {
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn setup_logger(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<(), MonitorError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut aliases = config.aliases;
    for raw in &cli.alias {
        let (worker, process) = parse_alias(raw)?;
        aliases.insert(worker, process);
    }

    let registry_command = cli
        .registry_command
        .as_deref()
        .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .or(config.registry_command);
    let registry = match registry_command {
        Some(command) => CommandRegistry::new(&command).unwrap_or_else(|| {
            warn!("Empty registry command, falling back to `ros2 node list`");
            CommandRegistry::ros2()
        }),
        None => CommandRegistry::ros2(),
    };

    let interval = cli.interval.or(config.interval_seconds).unwrap_or(DEFAULT_INTERVAL);
    let period = sampling_period(interval)?;

    let accelerator = if cli.no_accelerator {
        AcceleratorCorrelator::Unsupported
    } else {
        AcceleratorCorrelator::detect()
    };

    let mut monitor = Monitor::new(
        Box::new(SysinfoProcessTable::new()),
        Box::new(registry),
        WorkerResolver::new(aliases).excluding(std::process::id()),
        accelerator,
    );
    let shutdown = Shutdown::install()?;

    let mut presenter: Box<dyn Presenter> = match cli.output {
        OutputMode::Table => {
            let mut stdout = io::stdout();
            writeln!(stdout, "Initializing cache (wait for 1st frame)...")?;
            stdout.flush()?;
            Box::new(TableView::new(Screen::stdout()?, stdout))
        }
        OutputMode::Json => Box::new(JsonLines::new(io::stdout())),
    };

    session::run(&mut monitor, presenter.as_mut(), &shutdown, period, cli.once)?;
    Ok(())
}

#[derive(Parser)]
#[command(name = "nodescope")]
#[command(about = "Live CPU and GPU usage of named workers and their child processes", long_about = None)]
struct Cli {
    /// Sampling interval in seconds
    #[arg(short, long)]
    interval: Option<f64>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Map a worker name to the process name to search for (worker=process)
    #[arg(short, long)]
    alias: Vec<String>,

    /// Command that prints one worker name per line
    #[arg(long)]
    registry_command: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputMode::Table)]
    output: OutputMode,

    /// Print a single sample and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Do not query GPUs
    #[arg(long, default_value_t = false)]
    no_accelerator: bool,

    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}
