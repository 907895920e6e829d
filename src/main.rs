use anyhow::{Context, Result};
use clap::Parser;
use rigbridge::{ParameterEntry, RigConfig, Session, SimulatedBoard};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "rigbridge-sim")]
#[command(about = "Run a rigbridge session against a simulated control board")]
#[command(version)]
#[command(long_about = "Brings up a session on an in-memory board seeded from the parameter \
catalogue in the configuration file, lets the harmonic statistics task run, optionally \
records a capture, and prints the results as JSON. Intended for checking configuration \
files and exercising the library without rig hardware.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rigbridge.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Harmonic modes simulated per tracked signal
    #[arg(long, default_value_t = 3)]
    modes: usize,

    /// Seconds to let the statistics task run before reporting
    #[arg(long, default_value_t = 2.0)]
    seconds: f64,

    /// Parameters to capture after the statistics run
    #[arg(long, value_delimiter = ',')]
    capture: Vec<String>,

    /// Samples per captured parameter (0 = board default)
    #[arg(long, default_value_t = 0)]
    samples: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", RigConfig::default().to_toml_string()?);
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting rigbridge simulator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RigConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if config.parameters.is_empty() {
        info!("No parameter catalogue configured, using the built-in demo rig");
        config.parameters = demo_catalogue(&config);
    }

    let board = Arc::new(simulated_rig(&config, args.modes));
    let mut session = Session::open(board, config).map_err(|e| {
        error!("Failed to open session: {}", e);
        e
    })?;

    println!("{}", serde_json::to_string_pretty(&session.registry().names())?);

    tokio::time::sleep(Duration::from_secs_f64(args.seconds.max(0.0))).await;

    for signal in session.config().averaging.signals.clone() {
        if let Some(snapshot) = session.snapshot(&signal) {
            println!(
                "{}",
                serde_json::json!({ "signal": signal, "stats": &*snapshot })
            );
        }
    }
    println!("{}", serde_json::to_string_pretty(&session.stats_metrics())?);

    if !args.capture.is_empty() {
        let names: Vec<&str> = args.capture.iter().map(String::as_str).collect();
        session.capture().configure(&names, args.samples, 0)?;
        let data = session.run_capture().await?;
        println!("{}", serde_json::to_string_pretty(&data)?);
        if let Some(metadata) = session.capture().metadata() {
            println!("{}", serde_json::to_string_pretty(metadata)?);
        }
    }

    session.close().await?;
    info!("Session closed");
    Ok(())
}

/// Catalogue covering the frequency and tracked signals plus one plain sensor
fn demo_catalogue(config: &RigConfig) -> Vec<ParameterEntry> {
    let mut catalogue = vec![ParameterEntry::new(
        config.averaging.frequency.as_str(),
        "Model/Sine/Frequency",
    )];
    for signal in &config.averaging.signals {
        catalogue.push(ParameterEntry::new(
            signal.as_str(),
            format!("Model/Harmonics/{}", signal),
        ));
    }
    catalogue.push(ParameterEntry::new("accel", "Model/Sensors/Accel"));
    catalogue
}

/// Seed a simulated board with every configured address
fn simulated_rig(config: &RigConfig, modes: usize) -> SimulatedBoard {
    let width = 2 * modes + 1;
    let board = SimulatedBoard::new().with_capture_latency(3);
    for entry in &config.parameters {
        let address = entry.address.as_str();
        if entry.name == config.averaging.frequency {
            board.set_value(address, 5.0);
        } else if config.averaging.signals.contains(&entry.name) {
            let harmonics: Vec<f64> = (0..width).map(|k| 1.0 / (k as f64 + 1.0)).collect();
            board.set_value(address, harmonics);
        } else {
            board.set_value(address, 0.0);
        }
    }
    board
}

/// Filter used when `RUST_LOG` is unset
///
/// Library events log under `rigbridge`, this binary under `rigbridge_sim`.
fn default_directive(log_level: &str) -> String {
    format!("rigbridge={0},rigbridge_sim={0}", log_level)
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}
