//! Binary entrypoint for the boardlink CLI.
//!
//! Commands:
//! - `start [--port <path>]` - connect to the board and run the console until `quit` or Ctrl-C
//! - `init` - write a starter `config.toml`
//! - `ports` - list serial ports and show which one discovery would pick
//!
//! See the library crate docs for module-level details: `boardlink::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::sync::Arc;

use boardlink::bridge::UiBridge;
use boardlink::config::{resolve_port_override, Config, PORT_ENV_VAR};
use boardlink::metrics::LinkMetrics;
use boardlink::serial::{Discovery, LinkManager, LinkOptions, SystemPortOpener};
use boardlink::ui::run_console;

#[derive(Parser)]
#[command(name = "boardlink")]
#[command(about = "Serial bridge between a terminal and a tic-tac-toe board controller")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the board and start the console
    Start {
        /// Serial device (e.g., /dev/ttyACM0 or COM3); overrides ARDUINO_PORT and the config file
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// List serial ports and the one discovery would select
    Ports,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { port } => {
            let (config, from_file) = Config::load_or_default(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting boardlink v{}", env!("CARGO_PKG_VERSION"));
            report_config_source(&cli.config, from_file);
            run_start(config, port).await?;
            // The blocking stdin reader would otherwise hold the runtime open until Enter.
            std::process::exit(0);
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new boardlink configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Ports => {
            let (config, from_file) = Config::load_or_default(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            report_config_source(&cli.config, from_file);
            let discovery = Discovery::system(None, config.match_policy());
            let ports = discovery.candidates()?;
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            for (port, accepted) in ports {
                println!(
                    "{} {:<20} manufacturer={} vid={} pid={}",
                    if accepted { "*" } else { " " },
                    port.path,
                    port.manufacturer.as_deref().unwrap_or("-"),
                    port.vendor_id.as_deref().unwrap_or("-"),
                    port.product_id.as_deref().unwrap_or("-"),
                );
            }
            println!("Match policy: {:?}", discovery.policy());
        }
    }

    Ok(())
}

fn report_config_source(path: &str, from_file: bool) {
    if from_file {
        debug!("Loaded configuration from {}", path);
    } else {
        info!("No config file at {}, using defaults", path);
    }
}

async fn run_start(config: Config, cli_port: Option<String>) -> Result<()> {
    let env_port = std::env::var(PORT_ENV_VAR).ok();
    let override_path = resolve_port_override(
        cli_port.as_deref(),
        env_port.as_deref(),
        config.device.port.as_deref(),
    );
    match &override_path {
        Some(path) => info!("Using device {} (auto-discovery disabled)", path),
        None => info!(
            "Auto-discovering board with {:?}",
            config.match_policy()
        ),
    }

    let options = LinkOptions {
        delimiter: config.device.line_ending,
        ..LinkOptions::default()
    };
    let metrics = Arc::new(LinkMetrics::new());
    let discovery = Discovery::system(override_path, config.match_policy());
    let (manager, lines) = LinkManager::spawn(
        options,
        discovery,
        Arc::new(SystemPortOpener::default()),
        metrics.clone(),
    );
    let (bridge, pump) = UiBridge::start(manager.handle(), lines, metrics.clone());

    let outcome = tokio::select! {
        res = run_console(bridge) => res,
        res = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            res.map_err(anyhow::Error::from)
        }
    };

    manager.shutdown().await;
    if let Err(e) = pump.await {
        warn!("Bridge pump ended abnormally: {}", e);
    }
    info!("Link metrics: {}", metrics.snapshot());
    outcome
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let configured = config
        .as_ref()
        .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => configured.max(log::LevelFilter::Debug),
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        let is_tty = atty::is(atty::Stream::Stdout);

        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());

            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }

            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
