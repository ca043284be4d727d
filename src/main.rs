//! memwatch - process memory watchdog
//!
//! Operator tooling around the watchdog settings file.

mod cli;

use cli::{Cli, Commands};
use memwatch::settings::{self, Settings};
use memwatch::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Completion { shell } => {
            Cli::generate_completion(shell);
        }
        Commands::Check { json } => {
            let settings = settings::load(&cli.config)?;
            tracing::debug!(path = %cli.config.display(), "memwatch: settings loaded");
            if json {
                let out = serde_json::to_string_pretty(&settings)
                    .map_err(|e| memwatch::Error::ConfigValidation(e.to_string()))?;
                println!("{}", out);
            } else {
                print_settings(&settings);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn print_settings(settings: &Settings) {
    let wd = &settings.watchdog;
    println!("Configuration is valid");
    println!("  Sleep time: {}s", wd.sleep_time_seconds);
    println!("  Handler: {}", wd.handler);
    println!("  Watchdog enabled: {}", wd.enabled);
    println!("  Enforcement enabled: {}", wd.enforce);

    if settings.monitors.is_empty() {
        println!("  Monitors: (defaults)");
        return;
    }

    println!("  Monitors:");
    for (name, monitor) in &settings.monitors {
        let strikes = monitor
            .max_strikes
            .map(|s| s.to_string())
            .unwrap_or_else(|| "default".to_string());
        let state = if monitor.enabled { "enabled" } else { "disabled" };
        println!("    {} ({}, max strikes: {})", name, state, strikes);
    }
}
