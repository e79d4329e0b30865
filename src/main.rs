use std::error::Error;
use tracing::{error, info, warn};

mod anchor_watch;
mod app_metrics;
mod config;
mod engine;
mod error;
mod geodesy;
mod position;
mod position_intake;
mod sensor_listener;
mod track_ledger;
mod web;

use config::Config;
use engine::Engine;
use sensor_listener::run_sensor_listener;

const DEFAULT_CONFIG_PATH: &str = "config.json";

// ========== Logging Setup ==========

fn init_logging(log_config: &config::LogConfig) -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
    use tracing_appender::rolling;

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&log_config.directory)?;

    let file_appender = rolling::daily(&log_config.directory, &log_config.file_prefix);

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_timer(fmt::time::OffsetTime::local_rfc_3339().unwrap_or_else(|_| fmt::time::OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )));

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_timer(fmt::time::OffsetTime::local_rfc_3339().unwrap_or_else(|_| fmt::time::OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )));

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&log_config.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

fn print_help() {
    println!("Anchor watch and track log");
    println!();
    println!("USAGE:");
    println!("    anchor_log [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>                      Configuration file (default: {})", DEFAULT_CONFIG_PATH);
    println!("    --validate-config, --validate, -v    Validate configuration and exit");
    println!("    --help, -h                           Show this help message");
}

// ========== Main Application ==========

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        std::process::exit(0);
    }

    let validate_only = args.iter().any(|a| a == "--validate-config" || a == "--validate" || a == "-v");

    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let config = match Config::from_file(config_path) {
        Ok(cfg) => {
            if validate_only {
                println!("✓ Configuration validation successful");
                println!("  Anchor radius: {} m", cfg.anchor.radius_meters);
                println!("  Default tracking interval: {} ms", cfg.tracking.default_interval_ms);
                println!("  Sensor listener: {} ({})",
                    if cfg.sensor.enabled { "enabled" } else { "disabled" }, cfg.sensor.bind_address);
                println!("  Web server: {} (port {})",
                    if cfg.web.enabled { "enabled" } else { "disabled" }, cfg.web.port);
                std::process::exit(0);
            }
            cfg
        }
        Err(e) => {
            if validate_only {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
            eprintln!("Warning: Could not load {}: {}", config_path, e);
            eprintln!("Using default configuration");
            Config::default()
        }
    };

    init_logging(&config.logging)?;
    info!("Anchor log starting...");
    info!("Anchor radius {} m, default tracking interval {} ms",
        config.anchor.radius_meters, config.tracking.default_interval_ms);

    let (engine, engine_task) = Engine::spawn(&config);

    if config.sensor.enabled {
        let bind_address = config.sensor.bind_address.clone();
        let handle = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = run_sensor_listener(bind_address, handle).await {
                error!("Sensor listener failed: {}", e);
            }
        });
    } else {
        warn!("Sensor listener disabled, samples only arrive through the web API");
    }

    if config.web.enabled {
        let handle = engine.clone();
        let web_config = config.web.clone();
        let default_interval_ms = config.tracking.default_interval_ms;
        tokio::spawn(async move {
            if let Err(e) = web::start_web_server(handle, web_config, default_interval_ms).await {
                error!("Web server failed: {}", e);
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    {
        let status = engine.subscribe().borrow().clone();
        info!("Session ends with {} waypoints, {:.3} km / {:.3} nm",
            status.waypoint_count, status.total_distance.kilometers, status.total_distance.nautical_miles);
    }
    engine_task.abort();

    Ok(())
}
