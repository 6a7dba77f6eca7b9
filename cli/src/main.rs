use log::{error, info, warn};
use promptd_core::{Config, PromptdResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod cli;
mod logger;

fn load_config(args: &cli::Args) -> PromptdResult<Config> {
    let mut config = if args.use_defaults {
        info!("Using default configuration");
        Config::default()
    } else {
        // A dry run validates without rewriting the file
        Config::load(args.config_path.as_deref(), !args.dry_run)?
    };

    if let Some(ms) = args.auto_dismiss_ms {
        config.headless_auto_dismiss_ms = Some(ms);
    }

    Ok(config)
}

fn main() -> PromptdResult<()> {
    let args = cli::parse_args();

    if let Err(e) = logger::init_logger(args.quiet, args.verbose) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Starting promptd {}", promptd_core::version());

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return Err(e);
        }
    };

    if let Some(path) = &config.config_path {
        info!("Loaded config from {}", path.display());
    }

    if args.dry_run {
        info!("Configuration is valid");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down...");
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!("Could not install Ctrl+C handler: {e}");
    }

    promptd_core::start(shutdown, config)?;

    info!("promptd stopped");
    Ok(())
}
