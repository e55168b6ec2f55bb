use tracing::{error, info};

use newswire::{Application, Config};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = newswire::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        newswire::logging::init_console_only(&config.logging.level);
    }

    info!("newswire {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Polling {} source(s) every {} seconds",
        config.catalog.len(),
        config.scheduler.poll_interval_secs
    );

    let app = match Application::build(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}
