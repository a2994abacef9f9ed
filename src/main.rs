use tracing::{error, info};
use whalewatch::app::{App, Config};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config_path =
        std::env::var("WHALEWATCH_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {config_path}: {e}");
            std::process::exit(1);
        }
    };

    config.init_logging();
    info!("whalewatch starting");

    if let Err(e) = App::run(config).await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }

    info!("whalewatch stopped");
}
