use std::process::ExitCode;

use log::error;

use upwatch::{Config, worker};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::from(2);
        }
    };

    match worker::run_checks(&config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("Failed to run checks: {e}");
            ExitCode::from(2)
        }
    }
}
