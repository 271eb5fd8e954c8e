//! calsync: reconcile every mapping in the configured file, once, and exit

use std::process::ExitCode;

use calsync::config;
use calsync::Orchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = match config::config_path() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("error resolving config path: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let cfg = match config::load(&path) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error loading config from {}: {}", path.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = match Orchestrator::new(cfg) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            eprintln!("error setting up backends: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match orchestrator.run().await {
        Ok(()) => {
            println!("All sync operations completed.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("sync failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
