use clap::Parser;
use faps::{supervisor, Args, Clock, DeviceEnumerator, InputDirScanner};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let clock = Clock::start();
    let config = Args::parse().into_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("faps=info")),
        )
        .init();

    let enumerator: Box<dyn DeviceEnumerator> = if config.devices.is_empty() {
        Box::new(InputDirScanner::default())
    } else {
        Box::new(config.devices.clone())
    };

    match supervisor::run(clock, &config, enumerator.as_ref()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}. Exiting...");
            ExitCode::FAILURE
        }
    }
}
