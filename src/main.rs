use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use intune_uploader::commands::upload::{self, UploadArgs};
use intune_uploader::services::app_records::LogoOutcome;

/// `RUST_LOG` if set, otherwise `info`. Call after `.env` is loaded.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(log_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = UploadArgs::parse();
    match upload::execute(&args).await {
        Ok(outcome) => {
            println!("app id: {}", outcome.app.id);
            println!("content version: {}", outcome.content_version_id);
            if let LogoOutcome::Failed(reason) = &outcome.logo {
                println!("logo: not attached ({})", reason);
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("error: {}", failure);
            ExitCode::FAILURE
        }
    }
}
