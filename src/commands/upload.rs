//! `intune-upload`: publish one installer package.

use std::path::PathBuf;

use clap::Parser;

use crate::api::blob::AzureBlobClient;
use crate::api::v1::GraphApiV1;
use crate::api::StaticToken;
use crate::error::{Stage, UploadFailure};
use crate::models::app::AppMetadata;
use crate::models::settings::{GraphConfig, UploadSettings};
use crate::services::upload_engine::{UploadEngine, UploadOutcome, UploadRequest};
use crate::storage::settings::load_settings;

#[derive(Debug, Parser)]
#[command(name = "intune-upload")]
#[command(about = "Encrypt a macOS installer and publish it as an Intune app", long_about = None)]
pub struct UploadArgs {
    /// Installer package (.pkg or .dmg)
    #[arg(long)]
    pub file: PathBuf,

    /// App display name
    #[arg(long)]
    pub name: String,

    /// App version
    #[arg(long)]
    pub version: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Bundle id; derived from the display name when omitted
    #[arg(long)]
    pub bundle_id: Option<String>,

    #[arg(long)]
    pub publisher: Option<String>,

    #[arg(long)]
    pub developer: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub info_url: Option<String>,

    #[arg(long)]
    pub privacy_url: Option<String>,

    /// Minimum macOS version flag, e.g. v12_0
    #[arg(long)]
    pub minimum_os: Option<String>,

    /// PNG or JPEG icon
    #[arg(long)]
    pub logo: Option<PathBuf>,

    /// Update the app with the same display name instead of creating one
    #[arg(long)]
    pub update_existing: bool,

    /// JSON settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl UploadArgs {
    pub fn to_request(&self) -> UploadRequest {
        let file_name = self
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let description = if self.description.trim().is_empty() {
            self.name.clone()
        } else {
            self.description.clone()
        };

        UploadRequest {
            file_path: self.file.clone(),
            metadata: AppMetadata {
                display_name: self.name.clone(),
                description,
                version: self.version.clone(),
                file_name,
                bundle_id: self.bundle_id.clone(),
                publisher: self.publisher.clone(),
                developer: self.developer.clone(),
                owner: self.owner.clone(),
                info_url: self.info_url.clone(),
                privacy_url: self.privacy_url.clone(),
                minimum_os: self.minimum_os.clone(),
            },
            update_existing: self.update_existing,
            logo_path: self.logo.clone(),
        }
    }
}

/// Load configuration, build the clients and run the pipeline.
pub async fn execute(args: &UploadArgs) -> Result<UploadOutcome, UploadFailure> {
    let config_failure = |source| UploadFailure::new(Stage::Validate, source);

    let settings = match &args.settings {
        Some(path) => load_settings(path).map_err(config_failure)?,
        None => UploadSettings::default(),
    };
    let graph = GraphConfig::from_env().map_err(config_failure)?;
    log::debug!("Graph endpoint: {}", graph.base_url);

    let api = GraphApiV1::new(
        &graph.base_url,
        std::sync::Arc::new(StaticToken::new(graph.access_token)),
        settings.request_timeout_secs,
    )
    .map_err(config_failure)?;
    let blob_store = AzureBlobClient::new(settings.request_timeout_secs).map_err(config_failure)?;

    let engine = UploadEngine::new(api, blob_store, settings).map_err(config_failure)?;
    engine.upload(&args.to_request()).await
}
