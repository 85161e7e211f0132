//! Upload engine: runs the full pipeline for one installer package.
//!
//! ```text
//! app record -> encrypt -> content version -> content file
//!            -> commit coordinator -> finalize -> logo
//! ```
//!
//! Every step is awaited in order and nothing is retried across steps. A
//! failure is reported as an `UploadFailure` naming the step. The encrypted
//! blob lives in a scoped temp file that is removed on every exit path.

use std::path::PathBuf;

use crate::api::{BlobStore, GraphApi};
use crate::error::{AppError, Stage, UploadFailure};
use crate::models::app::{AppLocator, AppMetadata, AppRecord};
use crate::models::content::{ContentFileRef, ContentFileRequest};
use crate::models::file::PackageFile;
use crate::models::settings::UploadSettings;
use crate::services::app_records::{AppRecordManager, LogoOutcome};
use crate::services::blob_uploader::ChunkedBlobUploader;
use crate::services::commit_coordinator::{ContentCommitCoordinator, PollSettings};
use crate::services::encryptor::{self, EncryptedPackage};
use crate::services::retry_engine::{BackoffPolicy, FixedRetry};

/// One package to publish.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_path: PathBuf,
    pub metadata: AppMetadata,
    pub update_existing: bool,
    pub logo_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub app: AppRecord,
    pub content_version_id: String,
    pub logo: LogoOutcome,
}

type StageResult<T> = std::result::Result<T, UploadFailure>;

fn at(stage: Stage) -> impl FnOnce(AppError) -> UploadFailure {
    move |source| UploadFailure::new(stage, source)
}

pub struct UploadEngine<G: GraphApi, B: BlobStore> {
    api: G,
    blob_store: B,
    settings: UploadSettings,
}

impl<G: GraphApi, B: BlobStore> UploadEngine<G, B> {
    pub fn new(api: G, blob_store: B, settings: UploadSettings) -> crate::error::Result<Self> {
        settings.validate()?;
        Ok(Self {
            api,
            blob_store,
            settings,
        })
    }

    /// Publish `request.file_path` as the content of an app record.
    pub async fn upload(&self, request: &UploadRequest) -> StageResult<UploadOutcome> {
        let result = self.run(request).await;
        if let Err(failure) = &result {
            log::error!("{}", failure);
        }
        result
    }

    async fn run(&self, request: &UploadRequest) -> StageResult<UploadOutcome> {
        let package_file = PackageFile::from_path(&request.file_path).map_err(at(Stage::Validate))?;
        let mut metadata = request.metadata.clone();
        if metadata.file_name.trim().is_empty() {
            metadata.file_name = package_file.file_name.clone();
        }
        metadata.validate().map_err(at(Stage::Validate))?;

        log::info!(
            "Starting upload: file={}, size={}, name='{}', version={}",
            package_file.file_name,
            package_file.file_size,
            metadata.display_name,
            metadata.version
        );

        let records = AppRecordManager::new(&self.api, BackoffPolicy::for_create(&self.settings));
        let mut app = records
            .create_or_update(&metadata, request.update_existing)
            .await
            .map_err(at(Stage::Record))?;
        let locator = AppLocator {
            app_id: app.id.clone(),
            package_type: metadata.package_type(),
        };

        let EncryptedPackage { blob, manifest } = encryptor::encrypt_file(&package_file.file_path)
            .await
            .map_err(at(Stage::Encrypt))?;
        log::info!(
            "Encrypted package: plaintext={} bytes, encrypted={} bytes",
            blob.plaintext_size,
            blob.encrypted_size
        );

        let version = self
            .api
            .create_content_version(&locator)
            .await
            .map_err(at(Stage::ContentVersion))?;
        if version.id.is_empty() {
            return Err(UploadFailure::new(
                Stage::ContentVersion,
                AppError::Api("content version response is missing the id".into()),
            ));
        }
        log::info!("Created content version {} for app {}", version.id, app.id);

        let file_request =
            ContentFileRequest::new(&metadata.file_name, blob.plaintext_size, blob.encrypted_size);
        let content_file = self
            .api
            .create_content_file(&locator, &version.id, &file_request)
            .await
            .map_err(at(Stage::ContentFile))?;
        if content_file.id.is_empty() {
            return Err(UploadFailure::new(
                Stage::ContentFile,
                AppError::Api("content file response is missing the id".into()),
            ));
        }
        let file_ref = ContentFileRef {
            app: locator.clone(),
            version_id: version.id.clone(),
            file_id: content_file.id,
        };

        let uploader = ChunkedBlobUploader::new(
            &self.blob_store,
            self.settings.block_size,
            FixedRetry::for_blocks(&self.settings),
        );
        let mut coordinator = ContentCommitCoordinator::new(
            &self.api,
            uploader,
            PollSettings::from_settings(&self.settings),
        );
        coordinator
            .run(&file_ref, &blob, &manifest)
            .await
            .map_err(at(Stage::Commit))?;

        if let Err(e) = blob.close() {
            log::warn!("Could not remove encrypted temp file: {}", e);
        }

        let patch = records
            .finalize(&locator, &version.id)
            .await
            .map_err(at(Stage::Finalize))?;
        app.apply(&patch);

        let logo = match &request.logo_path {
            Some(path) => records.attach_logo(&locator, path).await,
            None => LogoOutcome::Skipped,
        };
        if let LogoOutcome::Failed(reason) = &logo {
            log::error!("Logo not attached to app {}: {}", app.id, reason);
        }

        log::info!(
            "Upload complete: app={}, contentVersion={}",
            app.id,
            version.id
        );
        Ok(UploadOutcome {
            app,
            content_version_id: version.id,
            logo,
        })
    }
}
