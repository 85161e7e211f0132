//! Content commit coordinator.
//!
//! Drives one content file through its lifecycle:
//!
//! ```text
//! created -> awaitingTransferTarget -> transferTargetReady -> committed
//!         -> commitSucceeded | commitFailed
//! ```
//!
//! Both waits are polling loops with a fixed interval and a bounded number of
//! attempts. Every poll is a single status read. A backend failure state ends
//! the run immediately; a state that moves backwards in the lifecycle is
//! treated the same way.

use std::time::Duration;

use crate::api::{BlobStore, GraphApi};
use crate::error::{AppError, PollStage};
use crate::models::content::{ContentFile, ContentFileRef, UploadState};
use crate::models::encryption::EncryptionManifest;
use crate::models::settings::UploadSettings;
use crate::services::blob_uploader::ChunkedBlobUploader;
use crate::services::encryptor::EncryptedBlob;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitState {
    Created,
    AwaitingTransferTarget,
    TransferTargetReady { transfer_uri: String },
    Committed,
    CommitSucceeded,
    CommitFailed(String),
}

impl CommitState {
    fn name(&self) -> &'static str {
        match self {
            CommitState::Created => "created",
            CommitState::AwaitingTransferTarget => "awaitingTransferTarget",
            CommitState::TransferTargetReady { .. } => "transferTargetReady",
            CommitState::Committed => "committed",
            CommitState::CommitSucceeded => "commitSucceeded",
            CommitState::CommitFailed(_) => "commitFailed",
        }
    }
}

/// Polling cadence for both waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub transfer_target_attempts: u32,
    pub commit_attempts: u32,
}

impl PollSettings {
    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self {
            interval_ms: settings.poll_interval_ms,
            transfer_target_attempts: settings.transfer_target_poll_attempts,
            commit_attempts: settings.commit_poll_attempts,
        }
    }
}

pub struct ContentCommitCoordinator<'a, G: GraphApi, B: BlobStore> {
    api: &'a G,
    uploader: ChunkedBlobUploader<'a, B>,
    poll: PollSettings,
    state: CommitState,
    highest_rank: u8,
}

impl<'a, G: GraphApi, B: BlobStore> ContentCommitCoordinator<'a, G, B> {
    pub fn new(api: &'a G, uploader: ChunkedBlobUploader<'a, B>, poll: PollSettings) -> Self {
        Self {
            api,
            uploader,
            poll,
            state: CommitState::Created,
            highest_rank: 0,
        }
    }

    pub fn state(&self) -> &CommitState {
        &self.state
    }

    /// Wait for the transfer target, upload the blob, commit it and wait for
    /// the backend to confirm.
    ///
    /// On failure the coordinator is left in `CommitFailed` with the reason.
    pub async fn run(
        &mut self,
        file: &ContentFileRef,
        blob: &EncryptedBlob,
        manifest: &EncryptionManifest,
    ) -> crate::error::Result<()> {
        let result = self.drive(file, blob, manifest).await;
        if let Err(e) = &result {
            self.transition(CommitState::CommitFailed(e.to_string()));
        }
        result
    }

    async fn drive(
        &mut self,
        file: &ContentFileRef,
        blob: &EncryptedBlob,
        manifest: &EncryptionManifest,
    ) -> crate::error::Result<()> {
        self.transition(CommitState::AwaitingTransferTarget);
        let transfer_uri = self.wait_for_transfer_target(file).await?;
        self.transition(CommitState::TransferTargetReady {
            transfer_uri: transfer_uri.clone(),
        });

        self.uploader.upload(blob, &transfer_uri).await?;

        self.api.commit_content_file(file, manifest).await?;
        self.transition(CommitState::Committed);

        self.wait_for_commit(file).await?;
        self.transition(CommitState::CommitSucceeded);
        Ok(())
    }

    async fn wait_for_transfer_target(
        &mut self,
        file: &ContentFileRef,
    ) -> crate::error::Result<String> {
        let attempts = self.poll.transfer_target_attempts.max(1);
        for attempt in 1..=attempts {
            let status = self.api.get_content_file(file).await?;
            self.observe(file, &status)?;

            if status.upload_state.is_transfer_target_ready() {
                match status.transfer_uri {
                    Some(uri) if !uri.is_empty() => return Ok(uri),
                    _ => log::debug!(
                        "File {} reports {} without a transfer URI",
                        file.file_id,
                        status.upload_state
                    ),
                }
            }

            if attempt < attempts {
                self.sleep().await;
            }
        }

        log::error!(
            "Transfer target not ready after {} polls: file={}",
            attempts,
            file.file_id
        );
        Err(AppError::Timeout(PollStage::TransferTarget))
    }

    async fn wait_for_commit(&mut self, file: &ContentFileRef) -> crate::error::Result<()> {
        let attempts = self.poll.commit_attempts.max(1);
        for attempt in 1..=attempts {
            let status = self.api.get_content_file(file).await?;
            self.observe(file, &status)?;

            if status.upload_state == UploadState::CommitFileSuccess {
                return Ok(());
            }

            if attempt < attempts {
                self.sleep().await;
            }
        }

        log::error!(
            "Commit not confirmed after {} polls: file={}",
            attempts,
            file.file_id
        );
        Err(AppError::Timeout(PollStage::Commit))
    }

    /// Fail on backend failure states and on backwards movement.
    fn observe(&mut self, file: &ContentFileRef, status: &ContentFile) -> crate::error::Result<()> {
        let state = status.upload_state;
        log::debug!("Poll: file={} uploadState={}", file.file_id, state);

        if state.is_failure() {
            return Err(AppError::CommitFailed(format!(
                "uploadState={} file={}",
                state, file.file_id
            )));
        }

        if state == UploadState::TransientError {
            log::warn!(
                "Transient backend error, polling again: file={}",
                file.file_id
            );
        }

        if let Some(rank) = state.rank() {
            if rank < self.highest_rank {
                return Err(AppError::CommitFailed(format!(
                    "uploadState={} file={} moved backwards",
                    state, file.file_id
                )));
            }
            self.highest_rank = rank;
        }
        Ok(())
    }

    async fn sleep(&self) {
        tokio::time::sleep(Duration::from_millis(self.poll.interval_ms)).await;
    }

    fn transition(&mut self, next: CommitState) {
        log::info!("Content file state: {} -> {}", self.state.name(), next.name());
        self.state = next;
    }
}
