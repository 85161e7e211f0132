//! In-memory backend for pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use intune_uploader::api::{BlobStore, GraphApi};
use intune_uploader::error::{AppError, Result};
use intune_uploader::models::app::{AppLocator, AppPatch, AppPayload, AppRecord, PackageType};
use intune_uploader::models::content::{
    ContentFile, ContentFileRef, ContentFileRequest, ContentVersion, UploadState,
};
use intune_uploader::models::encryption::EncryptionManifest;
use intune_uploader::models::settings::UploadSettings;

pub const TRANSFER_URI: &str = "https://blob.example/content/file?sv=2020&sig=abc";

#[derive(Default)]
pub struct BackendState {
    pub apps: Vec<AppRecord>,
    pub create_payloads: Vec<AppPayload>,
    /// Number of upcoming create calls answered with 503.
    pub create_unavailable: u32,
    pub patches: Vec<(String, AppPatch)>,
    pub fail_icon_patch: bool,
    pub content_versions: u32,
    pub file_requests: Vec<ContentFileRequest>,
    /// Upload states returned by successive status reads; the last repeats.
    pub states: VecDeque<UploadState>,
    pub status_reads: u32,
    pub commits: Vec<EncryptionManifest>,
}

#[derive(Clone, Default)]
pub struct FakeGraph {
    pub state: Arc<Mutex<BackendState>>,
}

impl FakeGraph {
    pub fn with_states(states: &[UploadState]) -> Self {
        let graph = Self::default();
        graph.state.lock().unwrap().states = states.iter().copied().collect();
        graph
    }

    pub fn happy() -> Self {
        Self::with_states(&[
            UploadState::AzureStorageUriRequestPending,
            UploadState::AzureStorageUriRequestSuccess,
            UploadState::CommitFilePending,
            UploadState::CommitFileSuccess,
        ])
    }

    pub fn add_app(&self, id: &str, name: &str) {
        self.state.lock().unwrap().apps.push(AppRecord {
            id: id.into(),
            display_name: name.into(),
            ..Default::default()
        });
    }

    pub fn committed_version_patches(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .patches
            .iter()
            .filter_map(|(id, p)| {
                p.committed_content_version
                    .clone()
                    .map(|v| (id.clone(), v))
            })
            .collect()
    }
}

impl GraphApi for FakeGraph {
    async fn find_apps_by_display_name(
        &self,
        _package_type: PackageType,
        display_name: &str,
    ) -> Result<Vec<AppRecord>> {
        // The real filter is case-insensitive.
        let wanted = display_name.to_lowercase();
        Ok(self
            .state
            .lock()
            .unwrap()
            .apps
            .iter()
            .filter(|a| a.display_name.to_lowercase() == wanted)
            .cloned()
            .collect())
    }

    async fn create_app(&self, payload: &AppPayload) -> Result<AppRecord> {
        let mut state = self.state.lock().unwrap();
        state.create_payloads.push(payload.clone());
        if state.create_unavailable > 0 {
            state.create_unavailable -= 1;
            return Err(AppError::Status {
                status: 503,
                body: "Service Unavailable".into(),
            });
        }
        let record = AppRecord {
            id: format!("app-{}", state.apps.len() + 1),
            display_name: payload.display_name.clone(),
            description: Some(payload.description.clone()),
            publisher: Some(payload.publisher.clone()),
            ..Default::default()
        };
        state.apps.push(record.clone());
        Ok(record)
    }

    async fn get_app(&self, app_id: &str) -> Result<AppRecord> {
        self.state
            .lock()
            .unwrap()
            .apps
            .iter()
            .find(|a| a.id == app_id)
            .cloned()
            .ok_or_else(|| AppError::Status {
                status: 404,
                body: "not found".into(),
            })
    }

    async fn update_app(&self, app_id: &str, patch: &AppPatch) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_icon_patch && patch.large_icon.is_some() && patch.committed_content_version.is_none() {
            return Err(AppError::Status {
                status: 500,
                body: "icon rejected".into(),
            });
        }
        state.patches.push((app_id.to_string(), patch.clone()));
        if let Some(app) = state.apps.iter_mut().find(|a| a.id == app_id) {
            app.apply(patch);
        }
        Ok(())
    }

    async fn create_content_version(&self, _app: &AppLocator) -> Result<ContentVersion> {
        let mut state = self.state.lock().unwrap();
        state.content_versions += 1;
        Ok(ContentVersion {
            id: state.content_versions.to_string(),
        })
    }

    async fn create_content_file(
        &self,
        _app: &AppLocator,
        _version_id: &str,
        request: &ContentFileRequest,
    ) -> Result<ContentFile> {
        self.state
            .lock()
            .unwrap()
            .file_requests
            .push(request.clone());
        Ok(ContentFile {
            id: "file-1".into(),
            name: request.name.clone(),
            size: request.size,
            size_encrypted: request.size_encrypted,
            ..Default::default()
        })
    }

    async fn get_content_file(&self, file: &ContentFileRef) -> Result<ContentFile> {
        let mut state = self.state.lock().unwrap();
        state.status_reads += 1;
        let upload_state = if state.states.len() > 1 {
            state.states.pop_front().unwrap_or_default()
        } else {
            state.states.front().copied().unwrap_or_default()
        };
        Ok(ContentFile {
            id: file.file_id.clone(),
            upload_state,
            transfer_uri: Some(TRANSFER_URI.into()),
            ..Default::default()
        })
    }

    async fn commit_content_file(
        &self,
        _file: &ContentFileRef,
        manifest: &EncryptionManifest,
    ) -> Result<()> {
        self.state.lock().unwrap().commits.push(manifest.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct BlobState {
    pub blocks: Vec<(String, usize)>,
    pub lists: Vec<Vec<String>>,
    /// Block index that always fails with 500.
    pub fail_block: Option<usize>,
}

#[derive(Clone, Default)]
pub struct FakeBlobStore {
    pub state: Arc<Mutex<BlobState>>,
}

impl BlobStore for FakeBlobStore {
    async fn put_block(&self, target_uri: &str, block_id: &str, data: bytes::Bytes) -> Result<()> {
        assert_eq!(target_uri, TRANSFER_URI);
        let mut state = self.state.lock().unwrap();
        if state.fail_block == Some(state.blocks.len()) {
            return Err(AppError::Status {
                status: 500,
                body: "InternalError".into(),
            });
        }
        state.blocks.push((block_id.to_string(), data.len()));
        Ok(())
    }

    async fn put_block_list(&self, _target_uri: &str, block_ids: &[String]) -> Result<()> {
        self.state.lock().unwrap().lists.push(block_ids.to_vec());
        Ok(())
    }
}

/// Settings with millisecond delays.
pub fn fast_settings() -> UploadSettings {
    UploadSettings {
        block_retry_attempts: 2,
        block_retry_delay_ms: 1,
        create_initial_delay_ms: 1,
        create_max_delay_ms: 4,
        poll_interval_ms: 1,
        transfer_target_poll_attempts: 5,
        commit_poll_attempts: 5,
        ..UploadSettings::default()
    }
}

/// Write `len` bytes of patterned data to `dir/name`.
pub fn write_package(dir: &Path, name: &str, len: usize) -> std::path::PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 241) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

/// Names of the files left in `dir`.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
