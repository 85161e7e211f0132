//! Content version and content file models.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::app::AppLocator;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentVersion {
    pub id: String,
}

/// Body of the file-entry create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFileRequest {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub name: String,
    pub size: u64,
    pub size_encrypted: u64,
    pub is_dependency: bool,
}

impl ContentFileRequest {
    pub fn new(name: &str, size: u64, size_encrypted: u64) -> Self {
        Self {
            odata_type: "#microsoft.graph.mobileAppContentFile".to_string(),
            name: name.to_string(),
            size,
            size_encrypted,
            is_dependency: false,
        }
    }
}

/// Upload state of a content file as the backend reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadState {
    Success,
    TransientError,
    Error,
    AzureStorageUriRequestSuccess,
    AzureStorageUriRequestPending,
    AzureStorageUriRequestFailed,
    AzureStorageUriRequestTimedOut,
    AzureStorageUriRenewalSuccess,
    AzureStorageUriRenewalPending,
    AzureStorageUriRenewalFailed,
    AzureStorageUriRenewalTimedOut,
    CommitFileSuccess,
    CommitFilePending,
    CommitFileFailed,
    CommitFileTimedOut,
    #[default]
    #[serde(other)]
    Unknown,
}

impl UploadState {
    /// Position in the forward-only lifecycle. States without a position
    /// (`success`, `transientError`, `unknown`) carry no ordering information.
    pub fn rank(&self) -> Option<u8> {
        use UploadState::*;
        match self {
            AzureStorageUriRequestPending => Some(1),
            AzureStorageUriRequestSuccess
            | AzureStorageUriRenewalPending
            | AzureStorageUriRenewalSuccess => Some(2),
            CommitFilePending => Some(3),
            CommitFileSuccess => Some(4),
            _ => None,
        }
    }

    /// Backend-reported terminal failure.
    pub fn is_failure(&self) -> bool {
        use UploadState::*;
        matches!(
            self,
            Error
                | AzureStorageUriRequestFailed
                | AzureStorageUriRequestTimedOut
                | AzureStorageUriRenewalFailed
                | AzureStorageUriRenewalTimedOut
                | CommitFileFailed
                | CommitFileTimedOut
        )
    }

    pub fn is_transfer_target_ready(&self) -> bool {
        matches!(
            self,
            UploadState::AzureStorageUriRequestSuccess | UploadState::AzureStorageUriRenewalSuccess
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use UploadState::*;
        let name = match self {
            Success => "success",
            TransientError => "transientError",
            Error => "error",
            Unknown => "unknown",
            AzureStorageUriRequestSuccess => "azureStorageUriRequestSuccess",
            AzureStorageUriRequestPending => "azureStorageUriRequestPending",
            AzureStorageUriRequestFailed => "azureStorageUriRequestFailed",
            AzureStorageUriRequestTimedOut => "azureStorageUriRequestTimedOut",
            AzureStorageUriRenewalSuccess => "azureStorageUriRenewalSuccess",
            AzureStorageUriRenewalPending => "azureStorageUriRenewalPending",
            AzureStorageUriRenewalFailed => "azureStorageUriRenewalFailed",
            AzureStorageUriRenewalTimedOut => "azureStorageUriRenewalTimedOut",
            CommitFileSuccess => "commitFileSuccess",
            CommitFilePending => "commitFilePending",
            CommitFileFailed => "commitFileFailed",
            CommitFileTimedOut => "commitFileTimedOut",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub size_encrypted: u64,
    pub upload_state: UploadState,
    #[serde(rename = "azureStorageUri")]
    pub transfer_uri: Option<String>,
}

/// Addresses one content file of one content version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFileRef {
    pub app: AppLocator,
    pub version_id: String,
    pub file_id: String,
}
