use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Azure block size: 4 MiB.
pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/beta";

/// Pipeline tunables, persisted as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadSettings {
    pub block_size: u64,
    /// Total attempts per block, first try included.
    pub block_retry_attempts: u32,
    pub block_retry_delay_ms: u64,
    /// Total create attempts on 503, first try included.
    pub create_max_attempts: u32,
    pub create_initial_delay_ms: u64,
    pub create_max_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub transfer_target_poll_attempts: u32,
    pub commit_poll_attempts: u32,
    pub request_timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_retry_attempts: 5,
            block_retry_delay_ms: 1_000,
            create_max_attempts: 5,
            create_initial_delay_ms: 500,
            create_max_delay_ms: 16_000,
            poll_interval_ms: 2_000,
            transfer_target_poll_attempts: 60,
            commit_poll_attempts: 60,
            request_timeout_secs: 300,
        }
    }
}

impl UploadSettings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.block_size == 0 {
            return Err(AppError::Config("blockSize must be positive".into()));
        }
        let attempts = [
            ("blockRetryAttempts", self.block_retry_attempts),
            ("createMaxAttempts", self.create_max_attempts),
            ("transferTargetPollAttempts", self.transfer_target_poll_attempts),
            ("commitPollAttempts", self.commit_poll_attempts),
        ];
        for (name, value) in attempts {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}

/// Backend endpoint and credential, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub base_url: String,
    pub access_token: String,
}

impl GraphConfig {
    /// Reads `GRAPH_BASE_URL` (optional) and `GRAPH_ACCESS_TOKEN` (required).
    pub fn from_env() -> crate::error::Result<Self> {
        let base_url = std::env::var("GRAPH_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GRAPH_BASE_URL.to_string());
        let access_token = std::env::var("GRAPH_ACCESS_TOKEN")
            .map_err(|_| AppError::Config("GRAPH_ACCESS_TOKEN is not set".into()))?;
        if access_token.trim().is_empty() {
            return Err(AppError::Config("GRAPH_ACCESS_TOKEN is empty".into()));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }
}
