//! Backend API abstraction layer.
//!
//! Every HTTP interaction lives under `api/`. Two traits cover the two remote
//! parties: `GraphApi` for the device-management backend (app records, content
//! versions, content files) and `BlobStore` for the pre-authorized blob target
//! the encrypted bytes are written to. `services/` only talks through these
//! traits, which also lets the pipeline run against in-memory backends in tests.
//!
//! Non-success HTTP responses surface as `AppError::Status`; the services decide
//! whether a given status is retried or escalated.

use std::future::Future;

use crate::error::AppError;
use crate::models::app::{AppLocator, AppPatch, AppPayload, AppRecord, PackageType};
use crate::models::content::{ContentFile, ContentFileRef, ContentFileRequest, ContentVersion};
use crate::models::encryption::EncryptionManifest;

pub mod blob;
pub mod v1;

/// Supplies the bearer credential for backend calls. Token acquisition and
/// refresh happen outside this crate.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> crate::error::Result<String>;
}

/// A token obtained elsewhere and handed in as-is.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> crate::error::Result<String> {
        if self.0.is_empty() {
            return Err(AppError::Config("bearer token is empty".into()));
        }
        Ok(self.0.clone())
    }
}

/// Device-management backend operations used by the pipeline.
pub trait GraphApi: Send + Sync {
    /// App records of the given type whose display name matches `display_name`.
    /// The backend comparison may be case-insensitive; callers filter exactly.
    fn find_apps_by_display_name(
        &self,
        package_type: PackageType,
        display_name: &str,
    ) -> impl Future<Output = crate::error::Result<Vec<AppRecord>>> + Send;

    fn create_app(
        &self,
        payload: &AppPayload,
    ) -> impl Future<Output = crate::error::Result<AppRecord>> + Send;

    fn get_app(&self, app_id: &str) -> impl Future<Output = crate::error::Result<AppRecord>> + Send;

    /// Partial update; the backend answers without a body.
    fn update_app(
        &self,
        app_id: &str,
        patch: &AppPatch,
    ) -> impl Future<Output = crate::error::Result<()>> + Send;

    fn create_content_version(
        &self,
        app: &AppLocator,
    ) -> impl Future<Output = crate::error::Result<ContentVersion>> + Send;

    fn create_content_file(
        &self,
        app: &AppLocator,
        version_id: &str,
        request: &ContentFileRequest,
    ) -> impl Future<Output = crate::error::Result<ContentFile>> + Send;

    /// Single read of the current file status.
    fn get_content_file(
        &self,
        file: &ContentFileRef,
    ) -> impl Future<Output = crate::error::Result<ContentFile>> + Send;

    fn commit_content_file(
        &self,
        file: &ContentFileRef,
        manifest: &EncryptionManifest,
    ) -> impl Future<Output = crate::error::Result<()>> + Send;
}

/// Block-oriented writes to a pre-authorized blob URI.
pub trait BlobStore: Send + Sync {
    /// Stage one block under `block_id`.
    fn put_block(
        &self,
        target_uri: &str,
        block_id: &str,
        data: bytes::Bytes,
    ) -> impl Future<Output = crate::error::Result<()>> + Send;

    /// Assemble the blob from staged blocks, in the given order.
    fn put_block_list(
        &self,
        target_uri: &str,
        block_ids: &[String],
    ) -> impl Future<Output = crate::error::Result<()>> + Send;
}
