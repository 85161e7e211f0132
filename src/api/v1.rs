//! GraphApiV1: concrete `GraphApi` implementation over the Graph beta REST surface.
//!
//! Every request carries the bearer credential and a fresh `client-request-id`
//! so failures can be correlated with backend logs.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CredentialProvider, GraphApi};
use crate::error::AppError;
use crate::models::app::{AppLocator, AppPatch, AppPayload, AppRecord, PackageType};
use crate::models::content::{ContentFile, ContentFileRef, ContentFileRequest, ContentVersion};
use crate::models::encryption::{CommitRequest, EncryptionManifest};

const USER_AGENT: &str = concat!("intune-uploader/", env!("CARGO_PKG_VERSION"));
const MOBILE_APPS_PATH: &str = "deviceAppManagement/mobileApps";

/// OData collection envelope.
#[derive(Debug, Deserialize)]
struct ODataCollection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

pub struct GraphApiV1 {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl GraphApiV1 {
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
        timeout_secs: u64,
    ) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn app_url(&self, app_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, MOBILE_APPS_PATH, app_id)
    }

    /// `.../mobileApps/{id}/microsoft.graph.{type}/contentVersions`
    fn content_versions_url(&self, app: &AppLocator) -> String {
        format!(
            "{}/microsoft.graph.{}/contentVersions",
            self.app_url(&app.app_id),
            app.package_type.graph_name()
        )
    }

    fn files_url(&self, app: &AppLocator, version_id: &str) -> String {
        format!("{}/{}/files", self.content_versions_url(app), version_id)
    }

    fn file_url(&self, file: &ContentFileRef) -> String {
        format!("{}/{}", self.files_url(&file.app, &file.version_id), file.file_id)
    }

    fn request(&self, method: Method, url: &str) -> crate::error::Result<RequestBuilder> {
        let token = self.credentials.bearer_token()?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("client-request-id", uuid::Uuid::new_v4().to_string()))
    }

    /// Send and map any non-success status to `AppError::Status` with the body.
    async fn send(request: RequestBuilder) -> crate::error::Result<reqwest::Response> {
        let (client, request) = request.build_split();
        let request = request?;
        let method = request.method().clone();
        let url = request.url().path().to_string();
        let request_id = request
            .headers()
            .get("client-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let resp = client.execute(request).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        log::debug!(
            "Graph request failed: {} {} status={} client-request-id={}",
            method,
            url,
            status.as_u16(),
            request_id
        );
        Err(AppError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> crate::error::Result<T> {
        let resp = Self::send(request).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// OData filter restricting to one app type and one display name.
pub(crate) fn display_name_filter(package_type: PackageType, display_name: &str) -> String {
    format!(
        "isof('microsoft.graph.{}') and displayName eq '{}'",
        package_type.graph_name(),
        display_name.replace('\'', "''")
    )
}

impl GraphApi for GraphApiV1 {
    async fn find_apps_by_display_name(
        &self,
        package_type: PackageType,
        display_name: &str,
    ) -> crate::error::Result<Vec<AppRecord>> {
        let url = format!("{}/{}", self.base_url, MOBILE_APPS_PATH);
        let filter = display_name_filter(package_type, display_name);
        let request = self
            .request(Method::GET, &url)?
            .query(&[("$filter", filter.as_str())]);
        let collection: ODataCollection<AppRecord> = Self::send_json(request).await?;
        Ok(collection.value)
    }

    async fn create_app(&self, payload: &AppPayload) -> crate::error::Result<AppRecord> {
        let url = format!("{}/{}", self.base_url, MOBILE_APPS_PATH);
        let request = self.request(Method::POST, &url)?.json(payload);
        Self::send_json(request).await
    }

    async fn get_app(&self, app_id: &str) -> crate::error::Result<AppRecord> {
        let request = self.request(Method::GET, &self.app_url(app_id))?;
        Self::send_json(request).await
    }

    async fn update_app(&self, app_id: &str, patch: &AppPatch) -> crate::error::Result<()> {
        let request = self.request(Method::PATCH, &self.app_url(app_id))?.json(patch);
        Self::send(request).await?;
        Ok(())
    }

    async fn create_content_version(
        &self,
        app: &AppLocator,
    ) -> crate::error::Result<ContentVersion> {
        let request = self
            .request(Method::POST, &self.content_versions_url(app))?
            .json(&serde_json::json!({}));
        Self::send_json(request).await
    }

    async fn create_content_file(
        &self,
        app: &AppLocator,
        version_id: &str,
        file_request: &ContentFileRequest,
    ) -> crate::error::Result<ContentFile> {
        let request = self
            .request(Method::POST, &self.files_url(app, version_id))?
            .json(file_request);
        Self::send_json(request).await
    }

    async fn get_content_file(&self, file: &ContentFileRef) -> crate::error::Result<ContentFile> {
        let request = self.request(Method::GET, &self.file_url(file))?;
        Self::send_json(request).await
    }

    async fn commit_content_file(
        &self,
        file: &ContentFileRef,
        manifest: &EncryptionManifest,
    ) -> crate::error::Result<()> {
        let url = format!("{}/commit", self.file_url(file));
        let body = CommitRequest {
            file_encryption_info: manifest,
        };
        let request = self.request(Method::POST, &url)?.json(&body);
        Self::send(request).await?;
        Ok(())
    }
}
