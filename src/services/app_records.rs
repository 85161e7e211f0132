//! App record management: create or update the app record for a package,
//! point it at a committed content version, and attach its icon.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::api::GraphApi;
use crate::error::AppError;
use crate::models::app::{AppLocator, AppMetadata, AppPatch, AppPayload, AppRecord, MimeContent};
use crate::services::retry_engine::{self, BackoffPolicy};

/// Status reported when a create call succeeded but the record has no id.
const CREATED_STATUS: u16 = 201;

/// Result of a best-effort logo attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoOutcome {
    Attached,
    Skipped,
    Failed(String),
}

pub struct AppRecordManager<'a, G: GraphApi> {
    api: &'a G,
    create_policy: BackoffPolicy,
}

impl<'a, G: GraphApi> AppRecordManager<'a, G> {
    pub fn new(api: &'a G, create_policy: BackoffPolicy) -> Self {
        Self { api, create_policy }
    }

    /// Return the app record for `metadata`.
    ///
    /// With `update_existing`, a single record of the same package type whose
    /// display name matches exactly is updated in place. Otherwise a new record
    /// is created.
    pub async fn create_or_update(
        &self,
        metadata: &AppMetadata,
        update_existing: bool,
    ) -> crate::error::Result<AppRecord> {
        metadata.validate()?;

        if update_existing {
            if let Some(record) = self.find_existing(metadata).await? {
                return self.update_in_place(record, metadata).await;
            }
        }

        self.create(metadata).await
    }

    async fn find_existing(&self, metadata: &AppMetadata) -> crate::error::Result<Option<AppRecord>> {
        let candidates = self
            .api
            .find_apps_by_display_name(metadata.package_type(), &metadata.display_name)
            .await?;

        let mut matches: Vec<AppRecord> = candidates
            .into_iter()
            .filter(|r| r.display_name == metadata.display_name && !r.id.is_empty())
            .collect();

        match matches.len() {
            0 => {
                log::info!(
                    "No existing app named '{}', creating a new record",
                    metadata.display_name
                );
                Ok(None)
            }
            1 => Ok(matches.pop()),
            n => {
                log::warn!(
                    "{} apps named '{}', creating a new record instead of guessing",
                    n,
                    metadata.display_name
                );
                Ok(None)
            }
        }
    }

    async fn update_in_place(
        &self,
        mut record: AppRecord,
        metadata: &AppMetadata,
    ) -> crate::error::Result<AppRecord> {
        let patch = AppPatch::from_metadata(metadata);
        self.api.update_app(&record.id, &patch).await?;
        record.apply(&patch);
        log::info!(
            "Updated existing app: id={}, name='{}'",
            record.id,
            record.display_name
        );
        Ok(record)
    }

    async fn create(&self, metadata: &AppMetadata) -> crate::error::Result<AppRecord> {
        let payload = AppPayload::from_metadata(metadata)?;

        let result = retry_engine::retry_with_backoff(
            &self.create_policy,
            "create app",
            retry_engine::is_transient_unavailable,
            || self.api.create_app(&payload),
        )
        .await;

        let record = match result {
            Ok(record) => record,
            Err(exhausted) => {
                log::error!(
                    "App create failed after {} attempt(s): {}",
                    exhausted.attempts,
                    exhausted.last_error
                );
                return Err(match exhausted.last_error {
                    AppError::Status { status, body } => AppError::Create { status, body },
                    other => other,
                });
            }
        };

        if record.id.is_empty() {
            return Err(AppError::Create {
                status: CREATED_STATUS,
                body: "response is missing the app id".into(),
            });
        }

        log::info!(
            "Created app: id={}, name='{}'",
            record.id,
            record.display_name
        );
        Ok(record)
    }

    /// Point the record at `content_version_id`.
    ///
    /// The current display name, description, publisher and icon are read
    /// first and sent back unchanged. If that read fails, only the content
    /// version is patched.
    pub async fn finalize(
        &self,
        app: &AppLocator,
        content_version_id: &str,
    ) -> crate::error::Result<AppPatch> {
        let mut patch = AppPatch::new(app.package_type);
        patch.committed_content_version = Some(content_version_id.to_string());

        match self.api.get_app(&app.app_id).await {
            Ok(current) => {
                if !current.display_name.is_empty() {
                    patch.display_name = Some(current.display_name);
                }
                patch.description = current.description;
                patch.publisher = current.publisher;
                patch.large_icon = current.large_icon;
            }
            Err(e) => {
                log::error!(
                    "Could not read app {} before finalize, patching content version only: {}",
                    app.app_id,
                    e
                );
            }
        }

        self.api.update_app(&app.app_id, &patch).await?;
        log::info!(
            "App {} now points at content version {}",
            app.app_id,
            content_version_id
        );
        Ok(patch)
    }

    /// Attach the image at `logo_path` as the app's large icon.
    ///
    /// Never fails the caller: every problem is reported in the outcome.
    pub async fn attach_logo(&self, app: &AppLocator, logo_path: &Path) -> LogoOutcome {
        let mime_type = match image_mime_type(logo_path) {
            Some(mime) => mime,
            None => {
                return LogoOutcome::Failed(format!(
                    "unsupported image type: {}",
                    logo_path.display()
                ))
            }
        };

        let data = match tokio::fs::read(logo_path).await {
            Ok(data) => data,
            Err(e) => {
                return LogoOutcome::Failed(format!(
                    "cannot read {}: {}",
                    logo_path.display(),
                    e
                ))
            }
        };

        let mut patch = AppPatch::new(app.package_type);
        patch.large_icon = Some(MimeContent {
            mime_type: mime_type.to_string(),
            value: BASE64.encode(&data),
        });

        match self.api.update_app(&app.app_id, &patch).await {
            Ok(()) => {
                log::info!("Attached logo to app {}", app.app_id);
                LogoOutcome::Attached
            }
            Err(e) => LogoOutcome::Failed(e.to_string()),
        }
    }
}

fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::models::app::PackageType;
    use crate::models::content::{
        ContentFile, ContentFileRef, ContentFileRequest, ContentVersion,
    };
    use crate::models::encryption::EncryptionManifest;

    #[derive(Default)]
    struct RecordsFake {
        existing: Vec<AppRecord>,
        create_results: Mutex<VecDeque<crate::error::Result<AppRecord>>>,
        creates: Mutex<u32>,
        current: Option<AppRecord>,
        patches: Mutex<Vec<(String, AppPatch)>>,
        fail_patch: bool,
    }

    impl GraphApi for RecordsFake {
        async fn find_apps_by_display_name(
            &self,
            _package_type: PackageType,
            _display_name: &str,
        ) -> crate::error::Result<Vec<AppRecord>> {
            Ok(self.existing.clone())
        }

        async fn create_app(&self, payload: &AppPayload) -> crate::error::Result<AppRecord> {
            *self.creates.lock().unwrap() += 1;
            match self.create_results.lock().unwrap().pop_front() {
                Some(result) => result,
                None => Ok(AppRecord {
                    id: "new-app".into(),
                    display_name: payload.display_name.clone(),
                    ..Default::default()
                }),
            }
        }

        async fn get_app(&self, app_id: &str) -> crate::error::Result<AppRecord> {
            self.current.clone().ok_or_else(|| AppError::Status {
                status: 404,
                body: format!("{} not found", app_id),
            })
        }

        async fn update_app(&self, app_id: &str, patch: &AppPatch) -> crate::error::Result<()> {
            if self.fail_patch {
                return Err(AppError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            self.patches
                .lock()
                .unwrap()
                .push((app_id.to_string(), patch.clone()));
            Ok(())
        }

        async fn create_content_version(
            &self,
            _app: &AppLocator,
        ) -> crate::error::Result<ContentVersion> {
            unimplemented!()
        }

        async fn create_content_file(
            &self,
            _app: &AppLocator,
            _version_id: &str,
            _request: &ContentFileRequest,
        ) -> crate::error::Result<ContentFile> {
            unimplemented!()
        }

        async fn get_content_file(&self, _file: &ContentFileRef) -> crate::error::Result<ContentFile> {
            unimplemented!()
        }

        async fn commit_content_file(
            &self,
            _file: &ContentFileRef,
            _manifest: &EncryptionManifest,
        ) -> crate::error::Result<()> {
            unimplemented!()
        }
    }

    fn metadata() -> AppMetadata {
        AppMetadata {
            display_name: "Acme Tool".into(),
            description: "Acme tool".into(),
            version: "2.0".into(),
            file_name: "acme.pkg".into(),
            ..Default::default()
        }
    }

    fn fast_policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 2,
            max_attempts,
        }
    }

    fn record(id: &str, name: &str) -> AppRecord {
        AppRecord {
            id: id.into(),
            display_name: name.into(),
            ..Default::default()
        }
    }

    fn unavailable() -> crate::error::Result<AppRecord> {
        Err(AppError::Status {
            status: 503,
            body: "busy".into(),
        })
    }

    fn locator() -> AppLocator {
        AppLocator {
            app_id: "app-1".into(),
            package_type: PackageType::Pkg,
        }
    }

    #[tokio::test]
    async fn update_existing_patches_single_exact_match() {
        let fake = RecordsFake {
            existing: vec![record("app-7", "Acme Tool"), record("app-8", "acme tool")],
            ..Default::default()
        };
        let manager = AppRecordManager::new(&fake, fast_policy(3));

        let app = manager.create_or_update(&metadata(), true).await.unwrap();
        assert_eq!(app.id, "app-7");
        assert_eq!(app.version.as_deref(), Some("2.0"));
        assert_eq!(*fake.creates.lock().unwrap(), 0);

        let patches = fake.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0, "app-7");
    }

    #[tokio::test]
    async fn without_update_existing_always_creates() {
        let fake = RecordsFake {
            existing: vec![record("app-7", "Acme Tool")],
            ..Default::default()
        };
        let manager = AppRecordManager::new(&fake, fast_policy(3));
        let app = manager.create_or_update(&metadata(), false).await.unwrap();
        assert_eq!(app.id, "new-app");
        assert!(fake.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ambiguous_matches_create_new_record() {
        let fake = RecordsFake {
            existing: vec![record("a", "Acme Tool"), record("b", "Acme Tool")],
            ..Default::default()
        };
        let manager = AppRecordManager::new(&fake, fast_policy(3));
        let app = manager.create_or_update(&metadata(), true).await.unwrap();
        assert_eq!(app.id, "new-app");
    }

    #[tokio::test]
    async fn create_retries_unavailable_then_succeeds() {
        let fake = RecordsFake::default();
        {
            let mut results = fake.create_results.lock().unwrap();
            results.push_back(unavailable());
            results.push_back(unavailable());
        }
        let manager = AppRecordManager::new(&fake, fast_policy(3));
        let app = manager.create_or_update(&metadata(), false).await.unwrap();
        assert_eq!(app.id, "new-app");
        assert_eq!(*fake.creates.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn create_gives_up_after_policy_bound() {
        let fake = RecordsFake::default();
        {
            let mut results = fake.create_results.lock().unwrap();
            for _ in 0..3 {
                results.push_back(unavailable());
            }
        }
        let manager = AppRecordManager::new(&fake, fast_policy(3));
        let err = manager.create_or_update(&metadata(), false).await.unwrap_err();
        assert!(matches!(err, AppError::Create { status: 503, .. }));
        assert_eq!(*fake.creates.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn create_bad_request_is_not_retried() {
        let fake = RecordsFake::default();
        fake.create_results
            .lock()
            .unwrap()
            .push_back(Err(AppError::Status {
                status: 400,
                body: "invalid bundle id".into(),
            }));
        let manager = AppRecordManager::new(&fake, fast_policy(5));
        let err = manager.create_or_update(&metadata(), false).await.unwrap_err();
        match err {
            AppError::Create { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid bundle id");
            }
            other => panic!("Expected Create, got: {:?}", other),
        }
        assert_eq!(*fake.creates.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn create_response_without_id_is_fatal() {
        let fake = RecordsFake::default();
        fake.create_results
            .lock()
            .unwrap()
            .push_back(Ok(record("", "Acme Tool")));
        let manager = AppRecordManager::new(&fake, fast_policy(3));
        let err = manager.create_or_update(&metadata(), false).await.unwrap_err();
        assert!(matches!(err, AppError::Create { .. }));
    }

    #[tokio::test]
    async fn invalid_metadata_never_reaches_backend() {
        let fake = RecordsFake::default();
        let manager = AppRecordManager::new(&fake, fast_policy(3));
        let mut meta = metadata();
        meta.display_name = "  ".into();
        let err = manager.create_or_update(&meta, false).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(*fake.creates.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn finalize_preserves_current_fields() {
        let icon = MimeContent {
            mime_type: "image/png".into(),
            value: "aWNvbg==".into(),
        };
        let fake = RecordsFake {
            current: Some(AppRecord {
                id: "app-1".into(),
                display_name: "Acme Tool".into(),
                description: Some("kept".into()),
                publisher: Some("Acme".into()),
                large_icon: Some(icon.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let manager = AppRecordManager::new(&fake, fast_policy(1));
        let patch = manager.finalize(&locator(), "3").await.unwrap();

        assert_eq!(patch.committed_content_version.as_deref(), Some("3"));
        assert_eq!(patch.display_name.as_deref(), Some("Acme Tool"));
        assert_eq!(patch.description.as_deref(), Some("kept"));
        assert_eq!(patch.publisher.as_deref(), Some("Acme"));
        assert_eq!(patch.large_icon, Some(icon));
        assert_eq!(fake.patches.lock().unwrap()[0].1, patch);
    }

    #[tokio::test]
    async fn finalize_proceeds_when_read_fails() {
        let fake = RecordsFake::default();
        let manager = AppRecordManager::new(&fake, fast_policy(1));
        let patch = manager.finalize(&locator(), "3").await.unwrap();
        assert_eq!(patch.committed_content_version.as_deref(), Some("3"));
        assert_eq!(patch.display_name, None);

        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["@odata.type"], "#microsoft.graph.macOSPkgApp");
        assert!(json.get("description").is_none());
    }

    #[tokio::test]
    async fn logo_attached_as_base64_png() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.png");
        std::fs::write(&logo, b"\x89PNG").unwrap();

        let fake = RecordsFake::default();
        let manager = AppRecordManager::new(&fake, fast_policy(1));
        assert_eq!(manager.attach_logo(&locator(), &logo).await, LogoOutcome::Attached);

        let patches = fake.patches.lock().unwrap();
        let icon = patches[0].1.large_icon.clone().unwrap();
        assert_eq!(icon.mime_type, "image/png");
        assert_eq!(icon.value, BASE64.encode(b"\x89PNG"));
    }

    #[tokio::test]
    async fn logo_failures_are_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let fake = RecordsFake {
            fail_patch: true,
            ..Default::default()
        };
        let manager = AppRecordManager::new(&fake, fast_policy(1));

        let missing = dir.path().join("missing.png");
        assert!(matches!(
            manager.attach_logo(&locator(), &missing).await,
            LogoOutcome::Failed(_)
        ));

        let gif = dir.path().join("logo.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();
        assert!(matches!(
            manager.attach_logo(&locator(), &gif).await,
            LogoOutcome::Failed(_)
        ));

        let png = dir.path().join("logo.png");
        std::fs::write(&png, b"\x89PNG").unwrap();
        assert!(matches!(
            manager.attach_logo(&locator(), &png).await,
            LogoOutcome::Failed(_)
        ));
    }
}
