//! App record models: the metadata the caller supplies, the payloads sent to
//! the backend, and the record the backend returns.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const ODATA_PREFIX: &str = "#microsoft.graph.";
const BUNDLE_ID_PREFIX: &str = "com.intune.app";
const DEFAULT_MINIMUM_OS: &str = "v11_0";

/// Installer flavour, derived from the package file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    Pkg,
    Dmg,
}

impl PackageType {
    pub fn from_file_name(file_name: &str) -> Self {
        if file_name.to_ascii_lowercase().ends_with(".dmg") {
            PackageType::Dmg
        } else {
            PackageType::Pkg
        }
    }

    /// Graph type name, used in typed URL segments and `isof` filters.
    pub fn graph_name(&self) -> &'static str {
        match self {
            PackageType::Pkg => "macOSPkgApp",
            PackageType::Dmg => "macOSDmgApp",
        }
    }

    pub fn odata_type(&self) -> String {
        format!("{}{}", ODATA_PREFIX, self.graph_name())
    }
}

/// Locates an app record together with its type, which every content call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLocator {
    pub app_id: String,
    pub package_type: PackageType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumOs {
    #[serde(
        rename = "@odata.type",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub odata_type: String,
    #[serde(flatten)]
    pub versions: BTreeMap<String, bool>,
}

impl MinimumOs {
    /// Minimum macOS release, given as a Graph flag name such as `v11_0`.
    pub fn macos(version_flag: &str) -> Self {
        let mut versions = BTreeMap::new();
        versions.insert(version_flag.to_string(), true);
        Self {
            odata_type: format!("{}macOSMinimumOperatingSystem", ODATA_PREFIX),
            versions,
        }
    }
}

impl Default for MinimumOs {
    fn default() -> Self {
        Self::macos(DEFAULT_MINIMUM_OS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeContent {
    #[serde(rename = "type")]
    pub mime_type: String,
    pub value: String,
}

/// Package metadata supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppMetadata {
    pub display_name: String,
    pub description: String,
    pub version: String,
    pub file_name: String,
    pub bundle_id: Option<String>,
    pub publisher: Option<String>,
    pub developer: Option<String>,
    pub owner: Option<String>,
    pub info_url: Option<String>,
    pub privacy_url: Option<String>,
    pub minimum_os: Option<String>,
}

impl AppMetadata {
    /// Rejects metadata that would only fail later at the backend.
    pub fn validate(&self) -> crate::error::Result<()> {
        let required = [
            ("display name", &self.display_name),
            ("version", &self.version),
            ("file name", &self.file_name),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} is required", label)));
            }
        }
        Ok(())
    }

    pub fn package_type(&self) -> PackageType {
        PackageType::from_file_name(&self.file_name)
    }

    /// Bundle id as supplied, or one synthesized from the display name.
    pub fn resolved_bundle_id(&self) -> crate::error::Result<String> {
        match self.bundle_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => synthesize_bundle_id(&self.display_name),
        }
    }

    fn minimum_os(&self) -> MinimumOs {
        self.minimum_os
            .as_deref()
            .map(MinimumOs::macos)
            .unwrap_or_default()
    }
}

/// Build a bundle id from a display name: lowercase alphanumerics only.
pub fn synthesize_bundle_id(display_name: &str) -> crate::error::Result<String> {
    let re = Regex::new(r"[^a-z0-9]+")
        .map_err(|e| AppError::Internal(format!("Regex compile error: {}", e)))?;
    let lowered = display_name.to_lowercase();
    let sanitized = re.replace_all(&lowered, "");
    if sanitized.is_empty() {
        Ok(format!("{}.package", BUNDLE_ID_PREFIX))
    } else {
        Ok(format!("{}.{}", BUNDLE_ID_PREFIX, sanitized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedApp {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub bundle_id: String,
    pub bundle_version: String,
}

/// Full create payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPayload {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub display_name: String,
    pub description: String,
    pub publisher: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub file_name: String,
    pub bundle_id: String,
    pub version_number: String,
    pub primary_bundle_id: String,
    pub primary_bundle_version: String,
    #[serde(rename = "informationUrl", skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
    #[serde(rename = "privacyInformationUrl", skip_serializing_if = "Option::is_none")]
    pub privacy_url: Option<String>,
    pub minimum_supported_operating_system: MinimumOs,
    pub included_apps: Vec<IncludedApp>,
}

impl AppPayload {
    pub fn from_metadata(metadata: &AppMetadata) -> crate::error::Result<Self> {
        let bundle_id = metadata.resolved_bundle_id()?;
        let publisher = metadata
            .publisher
            .clone()
            .unwrap_or_else(|| metadata.display_name.clone());
        Ok(Self {
            odata_type: metadata.package_type().odata_type(),
            display_name: metadata.display_name.clone(),
            description: metadata.description.clone(),
            publisher,
            developer: metadata.developer.clone(),
            owner: metadata.owner.clone(),
            file_name: metadata.file_name.clone(),
            bundle_id: bundle_id.clone(),
            version_number: metadata.version.clone(),
            primary_bundle_id: bundle_id.clone(),
            primary_bundle_version: metadata.version.clone(),
            info_url: metadata.info_url.clone(),
            privacy_url: metadata.privacy_url.clone(),
            minimum_supported_operating_system: metadata.minimum_os(),
            included_apps: vec![IncludedApp {
                odata_type: format!("{}macOSIncludedApp", ODATA_PREFIX),
                bundle_id,
                bundle_version: metadata.version.clone(),
            }],
        })
    }
}

/// Partial update. Absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPatch {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_bundle_version: Option<String>,
    #[serde(rename = "informationUrl", skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
    #[serde(rename = "privacyInformationUrl", skip_serializing_if = "Option::is_none")]
    pub privacy_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_content_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_icon: Option<MimeContent>,
}

impl AppPatch {
    pub fn new(package_type: PackageType) -> Self {
        Self {
            odata_type: package_type.odata_type(),
            ..Self::default()
        }
    }

    /// Mutable metadata for an in-place update. Bundle id is left alone since
    /// the backend treats it as the record's identity.
    pub fn from_metadata(metadata: &AppMetadata) -> Self {
        Self {
            display_name: Some(metadata.display_name.clone()),
            description: Some(metadata.description.clone()),
            publisher: metadata.publisher.clone(),
            developer: metadata.developer.clone(),
            owner: metadata.owner.clone(),
            file_name: Some(metadata.file_name.clone()),
            version_number: Some(metadata.version.clone()),
            primary_bundle_version: Some(metadata.version.clone()),
            info_url: metadata.info_url.clone(),
            privacy_url: metadata.privacy_url.clone(),
            ..Self::new(metadata.package_type())
        }
    }
}

/// App record as returned by the backend. Every field except `id` is optional
/// on the wire; `id` is checked by callers before use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppRecord {
    pub id: String,
    #[serde(rename = "@odata.type", skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
    pub display_name: String,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub developer: Option<String>,
    pub owner: Option<String>,
    pub file_name: Option<String>,
    pub bundle_id: Option<String>,
    #[serde(rename = "versionNumber")]
    pub version: Option<String>,
    #[serde(rename = "informationUrl")]
    pub info_url: Option<String>,
    #[serde(rename = "privacyInformationUrl")]
    pub privacy_url: Option<String>,
    #[serde(rename = "minimumSupportedOperatingSystem")]
    pub minimum_os: Option<MinimumOs>,
    pub committed_content_version: Option<String>,
    pub large_icon: Option<MimeContent>,
}

impl AppRecord {
    /// Local view of the record after the backend accepted `patch`.
    pub fn apply(&mut self, patch: &AppPatch) {
        fn set(field: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                field.clone_from(value);
            }
        }
        if let Some(name) = &patch.display_name {
            self.display_name.clone_from(name);
        }
        set(&mut self.description, &patch.description);
        set(&mut self.publisher, &patch.publisher);
        set(&mut self.developer, &patch.developer);
        set(&mut self.owner, &patch.owner);
        set(&mut self.file_name, &patch.file_name);
        set(&mut self.version, &patch.version_number);
        set(&mut self.info_url, &patch.info_url);
        set(&mut self.privacy_url, &patch.privacy_url);
        set(
            &mut self.committed_content_version,
            &patch.committed_content_version,
        );
        if patch.large_icon.is_some() {
            self.large_icon.clone_from(&patch.large_icon);
        }
    }
}
