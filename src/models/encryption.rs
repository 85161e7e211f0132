//! Decryption parameters handed to the backend at commit time.

use serde::{Deserialize, Serialize};

pub const PROFILE_IDENTIFIER: &str = "ProfileVersion1";
pub const FILE_DIGEST_ALGORITHM: &str = "SHA256";

/// All binary fields are base64 (standard alphabet, padded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionManifest {
    pub encryption_key: String,
    pub mac_key: String,
    pub initialization_vector: String,
    pub mac: String,
    pub profile_identifier: String,
    pub file_digest: String,
    pub file_digest_algorithm: String,
}

/// Commit call body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest<'a> {
    pub file_encryption_info: &'a EncryptionManifest,
}
