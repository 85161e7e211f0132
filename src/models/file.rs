//! Local installer package on disk.

use std::path::{Path, PathBuf};

use crate::error::AppError;

/// A resolved package file: name, path and plaintext size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    pub file_name: String,
    pub file_path: PathBuf,
    pub file_size: u64,
}

impl PackageFile {
    /// Resolve a path into a package entry. Fails if the path is not a regular file.
    pub fn from_path(path: &Path) -> crate::error::Result<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| AppError::Io(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(AppError::Io(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Io(format!("Invalid file name: {}", path.display())))?;
        Ok(Self {
            file_name: file_name.to_string(),
            file_path: path.to_path_buf(),
            file_size: metadata.len(),
        })
    }
}
