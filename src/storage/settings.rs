use std::path::Path;

use crate::error::AppError;
use crate::models::settings::UploadSettings;

/// Read upload settings from a JSON file. Returns defaults if the file does
/// not exist; keys missing from the file keep their default values.
pub fn load_settings(path: &Path) -> crate::error::Result<UploadSettings> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(UploadSettings::default());
        }
        Err(e) => return Err(AppError::Io(format!("{}: {}", path.display(), e))),
    };

    let settings: UploadSettings = serde_json::from_str(&raw)
        .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
    settings.validate()?;
    Ok(settings)
}
