//! Durable manifest persistence.
//!
//! The manifest is stored as pretty-printed JSON in a single file:
//!
//! ```text
//! <base>/manifest.json
//! ```
//!
//! Writes are atomic: the document goes to a temp file first and is then
//! renamed into place, so a crash mid-write leaves the previous copy
//! intact.

use std::fs;
use std::path::PathBuf;

use crate::{EvidenceManifest, LockerError};

/// Local-file manifest store.
///
/// # Load Semantics
///
/// | On-disk state | Result |
/// |---------------|--------|
/// | File absent | `Ok(None)` (fresh case) |
/// | Valid document | `Ok(Some(manifest))` |
/// | Parse/schema/invariant failure | `Err(ManifestCorruption)` |
///
/// Corruption is deliberately loud: the locker refuses to operate on a
/// case whose durable state fails validation rather than guessing.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    base_path: PathBuf,
}

impl ManifestStore {
    /// Creates a store rooted at `base_path`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`LockerError::Io`] if the directory cannot be created.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, LockerError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|source| LockerError::Io {
                path: base_path.display().to_string(),
                source,
            })?;
        }
        Ok(Self { base_path })
    }

    /// Path of the manifest document.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.base_path.join("manifest.json")
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join(".manifest.json.tmp")
    }

    /// Persists the manifest atomically (write to temp, then rename).
    ///
    /// # Errors
    ///
    /// Returns [`LockerError::Io`] on filesystem failure.
    pub fn save(&self, manifest: &EvidenceManifest) -> Result<(), LockerError> {
        let json = serde_json::to_string_pretty(manifest).map_err(|e| {
            LockerError::ManifestCorruption {
                path: self.manifest_path().display().to_string(),
                reason: format!("serialization failed: {e}"),
            }
        })?;

        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|source| LockerError::Io {
            path: temp.display().to_string(),
            source,
        })?;
        fs::rename(&temp, self.manifest_path()).map_err(|source| LockerError::Io {
            path: self.manifest_path().display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Loads the manifest, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`LockerError::ManifestCorruption`] when the document
    /// cannot be parsed, carries the wrong schema version, or fails its
    /// structural invariants. Never falls back to an empty manifest.
    pub fn load(&self) -> Result<Option<EvidenceManifest>, LockerError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).map_err(|source| LockerError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let manifest: EvidenceManifest =
            serde_json::from_str(&json).map_err(|e| LockerError::ManifestCorruption {
                path: path.display().to_string(),
                reason: format!("parse failed: {e}"),
            })?;

        manifest
            .validate()
            .map_err(|reason| LockerError::ManifestCorruption {
                path: path.display().to_string(),
                reason,
            })?;

        Ok(Some(manifest))
    }

    /// Removes the durable manifest, if present.
    ///
    /// Used when a new case clears the previous case's state.
    ///
    /// # Errors
    ///
    /// Returns [`LockerError::Io`] on filesystem failure.
    pub fn clear(&self) -> Result<(), LockerError> {
        let path = self.manifest_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|source| LockerError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
