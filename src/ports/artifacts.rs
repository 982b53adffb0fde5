//! Artifact port: where exported disease profiles are read from.
//!
//! This trait abstracts the artifact location (a models directory, an
//! in-memory bundle in tests) from the profile loader.

use crate::domain::DiseaseId;

/// Read-only source of per-disease artifact files.
pub trait ArtifactStore: Send + Sync {
    /// Read one artifact file for a disease.
    ///
    /// # Errors
    /// Returns `std::io::ErrorKind::NotFound` if the file does not exist,
    /// or any other I/O error raised while reading it.
    fn read(&self, disease: DiseaseId, file: &str) -> std::io::Result<Vec<u8>>;

    /// Whether an artifact file exists.
    fn contains(&self, disease: DiseaseId, file: &str) -> bool;

    /// Human-readable location, for logs and status output.
    fn location(&self, disease: DiseaseId) -> String;
}
