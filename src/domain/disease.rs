//! Disease identifiers.
//!
//! The set of diseases is fixed at compile time. Anything outside it is an
//! [`UnknownDisease`] and never reaches the registry.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Requested disease id is not one of the supported diseases.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown disease: {0:?}")]
pub struct UnknownDisease(pub String);

/// One of the supported diseases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseId {
    Diabetes,
    HeartDisease,
    Parkinsons,
}

impl DiseaseId {
    /// Every supported disease, in registry slot order.
    pub const ALL: [DiseaseId; 3] = [Self::Diabetes, Self::HeartDisease, Self::Parkinsons];

    /// Stable identifier used in artifact paths and responses.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diabetes => "diabetes",
            Self::HeartDisease => "heart_disease",
            Self::Parkinsons => "parkinsons",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Diabetes => "Diabetes",
            Self::HeartDisease => "Heart Disease",
            Self::Parkinsons => "Parkinson's Disease",
        }
    }

    /// Registry slot index.
    #[must_use]
    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Diabetes => 0,
            Self::HeartDisease => 1,
            Self::Parkinsons => 2,
        }
    }
}

impl FromStr for DiseaseId {
    type Err = UnknownDisease;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Route-style spellings ("heart-disease") are accepted alongside ids.
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "diabetes" => Ok(Self::Diabetes),
            "heart_disease" => Ok(Self::HeartDisease),
            "parkinsons" => Ok(Self::Parkinsons),
            _ => Err(UnknownDisease(s.to_string())),
        }
    }
}

impl std::fmt::Display for DiseaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
