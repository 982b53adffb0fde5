//! # MediAssist
//!
//! Prediction-and-explainability engine for clinical risk screening.
//!
//! This crate provides:
//! - A process-wide registry of signed, pre-trained disease profiles
//! - Schema-driven validation and encoding of untrusted clinical input
//! - Calibrated probabilities, per-feature attributions and risk bands
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (diseases, schemas, classifiers, results)
//! - `ports`: Trait definitions for models and artifact sources
//! - `adapters`: Concrete implementations (artifact files, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Environment-driven engine configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{AssessmentService, ProfileRegistry};
pub use domain::{AssessmentResponse, DiseaseId, RiskLevel};

/// Result type for MediAssist operations
pub type Result<T> = std::result::Result<T, MediAssistError>;

/// Main error type for MediAssist
#[derive(Debug, thiserror::Error)]
pub enum MediAssistError {
    #[error(transparent)]
    UnknownDisease(#[from] domain::UnknownDisease),

    #[error(transparent)]
    Validation(#[from] domain::ValidationError),

    #[error("Model not loaded for {disease}: {reason}")]
    ModelNotLoaded {
        disease: domain::DiseaseId,
        reason: String,
    },

    #[error("Inference failed: {0}")]
    Inference(String),
}

impl MediAssistError {
    /// Stable machine-readable kind, used in error responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownDisease(_) => "unknown_disease",
            Self::Validation(_) => "validation",
            Self::ModelNotLoaded { .. } => "model_not_loaded",
            Self::Inference(_) => "inference",
        }
    }
}
