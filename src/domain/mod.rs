//! Domain layer: Core business types and logic.
//!
//! This module contains pure Rust types with no I/O.
//! All artifact types are serializable and implement strict validation.

mod assessment;
mod disease;
pub mod model;
mod profile;
mod schema;

pub use assessment::{
    AssessmentResponse, AttributionItem, Direction, ErrorPayload, PredictionResult,
    RiskAssessment, RiskBands, RiskLevel,
};
pub use disease::{DiseaseId, UnknownDisease};
pub use model::Classifier;
pub use profile::{
    AttributionStrategy, Attributor, BackgroundStats, DiseaseProfile, FeatureVector,
    ModelLoadError, ModelMetadata, StandardScaler,
};
pub use schema::{
    clinical_catalog, FeatureDomain, FeatureSchema, FeatureSpec, FieldIssue,
    FieldProblem, ValidationError,
};
