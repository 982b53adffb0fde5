//! Assessment service: the full request pipeline.
//!
//! registry lookup → validate/encode → predict → explain → classify → assemble
//!
//! Each request owns everything it computes; the registry is only read, so
//! any number of requests may run at once on one service.

use std::time::Instant;

use serde_json::{Map, Value};

use super::registry::ProfileRegistry;
use super::{attribution, encoder, inference, risk};
use crate::domain::{
    AssessmentResponse, AttributionItem, DiseaseId, ErrorPayload, FeatureVector,
    PredictionResult, RiskAssessment,
};
use crate::{MediAssistError, Result};

/// Service for running risk assessments against a loaded registry.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentService<'r> {
    registry: &'r ProfileRegistry,
}

impl<'r> AssessmentService<'r> {
    #[must_use]
    pub fn new(registry: &'r ProfileRegistry) -> Self {
        Self { registry }
    }

    /// # Errors
    /// `ModelNotLoaded` or `Validation`.
    pub fn encode(&self, disease: DiseaseId, raw: &Map<String, Value>) -> Result<FeatureVector> {
        let profile = self.registry.profile(disease)?;
        Ok(encoder::encode(profile, raw)?)
    }

    /// # Errors
    /// `ModelNotLoaded` or `Inference`.
    pub fn predict(&self, disease: DiseaseId, vector: &FeatureVector) -> Result<PredictionResult> {
        inference::predict(self.registry.profile(disease)?, vector)
    }

    /// # Errors
    /// `ModelNotLoaded` or `Inference`.
    pub fn explain(
        &self,
        disease: DiseaseId,
        vector: &FeatureVector,
        prediction: &PredictionResult,
    ) -> Result<Vec<AttributionItem>> {
        attribution::explain(self.registry.profile(disease)?, vector, prediction)
    }

    /// Risk band for a probability, honouring any per-disease cut points.
    ///
    /// # Errors
    /// `ModelNotLoaded`.
    pub fn classify(&self, disease: DiseaseId, probability: f64) -> Result<RiskAssessment> {
        let bands = self.registry.profile(disease)?.risk_bands();
        Ok(risk::classify_with(bands, probability))
    }

    /// Run the whole pipeline. Either every section of the response is
    /// produced or an error is returned.
    ///
    /// # Errors
    /// Any pipeline error, unchanged.
    pub fn assess(&self, disease: &str, raw: &Map<String, Value>) -> Result<AssessmentResponse> {
        let started = Instant::now();
        let disease: DiseaseId = disease.parse()?;

        let vector = self.encode(disease, raw)?;
        let prediction = self.predict(disease, &vector)?;
        let contributions = self.explain(disease, &vector, &prediction)?;
        let risk_assessment = self.classify(disease, prediction.probability)?;

        tracing::info!(
            disease = %disease,
            probability = prediction.probability,
            level = %risk_assessment.level,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Assessment complete"
        );
        Ok(assemble(disease, prediction, risk_assessment, contributions))
    }

    /// Like [`assess`](Self::assess), but failures become a
    /// `success: false` response.
    #[must_use]
    pub fn respond(&self, disease: &str, raw: &Map<String, Value>) -> AssessmentResponse {
        self.assess(disease, raw)
            .unwrap_or_else(|e| failure(disease, &e))
    }
}

/// Compose a successful response. No computation happens here.
#[must_use]
pub fn assemble(
    disease: DiseaseId,
    prediction: PredictionResult,
    risk_assessment: RiskAssessment,
    feature_importance: Vec<AttributionItem>,
) -> AssessmentResponse {
    AssessmentResponse::success(disease, prediction, risk_assessment, feature_importance)
}

/// Map a pipeline error to a failed response.
#[must_use]
pub fn failure(disease: &str, error: &MediAssistError) -> AssessmentResponse {
    let disease = disease
        .parse::<DiseaseId>()
        .map_or_else(|_| disease.to_string(), |d| d.to_string());

    let (message, fields) = match error {
        MediAssistError::Validation(e) => {
            tracing::info!(disease = %disease, fields = ?e.fields(), "Input rejected");
            (error.to_string(), e.issues.clone())
        }
        MediAssistError::Inference(_) => {
            tracing::error!(disease = %disease, error = %error, "Assessment failed");
            ("Prediction failed; please try again later".to_string(), Vec::new())
        }
        _ => {
            tracing::warn!(disease = %disease, error = %error, "Assessment refused");
            (error.to_string(), Vec::new())
        }
    };

    AssessmentResponse::failure(
        disease,
        ErrorPayload {
            kind: error.kind(),
            message,
            fields,
        },
    )
}
