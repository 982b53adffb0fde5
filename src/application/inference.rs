//! Inference: runs an encoded vector through the profile's classifier.
//!
//! The classifier was selected offline; this step never re-selects, retries
//! or caches. Identical vectors against the same profile give bit-identical
//! probabilities.

use crate::domain::{DiseaseProfile, FeatureVector, PredictionResult};
use crate::ports::ProbabilisticModel;
use crate::{MediAssistError, Result};

/// Probability of the positive class, with derived label and confidence.
///
/// # Errors
/// `Inference` if the vector belongs to another profile or the model
/// produces a probability outside `[0, 1]`.
pub fn predict(profile: &DiseaseProfile, vector: &FeatureVector) -> Result<PredictionResult> {
    let width = profile.classifier().n_features();
    if vector.disease() != profile.disease()
        || vector.len() != profile.schema().len()
        || vector.len() != width
    {
        return Err(MediAssistError::Inference(format!(
            "vector for {} ({} values) does not match the {} profile ({width} features)",
            vector.disease(),
            vector.len(),
            profile.disease()
        )));
    }

    let probability = profile.classifier().predict_proba(vector.values());
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        tracing::error!(
            disease = %profile.disease(),
            classifier = profile.classifier().family(),
            probability,
            "Model produced an invalid probability"
        );
        return Err(MediAssistError::Inference(format!(
            "{} model produced an invalid probability",
            profile.disease()
        )));
    }

    let result = PredictionResult::new(probability);
    tracing::debug!(
        disease = %profile.disease(),
        probability,
        has_disease = result.has_disease,
        "Prediction complete"
    );
    Ok(result)
}
