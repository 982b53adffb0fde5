//! Assessment result types.
//!
//! Represents the output of one prediction request: the calibrated
//! probability, the risk band it falls into, and the features that drove it.

use serde::{Deserialize, Serialize};

use super::disease::DiseaseId;
use super::schema::FieldIssue;

/// Risk level classification shared by every disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Low risk, no significant indicators
    Low,
    /// Moderate risk, monitoring recommended
    Moderate,
    /// High risk, consultation recommended
    High,
}

impl RiskLevel {
    /// Canned advisory message for the band.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Low => {
                "Low risk. No significant indicators; keep healthy habits and routine check-ups."
            }
            Self::Moderate => {
                "Moderate risk. Follow up with a healthcare provider and monitor regularly."
            }
            Self::High => {
                "High risk. Prompt consultation with a healthcare provider is strongly advised."
            }
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Moderate => write!(f, "Moderate"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Probability cut points between risk bands.
///
/// Bands are `[0, moderate_from)`, `[moderate_from, high_from)` and
/// `[high_from, 1]`, so every probability maps to exactly one level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBands {
    pub moderate_from: f64,
    pub high_from: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            moderate_from: 0.4,
            high_from: 0.7,
        }
    }
}

impl RiskBands {
    /// Create validated bands.
    ///
    /// # Errors
    /// Returns an error unless `0 < moderate_from < high_from <= 1`.
    pub fn new(moderate_from: f64, high_from: f64) -> Result<Self, String> {
        let bands = Self {
            moderate_from,
            high_from,
        };
        bands.validate()?;
        Ok(bands)
    }

    /// # Errors
    /// Returns an error unless `0 < moderate_from < high_from <= 1`.
    pub fn validate(&self) -> Result<(), String> {
        let ok = self.moderate_from.is_finite()
            && self.high_from.is_finite()
            && self.moderate_from > 0.0
            && self.moderate_from < self.high_from
            && self.high_from <= 1.0;
        if ok {
            Ok(())
        } else {
            Err(format!(
                "risk bands must satisfy 0 < moderate_from < high_from <= 1, got {} / {}",
                self.moderate_from, self.high_from
            ))
        }
    }

    #[must_use]
    pub fn level(&self, probability: f64) -> RiskLevel {
        if probability >= self.high_from {
            RiskLevel::High
        } else if probability >= self.moderate_from {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// Result of the model prediction (before interpretation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Binary prediction (0 = no disease, 1 = disease present)
    pub has_disease: u8,

    /// Probability expressed as a percentage, one decimal place
    pub confidence: f64,

    /// Raw prediction probability (0.0 to 1.0)
    pub probability: f64,
}

impl PredictionResult {
    /// Create a prediction from a positive-class probability.
    #[must_use]
    pub fn new(probability: f64) -> Self {
        let has_disease = u8::from(probability >= 0.5);
        let confidence = (probability * 1000.0).round() / 10.0;

        Self {
            has_disease,
            confidence,
            probability,
        }
    }
}

/// Risk band plus the advisory message shown with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub message: String,
}

impl RiskAssessment {
    #[must_use]
    pub fn new(level: RiskLevel) -> Self {
        Self {
            level,
            message: level.message().to_string(),
        }
    }
}

/// Whether a contribution pushes the output toward the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "increases risk")]
    Increases,
    #[serde(rename = "decreases risk")]
    Decreases,
}

impl Direction {
    #[must_use]
    pub fn of(contribution: f64) -> Self {
        if contribution > 0.0 {
            Self::Increases
        } else {
            Self::Decreases
        }
    }
}

/// One ranked feature contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionItem {
    pub feature: String,
    pub impact: f64,
    pub direction: Direction,
    /// 1-based position in the ranking.
    #[serde(skip)]
    pub rank: usize,
}

/// Error details carried by a failed response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldIssue>,
}

/// The single response contract for all diseases.
///
/// On failure only `success`, `disease` and `error` are present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentResponse {
    pub success: bool,
    pub disease: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<Vec<AttributionItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl AssessmentResponse {
    #[must_use]
    pub fn success(
        disease: DiseaseId,
        prediction: PredictionResult,
        risk_assessment: RiskAssessment,
        feature_importance: Vec<AttributionItem>,
    ) -> Self {
        Self {
            success: true,
            disease: disease.to_string(),
            prediction: Some(prediction),
            risk_assessment: Some(risk_assessment),
            feature_importance: Some(feature_importance),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(disease: impl Into<String>, error: ErrorPayload) -> Self {
        Self {
            success: false,
            disease: disease.into(),
            prediction: None,
            risk_assessment: None,
            feature_importance: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_boundary_is_inclusive() {
        assert_eq!(PredictionResult::new(0.5).has_disease, 1);
        assert_eq!(PredictionResult::new(0.499_999).has_disease, 0);
        assert_eq!(PredictionResult::new(1.0).has_disease, 1);
        assert_eq!(PredictionResult::new(0.0).has_disease, 0);
    }

    #[test]
    fn test_confidence_one_decimal() {
        assert_eq!(PredictionResult::new(0.8764).confidence, 87.6);
        assert_eq!(PredictionResult::new(0.12).confidence, 12.0);
        assert_eq!(PredictionResult::new(1.0).confidence, 100.0);
    }

    #[test]
    fn test_default_bands() {
        let bands = RiskBands::default();
        assert_eq!(bands.level(0.0), RiskLevel::Low);
        assert_eq!(bands.level(0.399_999), RiskLevel::Low);
        assert_eq!(bands.level(0.4), RiskLevel::Moderate);
        assert_eq!(bands.level(0.699_999), RiskLevel::Moderate);
        assert_eq!(bands.level(0.7), RiskLevel::High);
        assert_eq!(bands.level(1.0), RiskLevel::High);
    }

    #[test]
    fn test_band_override_validation() {
        assert!(RiskBands::new(0.3, 0.6).is_ok());
        assert!(RiskBands::new(0.6, 0.6).is_err());
        assert!(RiskBands::new(0.0, 0.5).is_err());
        assert!(RiskBands::new(0.5, 1.2).is_err());
        assert!(RiskBands::new(f64::NAN, 0.8).is_err());
    }

    #[test]
    fn test_failure_response_omits_result_sections() {
        let resp = AssessmentResponse::failure(
            "heart_disease",
            ErrorPayload {
                kind: "validation",
                message: "bad".into(),
                fields: Vec::new(),
            },
        );
        let json = serde_json::to_value(&resp).expect("serializes");
        assert_eq!(json["success"], false);
        assert!(json.get("prediction").is_none());
        assert!(json.get("risk_assessment").is_none());
        assert!(json.get("feature_importance").is_none());
        assert_eq!(json["error"]["kind"], "validation");
    }

    #[test]
    fn test_direction_serializes_as_phrase() {
        let item = AttributionItem {
            feature: "HbA1c".into(),
            impact: 0.42,
            direction: Direction::of(0.42),
            rank: 1,
        };
        let json = serde_json::to_value(&item).expect("serializes");
        assert_eq!(json["direction"], "increases risk");
        assert!(json.get("rank").is_none());
        assert_eq!(Direction::of(-0.1), Direction::Decreases);
    }
}
