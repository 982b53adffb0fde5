//! Disease profiles: everything needed to serve one disease.
//!
//! A profile is assembled once from exported artifacts, checked for internal
//! consistency, and then only ever read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assessment::RiskBands;
use super::disease::DiseaseId;
use super::model::Classifier;
use super::schema::FeatureSchema;
use crate::ports::ProbabilisticModel;

/// Fitted per-feature standardisation: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// # Errors
    /// Returns an error if lengths differ from `n_features` or any statistic
    /// is unusable.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.mean.len() != n_features || self.scale.len() != n_features {
            return Err(format!(
                "scaler has {} means and {} scales, schema has {n_features} features",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err("scaler mean must be finite".into());
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("scaler scale must be finite and positive".into());
        }
        Ok(())
    }

    #[must_use]
    pub fn transform(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}

/// Reference data for attribution, in scaled space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundStats {
    pub mean: Vec<f64>,
    #[serde(default)]
    pub samples: Vec<Vec<f64>>,
}

impl BackgroundStats {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.mean.len() != n_features {
            return Err(format!(
                "background mean has {} values, schema has {n_features} features",
                self.mean.len()
            ));
        }
        if self.samples.iter().any(|s| s.len() != n_features) {
            return Err(format!("background samples must have {n_features} values"));
        }
        if self
            .mean
            .iter()
            .chain(self.samples.iter().flatten())
            .any(|v| !v.is_finite())
        {
            return Err("background statistics must be finite".into());
        }
        Ok(())
    }
}

/// Upper bound on `permutations` accepted from an artifact.
pub const MAX_PERMUTATIONS: usize = 1024;

/// Upper bound on permutations times background samples.
pub const MAX_SAMPLING_PASSES: usize = 16_384;

/// Attribution method declared by the exported artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AttributionStrategy {
    /// Exact contributions for logistic models, in log-odds space.
    Linear,
    /// Path-dependent TreeSHAP for tree ensembles.
    Tree,
    /// Model-agnostic permutation sampling against background samples.
    Sampling { permutations: usize, seed: u64 },
}

impl AttributionStrategy {
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Tree => "tree",
            Self::Sampling { .. } => "sampling",
        }
    }
}

/// Attribution capability resolved at load time.
///
/// Carries everything the attribution engine needs beyond the model itself,
/// including the precomputed expected output, so no reference statistic is
/// recomputed per request.
#[derive(Debug, Clone, PartialEq)]
pub enum Attributor {
    Linear {
        weights: Vec<f64>,
        reference: Vec<f64>,
        /// Log-odds at the reference point.
        expected: f64,
    },
    Tree {
        /// Expected raw ensemble output under the training covers.
        expected: f64,
    },
    Sampling {
        permutations: usize,
        seed: u64,
        samples: Vec<Vec<f64>>,
        /// Mean probability over the background samples.
        expected: f64,
    },
}

impl Attributor {
    /// Bind a declared strategy to a classifier and its background data.
    ///
    /// # Errors
    /// Returns an error if the strategy cannot explain this classifier or the
    /// background data it needs is absent.
    pub fn build(
        strategy: &AttributionStrategy,
        classifier: &Classifier,
        background: &BackgroundStats,
    ) -> Result<Self, String> {
        match (strategy, classifier) {
            (AttributionStrategy::Linear, Classifier::Logistic(model)) => {
                let expected = model.margin(&background.mean);
                Ok(Self::Linear {
                    weights: model.coefficients.clone(),
                    reference: background.mean.clone(),
                    expected,
                })
            }
            (AttributionStrategy::Tree, Classifier::TreeEnsemble(ensemble)) => Ok(Self::Tree {
                expected: ensemble.expected_output(),
            }),
            (AttributionStrategy::Sampling { permutations, seed }, model) => {
                if *permutations == 0 || *permutations > MAX_PERMUTATIONS {
                    return Err(format!(
                        "sampling attribution needs 1..={MAX_PERMUTATIONS} permutations, \
                         got {permutations}"
                    ));
                }
                if background.samples.is_empty() {
                    return Err("sampling attribution needs background samples".into());
                }
                // Each request evaluates the model n times per pass.
                let passes = permutations.checked_mul(background.samples.len());
                if passes.map_or(true, |p| p > MAX_SAMPLING_PASSES) {
                    return Err(format!(
                        "sampling attribution allows at most {MAX_SAMPLING_PASSES} \
                         permutation x background passes"
                    ));
                }
                let expected = background
                    .samples
                    .iter()
                    .map(|s| model.predict_proba(s))
                    .sum::<f64>()
                    / background.samples.len() as f64;
                Ok(Self::Sampling {
                    permutations: *permutations,
                    seed: *seed,
                    samples: background.samples.clone(),
                    expected,
                })
            }
            (strategy, model) => Err(format!(
                "{} attribution cannot explain a {} classifier",
                strategy.method(),
                model.family()
            )),
        }
    }

    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Linear { .. } => "linear",
            Self::Tree { .. } => "tree",
            Self::Sampling { .. } => "sampling",
        }
    }

    /// Baseline that contributions are measured against.
    #[must_use]
    pub fn expected(&self) -> f64 {
        match self {
            Self::Linear { expected, .. }
            | Self::Tree { expected }
            | Self::Sampling { expected, .. } => *expected,
        }
    }
}

/// Provenance recorded by the training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub algorithm: String,
    #[serde(default)]
    pub f1_score: Option<f64>,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
}

/// Why a disease profile could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("{disease}: artifact {file} is missing")]
    Missing { disease: DiseaseId, file: String },

    #[error("{disease}: artifact {file} is corrupt: {reason}")]
    Corrupt {
        disease: DiseaseId,
        file: String,
        reason: String,
    },

    #[error("{disease}: inconsistent profile: {reason}")]
    Inconsistent { disease: DiseaseId, reason: String },

    #[error("{disease}: integrity check failed: {reason}")]
    Integrity { disease: DiseaseId, reason: String },
}

impl ModelLoadError {
    #[must_use]
    pub fn disease(&self) -> DiseaseId {
        match self {
            Self::Missing { disease, .. }
            | Self::Corrupt { disease, .. }
            | Self::Inconsistent { disease, .. }
            | Self::Integrity { disease, .. } => *disease,
        }
    }
}

/// Everything required to serve predictions for one disease.
#[derive(Debug)]
pub struct DiseaseProfile {
    schema: FeatureSchema,
    scaler: StandardScaler,
    classifier: Classifier,
    attributor: Attributor,
    risk_bands: RiskBands,
    metadata: ModelMetadata,
}

impl DiseaseProfile {
    /// Assemble a profile, checking that every part agrees with the schema.
    ///
    /// # Errors
    /// Returns `ModelLoadError::Inconsistent` on any mismatch.
    pub fn new(
        schema: FeatureSchema,
        scaler: StandardScaler,
        classifier: Classifier,
        strategy: &AttributionStrategy,
        background: &BackgroundStats,
        risk_bands: RiskBands,
        metadata: ModelMetadata,
    ) -> Result<Self, ModelLoadError> {
        let disease = schema.disease();
        let n = schema.len();
        let inconsistent = |reason: String| ModelLoadError::Inconsistent { disease, reason };

        scaler.validate(n).map_err(inconsistent)?;
        classifier.validate(n).map_err(inconsistent)?;
        background.validate(n).map_err(inconsistent)?;
        risk_bands.validate().map_err(inconsistent)?;
        let attributor =
            Attributor::build(strategy, &classifier, background).map_err(inconsistent)?;
        if !attributor.expected().is_finite() {
            return Err(inconsistent("attribution baseline is not finite".into()));
        }

        Ok(Self {
            schema,
            scaler,
            classifier,
            attributor,
            risk_bands,
            metadata,
        })
    }

    #[must_use]
    pub fn disease(&self) -> DiseaseId {
        self.schema.disease()
    }

    #[must_use]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    #[must_use]
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    #[must_use]
    pub fn attributor(&self) -> &Attributor {
        &self.attributor
    }

    #[must_use]
    pub fn risk_bands(&self) -> RiskBands {
        self.risk_bands
    }

    #[must_use]
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

/// Validated, scaled, schema-ordered model input for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    disease: DiseaseId,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Only the encoder constructs vectors, after validation and scaling.
    pub(crate) fn from_scaled(disease: DiseaseId, values: Vec<f64>) -> Self {
        Self { disease, values }
    }

    #[must_use]
    pub fn disease(&self) -> DiseaseId {
        self.disease
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{sigmoid, Aggregation, LogisticModel, TreeEnsemble};

    fn heart_schema() -> FeatureSchema {
        FeatureSchema::catalog_order(DiseaseId::HeartDisease)
    }

    fn logistic(n: usize) -> Classifier {
        Classifier::Logistic(LogisticModel {
            coefficients: vec![0.5; n],
            intercept: -0.2,
        })
    }

    fn metadata() -> ModelMetadata {
        ModelMetadata {
            algorithm: "Logistic Regression".into(),
            f1_score: Some(0.86),
            trained_at: None,
        }
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = StandardScaler {
            mean: vec![10.0, 0.0],
            scale: vec![2.0, 0.5],
        };
        assert!(scaler.validate(2).is_ok());
        assert_eq!(scaler.transform(&[14.0, -1.0]), vec![2.0, -2.0]);
        assert!(scaler.validate(3).is_err());

        let zero = StandardScaler {
            mean: vec![0.0],
            scale: vec![0.0],
        };
        assert!(zero.validate(1).is_err());
    }

    #[test]
    fn test_profile_rejects_length_mismatch() {
        let n = heart_schema().len();
        let err = DiseaseProfile::new(
            heart_schema(),
            StandardScaler {
                mean: vec![0.0; n],
                scale: vec![1.0; n],
            },
            logistic(n - 1),
            &AttributionStrategy::Linear,
            &BackgroundStats {
                mean: vec![0.0; n],
                samples: Vec::new(),
            },
            RiskBands::default(),
            metadata(),
        )
        .expect_err("coefficient count differs");
        assert!(matches!(err, ModelLoadError::Inconsistent { .. }));
        assert_eq!(err.disease(), DiseaseId::HeartDisease);
    }

    #[test]
    fn test_strategy_must_match_classifier() {
        let background = BackgroundStats {
            mean: vec![0.0; 2],
            samples: Vec::new(),
        };
        let tree_on_logistic =
            Attributor::build(&AttributionStrategy::Tree, &logistic(2), &background);
        assert!(tree_on_logistic.is_err());

        let forest = Classifier::TreeEnsemble(TreeEnsemble {
            n_features: 1,
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            trees: vec![crate::domain::model::tests::stump(0, 0.2, 0.8)],
        });
        let background = BackgroundStats {
            mean: vec![0.0],
            samples: Vec::new(),
        };
        let linear_on_forest =
            Attributor::build(&AttributionStrategy::Linear, &forest, &background);
        assert!(linear_on_forest.is_err());
    }

    #[test]
    fn test_sampling_needs_background_samples() {
        let strategy = AttributionStrategy::Sampling {
            permutations: 8,
            seed: 7,
        };
        let empty = BackgroundStats {
            mean: vec![0.0; 2],
            samples: Vec::new(),
        };
        assert!(Attributor::build(&strategy, &logistic(2), &empty).is_err());

        let with_samples = BackgroundStats {
            mean: vec![0.0; 2],
            samples: vec![vec![0.0, 0.0], vec![1.0, 1.0]],
        };
        let attributor =
            Attributor::build(&strategy, &logistic(2), &with_samples).expect("valid");
        let expected = (sigmoid(-0.2) + sigmoid(0.8)) / 2.0;
        assert!((attributor.expected() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sampling_cost_is_bounded() {
        let background = BackgroundStats {
            mean: vec![0.0; 2],
            samples: vec![vec![0.0, 0.0]; 32],
        };
        let build = |permutations: usize| {
            Attributor::build(
                &AttributionStrategy::Sampling {
                    permutations,
                    seed: 7,
                },
                &logistic(2),
                &background,
            )
        };

        assert!(build(MAX_SAMPLING_PASSES / 32).is_ok());
        assert!(build(MAX_SAMPLING_PASSES / 32 + 1).is_err());
        assert!(build(MAX_PERMUTATIONS + 1).is_err());
        assert!(build(usize::MAX).is_err());
    }

    #[test]
    fn test_oversized_sampling_profile_is_inconsistent() {
        let n = heart_schema().len();
        let err = DiseaseProfile::new(
            heart_schema(),
            StandardScaler {
                mean: vec![0.0; n],
                scale: vec![1.0; n],
            },
            logistic(n),
            &AttributionStrategy::Sampling {
                permutations: MAX_PERMUTATIONS * 4,
                seed: 1,
            },
            &BackgroundStats {
                mean: vec![0.0; n],
                samples: vec![vec![0.0; n]],
            },
            RiskBands::default(),
            metadata(),
        )
        .expect_err("too many permutations");
        assert!(matches!(err, ModelLoadError::Inconsistent { .. }));
    }

    #[test]
    fn test_linear_baseline_precomputed() {
        let background = BackgroundStats {
            mean: vec![1.0, 2.0],
            samples: Vec::new(),
        };
        let attributor = Attributor::build(&AttributionStrategy::Linear, &logistic(2), &background)
            .expect("valid");
        assert!((attributor.expected() - (0.5 + 1.0 - 0.2)).abs() < 1e-12);
        assert_eq!(attributor.method(), "linear");
    }
}
