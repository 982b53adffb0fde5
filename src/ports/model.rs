//! Model port: the minimal view of a trained classifier.
//!
//! Model-agnostic attribution only ever evaluates a model through this
//! trait, so it works for any classifier family the registry can load.

/// A trained binary classifier over a scaled feature vector.
pub trait ProbabilisticModel: Send + Sync {
    /// Number of features the model expects.
    fn n_features(&self) -> usize;

    /// Probability of the positive (disease-present) class.
    ///
    /// `features` must have length [`n_features`](Self::n_features) and be
    /// in the scaled, schema-ordered space the model was trained on.
    fn predict_proba(&self, features: &[f64]) -> f64;
}
