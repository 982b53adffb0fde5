//! Exact attribution for logistic models.

/// `phi_i = w_i * (x_i - reference_i)`, in log-odds.
pub(super) fn contributions(weights: &[f64], reference: &[f64], x: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .zip(reference)
        .zip(x)
        .map(|((w, r), xi)| w * (xi - r))
        .collect()
}
