//! Attribution engine: which features drove a prediction.
//!
//! Dispatch is on the [`Attributor`] bound to the profile at load time:
//!
//! | Attributor | Algorithm                      | Output space       |
//! |------------|--------------------------------|--------------------|
//! | `Linear`   | `w_i * (x_i - reference_i)`    | log-odds           |
//! | `Tree`     | path-dependent TreeSHAP        | raw ensemble output|
//! | `Sampling` | permutation-sampling Shapley   | probability        |
//!
//! All three are additive: contributions sum to the model output minus the
//! attributor's precomputed expected value, in its output space. Only the
//! sign and relative size of contributions reach the response, and every
//! output space is a monotone transform of the probability.

mod linear;
mod sampling;
mod tree;

use crate::domain::{
    AttributionItem, Attributor, Direction, DiseaseProfile, FeatureSchema, FeatureVector,
    PredictionResult,
};
use crate::{MediAssistError, Result};

/// Number of features reported per prediction.
pub const TOP_FEATURES: usize = 3;

/// Ranked top contributions for one prediction.
///
/// # Errors
/// `Inference` if the vector does not belong to the profile or a
/// contribution is not finite.
pub fn explain(
    profile: &DiseaseProfile,
    vector: &FeatureVector,
    prediction: &PredictionResult,
) -> Result<Vec<AttributionItem>> {
    let phi = contributions(profile, vector)?;
    let items = rank(profile.schema(), &phi, TOP_FEATURES);

    tracing::debug!(
        disease = %profile.disease(),
        method = profile.attributor().method(),
        probability = prediction.probability,
        top = ?items.iter().map(|i| i.feature.as_str()).collect::<Vec<_>>(),
        "Attribution complete"
    );
    Ok(items)
}

/// Signed contribution of every feature, in schema order.
///
/// # Errors
/// See [`explain`].
pub fn contributions(profile: &DiseaseProfile, vector: &FeatureVector) -> Result<Vec<f64>> {
    if vector.disease() != profile.disease() || vector.len() != profile.schema().len() {
        return Err(MediAssistError::Inference(
            "attribution vector does not match the profile".into(),
        ));
    }
    let x = vector.values();

    let phi = match profile.attributor() {
        Attributor::Linear {
            weights, reference, ..
        } => linear::contributions(weights, reference, x),
        Attributor::Tree { .. } => {
            let ensemble = profile.classifier().as_tree_ensemble().ok_or_else(|| {
                MediAssistError::Inference("tree attribution bound to a non-tree model".into())
            })?;
            tree::contributions(ensemble, x)
        }
        Attributor::Sampling {
            permutations,
            seed,
            samples,
            ..
        } => sampling::contributions(profile.classifier(), x, samples, *permutations, *seed),
    };

    if phi.iter().any(|v| !v.is_finite()) {
        tracing::error!(disease = %profile.disease(), "Non-finite attribution");
        return Err(MediAssistError::Inference(
            "attribution produced a non-finite contribution".into(),
        ));
    }
    Ok(phi)
}

/// Top `n` non-zero contributions by descending magnitude; ties keep schema
/// order.
#[must_use]
pub fn rank(schema: &FeatureSchema, phi: &[f64], n: usize) -> Vec<AttributionItem> {
    let mut order: Vec<usize> = (0..phi.len()).filter(|&i| phi[i] != 0.0).collect();
    order.sort_by(|&a, &b| phi[b].abs().total_cmp(&phi[a].abs()).then(a.cmp(&b)));

    order
        .into_iter()
        .take(n)
        .enumerate()
        .filter_map(|(k, i)| {
            schema.name(i).map(|name| AttributionItem {
                feature: name.to_string(),
                impact: phi[i],
                direction: Direction::of(phi[i]),
                rank: k + 1,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DiseaseId;

    #[test]
    fn test_rank_orders_by_magnitude_then_schema_position() {
        let schema = FeatureSchema::catalog_order(DiseaseId::Diabetes);
        let mut phi = vec![0.0; schema.len()];
        phi[1] = -0.5; // AGE
        phi[4] = 0.5; // HbA1c, ties with AGE
        phi[7] = 0.9; // HDL
        phi[10] = 0.1; // BMI

        let items = rank(&schema, &phi, TOP_FEATURES);
        let names: Vec<&str> = items.iter().map(|i| i.feature.as_str()).collect();
        assert_eq!(names, vec!["HDL", "AGE", "HbA1c"]);
        assert_eq!(items[1].direction, Direction::Decreases);
        assert_eq!(items[2].direction, Direction::Increases);
        assert_eq!(
            items.iter().map(|i| i.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_rank_excludes_zero_contributions() {
        let schema = FeatureSchema::catalog_order(DiseaseId::Diabetes);
        let mut phi = vec![0.0; schema.len()];
        phi[2] = 0.3;
        phi[5] = -0.0;

        let items = rank(&schema, &phi, TOP_FEATURES);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].feature, "Urea");
    }
}
