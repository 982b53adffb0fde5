//! Model-agnostic permutation-sampling Shapley values.
//!
//! For each sampled feature ordering and each background sample, features
//! are switched from the background value to the request value one at a
//! time; each switch's change in probability is credited to that feature.
//! The per-pass credits telescope to `f(x) - f(background)`, so the averaged
//! contributions sum exactly to `f(x)` minus the mean background
//! probability. The generator is seeded from the profile, which makes the
//! result deterministic.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::ports::ProbabilisticModel;

/// Contributions in probability space.
pub(super) fn contributions(
    model: &dyn ProbabilisticModel,
    x: &[f64],
    samples: &[Vec<f64>],
    permutations: usize,
    seed: u64,
) -> Vec<f64> {
    let n = x.len();
    let mut phi = vec![0.0; n];
    if samples.is_empty() || permutations == 0 {
        return phi;
    }

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();
    let mut z = Vec::with_capacity(n);

    for _ in 0..permutations {
        order.shuffle(&mut rng);
        for background in samples {
            z.clear();
            z.extend_from_slice(background);
            let mut prev = model.predict_proba(&z);
            for &i in &order {
                if z[i] == x[i] {
                    continue;
                }
                z[i] = x[i];
                let next = model.predict_proba(&z);
                phi[i] += next - prev;
                prev = next;
            }
        }
    }

    let passes = permutations as f64 * samples.len() as f64;
    for v in &mut phi {
        *v /= passes;
    }
    phi
}
