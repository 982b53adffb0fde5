//! Path-dependent TreeSHAP.
//!
//! Exact Shapley values for tree ensembles in polynomial time, using the
//! training covers recorded on each node as the background distribution
//! (Lundberg, Erion & Lee, "Consistent Individualized Feature Attribution
//! for Tree Ensembles", Algorithm 2).

use crate::domain::model::{Node, Tree, TreeEnsemble};

/// One feature on the current root-to-node path.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the synthetic root element.
    feature: Option<usize>,
    /// Fraction of "feature absent" paths that flow through.
    zero_fraction: f64,
    /// Whether `x` itself flows through (1 or 0).
    one_fraction: f64,
    /// Permutation weight.
    pweight: f64,
}

/// Contributions in the ensemble's raw output space.
pub(super) fn contributions(ensemble: &TreeEnsemble, x: &[f64]) -> Vec<f64> {
    let mut phi = vec![0.0; x.len()];
    let weight = ensemble.tree_weight();
    for tree in &ensemble.trees {
        recurse(tree, 0, x, &mut phi, weight, &[], 1.0, 1.0, None);
    }
    phi
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    node: usize,
    x: &[f64],
    phi: &mut [f64],
    weight: f64,
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path = parent_path.to_vec();
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match &tree.nodes[node] {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let w = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += w * (el.one_fraction - el.zero_fraction) * value * weight;
                }
            }
        }
        Node::Split {
            feature: split,
            threshold,
            left,
            right,
            cover,
        } => {
            let (hot, cold) = if x[*split] <= *threshold {
                (*left, *right)
            } else {
                (*right, *left)
            };
            let hot_zero = tree.nodes[hot].cover() / cover;
            let cold_zero = tree.nodes[cold].cover() / cover;

            // A feature split on again higher up is undone before re-extending.
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = path.iter().position(|e| e.feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            recurse(
                tree,
                hot,
                x,
                phi,
                weight,
                &path,
                hot_zero * incoming_zero,
                incoming_one,
                Some(*split),
            );
            recurse(
                tree,
                cold,
                x,
                phi,
                weight,
                &path,
                cold_zero * incoming_zero,
                0.0,
                Some(*split),
            );
        }
    }
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight with element `index` removed, without
/// modifying the path.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let tmp = next_one_portion / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (depth - i) as f64;
        }
    } else {
        for i in (0..depth).rev() {
            total += path[i].pweight / (zero_fraction * (depth - i) as f64);
        }
    }
    total * (depth + 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::tests::stump;
    use crate::domain::model::Aggregation;

    fn ensemble(aggregation: Aggregation, trees: Vec<Tree>) -> TreeEnsemble {
        TreeEnsemble {
            n_features: 3,
            aggregation,
            base_score: 0.25,
            trees,
        }
    }

    fn assert_additive(ensemble: &TreeEnsemble, x: &[f64]) {
        let phi = contributions(ensemble, x);
        let gap = ensemble.raw_output(x) - ensemble.expected_output();
        assert!(
            (phi.iter().sum::<f64>() - gap).abs() < 1e-9,
            "sum {} != gap {gap}",
            phi.iter().sum::<f64>()
        );
    }

    /// Depth-2 tree splitting on feature 0 then on feature 1 / feature 0 again.
    fn deep_tree() -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 1,
                    right: 2,
                    cover: 100.0,
                },
                Node::Split {
                    feature: 1,
                    threshold: 0.5,
                    left: 3,
                    right: 4,
                    cover: 60.0,
                },
                Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 5,
                    right: 6,
                    cover: 40.0,
                },
                Node::Leaf {
                    value: -0.4,
                    cover: 35.0,
                },
                Node::Leaf {
                    value: 0.2,
                    cover: 25.0,
                },
                Node::Leaf {
                    value: 0.3,
                    cover: 10.0,
                },
                Node::Leaf {
                    value: 0.9,
                    cover: 30.0,
                },
            ],
        }
    }

    #[test]
    fn test_stump_matches_hand_computation() {
        // Covers 4 | 6, leaves 1 | 3: E = 2.2, x goes left so f = 1.
        let ens = ensemble(Aggregation::Logit, vec![stump(0, 1.0, 3.0)]);
        let phi = contributions(&ens, &[-1.0, 0.0, 0.0]);
        assert!((phi[0] + 1.2).abs() < 1e-12);
        assert_eq!(phi[1], 0.0);
        assert_eq!(phi[2], 0.0);
    }

    #[test]
    fn test_additive_for_repeated_feature_splits() {
        let ens = ensemble(Aggregation::Logit, vec![deep_tree(), stump(2, -0.1, 0.4)]);
        for x in [[-1.0, 0.0, 0.0], [0.5, 2.0, 1.0], [2.0, -3.0, -1.0], [0.0, 0.5, 0.0]] {
            assert_additive(&ens, &x);
        }
    }

    #[test]
    fn test_mean_aggregation_is_averaged() {
        let trees = vec![stump(0, 0.2, 0.8), stump(1, 0.3, 0.6)];
        let ens = ensemble(Aggregation::Mean, trees);
        let x = [1.0, -1.0, 0.0];
        assert_additive(&ens, &x);

        let phi = contributions(&ens, &x);
        // Single stump alone: 0.8 - (0.4*0.2 + 0.6*0.8) = 0.24, halved.
        assert!((phi[0] - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_unused_feature_gets_nothing() {
        let ens = ensemble(Aggregation::Logit, vec![deep_tree()]);
        let phi = contributions(&ens, &[0.5, 2.0, 100.0]);
        assert_eq!(phi[2], 0.0);
    }
}
