//! Trained classifier families served by the engine.
//!
//! Models are selected and fitted offline; this module only evaluates them.
//! All evaluation is pure and deterministic: no randomness, no caching.

use serde::{Deserialize, Serialize};

use crate::ports::ProbabilisticModel;

/// Relative slack allowed between a split's cover and its children's.
const COVER_TOLERANCE: f64 = 1e-6;

/// Numerically stable logistic function.
#[must_use]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// A serialized classifier, tagged by family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Logistic(LogisticModel),
    TreeEnsemble(TreeEnsemble),
    KernelSvm(KernelSvm),
}

impl Classifier {
    /// Short family name for logs and status output.
    #[must_use]
    pub fn family(&self) -> &'static str {
        match self {
            Self::Logistic(_) => "logistic",
            Self::TreeEnsemble(_) => "tree_ensemble",
            Self::KernelSvm(_) => "kernel_svm",
        }
    }

    #[must_use]
    pub fn as_tree_ensemble(&self) -> Option<&TreeEnsemble> {
        match self {
            Self::TreeEnsemble(ensemble) => Some(ensemble),
            _ => None,
        }
    }

    /// Structural checks against the schema width.
    ///
    /// # Errors
    /// Returns a description of the first inconsistency found.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        match self {
            Self::Logistic(m) => m.validate(n_features),
            Self::TreeEnsemble(m) => m.validate(n_features),
            Self::KernelSvm(m) => m.validate(n_features),
        }
    }
}

impl ProbabilisticModel for Classifier {
    fn n_features(&self) -> usize {
        match self {
            Self::Logistic(m) => m.coefficients.len(),
            Self::TreeEnsemble(m) => m.n_features,
            Self::KernelSvm(m) => m.support_vectors.first().map_or(0, Vec::len),
        }
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        match self {
            Self::Logistic(m) => sigmoid(m.margin(features)),
            Self::TreeEnsemble(m) => m.predict_proba(features),
            Self::KernelSvm(m) => m.predict_proba(features),
        }
    }
}

/// Logistic regression over scaled features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    /// Log-odds of the positive class.
    #[must_use]
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(features)
            .fold(self.intercept, |acc, (w, x)| acc + w * x)
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.coefficients.len() != n_features {
            return Err(format!(
                "logistic model has {} coefficients, schema has {n_features} features",
                self.coefficients.len()
            ));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err("logistic model has non-finite parameters".into());
        }
        Ok(())
    }
}

/// How per-tree outputs combine into a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Leaves hold positive-class probabilities; trees are averaged
    /// (decision tree, random forest).
    Mean,
    /// Leaves hold log-odds increments summed onto `base_score`
    /// (gradient boosting).
    Logit,
}

/// An ensemble of binary decision trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    /// Ensemble output before the final link: mean probability for
    /// [`Aggregation::Mean`], margin for [`Aggregation::Logit`].
    #[must_use]
    pub fn raw_output(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        match self.aggregation {
            Aggregation::Mean => sum * self.tree_weight(),
            Aggregation::Logit => self.base_score + sum,
        }
    }

    #[must_use]
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        let raw = self.raw_output(features);
        match self.aggregation {
            Aggregation::Mean => raw,
            Aggregation::Logit => sigmoid(raw),
        }
    }

    /// Cover-weighted expected raw output over the training distribution.
    #[must_use]
    pub fn expected_output(&self) -> f64 {
        let sum: f64 = self.trees.iter().map(Tree::expected_value).sum();
        match self.aggregation {
            Aggregation::Mean => sum * self.tree_weight(),
            Aggregation::Logit => self.base_score + sum,
        }
    }

    /// Factor applied to each tree's contribution in the raw output.
    #[must_use]
    pub fn tree_weight(&self) -> f64 {
        match self.aggregation {
            Aggregation::Mean => 1.0 / self.trees.len().max(1) as f64,
            Aggregation::Logit => 1.0,
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.n_features != n_features {
            return Err(format!(
                "tree ensemble expects {} features, schema has {n_features}",
                self.n_features
            ));
        }
        if self.trees.is_empty() {
            return Err("tree ensemble has no trees".into());
        }
        if !self.base_score.is_finite() {
            return Err("tree ensemble base_score is not finite".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|e| format!("tree {i}: {e}"))?;
            if self.aggregation == Aggregation::Mean
                && tree.leaf_values().any(|v| !(0.0..=1.0).contains(&v))
            {
                return Err(format!("tree {i}: mean-aggregated leaves must be probabilities"));
            }
        }
        Ok(())
    }
}

/// One node of a decision tree. `x[feature] <= threshold` goes left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Training samples (or hessian mass) that reached this node.
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    #[must_use]
    pub fn cover(&self) -> f64 {
        match self {
            Self::Split { cover, .. } | Self::Leaf { cover, .. } => *cover,
        }
    }
}

/// A binary decision tree stored as a flat node array rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by `features`.
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value.
    #[must_use]
    pub fn expected_value(&self) -> f64 {
        self.expected_from(0)
    }

    fn expected_from(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            Node::Leaf { value, .. } => *value,
            Node::Split { left, right, .. } => {
                let wl = self.nodes[*left].cover();
                let wr = self.nodes[*right].cover();
                (wl * self.expected_from(*left) + wr * self.expected_from(*right)) / (wl + wr)
            }
        }
    }

    fn leaf_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.nodes.iter().filter_map(|n| match n {
            Node::Leaf { value, .. } => Some(*value),
            Node::Split { .. } => None,
        })
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !cover.is_finite() || cover <= 0.0 {
                return Err(format!("node {i} has non-positive cover"));
            }
            match node {
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {i} has non-finite value"));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {i} splits on feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has non-finite threshold"));
                    }
                    // Children strictly after the parent keeps traversal acyclic.
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                    // TreeSHAP weights each branch by child cover over parent cover.
                    let children = self.nodes[*left].cover() + self.nodes[*right].cover();
                    if (cover - children).abs() > COVER_TOLERANCE * cover.max(children) {
                        return Err(format!(
                            "node {i} cover {cover} does not match its children ({children})"
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// RBF-kernel support vector classifier with Platt-scaled probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSvm {
    pub gamma: f64,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coefficients: Vec<f64>,
    pub intercept: f64,
    pub platt_a: f64,
    pub platt_b: f64,
}

impl KernelSvm {
    /// Signed distance-like decision value.
    #[must_use]
    pub fn decision(&self, features: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.dual_coefficients)
            .fold(self.intercept, |acc, (sv, alpha)| {
                let dist2: f64 = sv
                    .iter()
                    .zip(features)
                    .map(|(s, x)| (s - x) * (s - x))
                    .sum();
                acc + alpha * (-self.gamma * dist2).exp()
            })
    }

    /// `P(y = 1 | f) = 1 / (1 + exp(A f + B))`.
    #[must_use]
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        let f = self.decision(features);
        sigmoid(-(self.platt_a * f + self.platt_b))
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.support_vectors.is_empty() {
            return Err("svm has no support vectors".into());
        }
        if self.support_vectors.len() != self.dual_coefficients.len() {
            return Err("svm support vector and dual coefficient counts differ".into());
        }
        if self.support_vectors.iter().any(|sv| sv.len() != n_features) {
            return Err(format!("svm support vectors must have {n_features} features"));
        }
        let scalars = [self.gamma, self.intercept, self.platt_a, self.platt_b];
        if self.gamma <= 0.0
            || scalars.iter().any(|v| !v.is_finite())
            || self.dual_coefficients.iter().any(|v| !v.is_finite())
            || self.support_vectors.iter().flatten().any(|v| !v.is_finite())
        {
            return Err("svm has invalid parameters".into());
        }
        Ok(())
    }
}
