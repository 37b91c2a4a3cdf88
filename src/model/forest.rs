//! Random forest binary classifier.
//!
//! Trees are grown on bootstrap resamples with Gini impurity, a random
//! subset of `sqrt(n_features)` candidate features per split and
//! class-balanced sample weights. Each leaf stores the weighted fraction of
//! violent samples it received; the forest probability is the mean over
//! trees.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::features::FEATURE_LEN;

/// Forest hyper-parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Candidate features per split; `None` means `sqrt(n_features)`.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl ForestParams {
    /// Profile used for fresh or synthetic training.
    pub fn standard() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            max_features: None,
            seed: 42,
        }
    }

    /// Deeper, larger profile used for corpus-derived training.
    pub fn corpus() -> Self {
        Self {
            n_trees: 200,
            max_depth: 15,
            ..Self::standard()
        }
    }

    fn features_per_split(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features)
    }
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        violent: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Single decision tree stored as a node arena, root at index 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { violent } => return *violent,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(anyhow!("tree has no nodes"));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { violent } => {
                    if !(0.0..=1.0).contains(violent) {
                        return Err(anyhow!("leaf {} probability {} out of range", i, violent));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // Children are always appended after their parent.
                    let children_ok = *left > i
                        && *right > i
                        && *left < self.nodes.len()
                        && *right < self.nodes.len();
                    if *feature >= FEATURE_LEN || !threshold.is_finite() || !children_ok {
                        return Err(anyhow!("split node {} is malformed", i));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Trained random forest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit on standardized rows `x` with labels `y` (0 = safe, 1 = violent).
    pub fn fit(x: &[[f64; FEATURE_LEN]], y: &[u8], params: &ForestParams) -> Result<Self> {
        if x.is_empty() {
            return Err(anyhow!("cannot fit forest on an empty sample set"));
        }
        if x.len() != y.len() {
            return Err(anyhow!("{} rows but {} labels", x.len(), y.len()));
        }
        if params.n_trees == 0 || params.max_depth == 0 {
            return Err(anyhow!("forest needs at least one tree of depth >= 1"));
        }
        let violent = y.iter().filter(|&&label| label == 1).count();
        let safe = y.iter().filter(|&&label| label == 0).count();
        if violent + safe != y.len() {
            return Err(anyhow!("labels must be 0 or 1"));
        }
        if violent == 0 || safe == 0 {
            return Err(anyhow!("training data needs samples of both classes"));
        }

        // Balanced weighting: n / (classes * class_count).
        let n = y.len() as f64;
        let class_weight = [n / (2.0 * safe as f64), n / (2.0 * violent as f64)];

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let mut counts = vec![0u32; x.len()];
            for _ in 0..x.len() {
                counts[rng.gen_range(0..x.len())] += 1;
            }
            let weights: Vec<f64> = counts
                .iter()
                .zip(y)
                .map(|(&c, &label)| c as f64 * class_weight[label as usize])
                .collect();
            let indices: Vec<usize> = (0..x.len()).filter(|&i| counts[i] > 0).collect();

            let mut builder = TreeBuilder {
                x,
                y,
                weights: &weights,
                params,
                features_per_split: params.features_per_split(FEATURE_LEN),
                rng: &mut rng,
                nodes: Vec::new(),
            };
            builder.grow(indices, 0);
            trees.push(DecisionTree {
                nodes: builder.nodes,
            });
        }

        Ok(Self {
            params: params.clone(),
            trees,
        })
    }

    /// Probability of the violent class.
    pub fn predict_proba(&self, x: &[f64; FEATURE_LEN]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    /// Hard label at the natural 0.5 midpoint.
    pub fn predict(&self, x: &[f64; FEATURE_LEN]) -> u8 {
        u8::from(self.predict_proba(x) > 0.5)
    }

    /// Fraction of rows whose predicted label matches.
    pub fn score(&self, x: &[[f64; FEATURE_LEN]], y: &[u8]) -> f64 {
        if x.is_empty() {
            return 0.0;
        }
        let correct = x
            .iter()
            .zip(y)
            .filter(|(row, label)| self.predict(row) == **label)
            .count();
        correct as f64 / x.len() as f64
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural check for deserialized state.
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(anyhow!("forest has no trees"));
        }
        for tree in &self.trees {
            tree.validate()?;
        }
        Ok(())
    }
}

struct TreeBuilder<'a> {
    x: &'a [[f64; FEATURE_LEN]],
    y: &'a [u8],
    weights: &'a [f64],
    params: &'a ForestParams,
    features_per_split: usize,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let totals = self.class_totals(&indices);
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            violent: violent_fraction(totals),
        });

        let pure = totals[0] == 0.0 || totals[1] == 0.0;
        if pure || depth >= self.params.max_depth || indices.len() < self.params.min_samples_split
        {
            return node_idx;
        }

        let Some(split) = self.best_split(&indices, totals) else {
            return node_idx;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn class_totals(&self, indices: &[usize]) -> [f64; 2] {
        let mut totals = [0.0; 2];
        for &i in indices {
            totals[self.y[i] as usize] += self.weights[i];
        }
        totals
    }

    /// Evaluate a random subset of features; keep drawing past the subset
    /// only while no usable split has been found.
    fn best_split(&mut self, indices: &[usize], totals: [f64; 2]) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..FEATURE_LEN).collect();
        features.shuffle(&mut *self.rng);

        let parent = gini(totals) * (totals[0] + totals[1]);
        let mut best: Option<SplitCandidate> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.features_per_split && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_threshold(indices, feature, totals) {
                let better = best
                    .as_ref()
                    .map_or(true, |b| candidate.impurity < b.impurity);
                if better {
                    best = Some(candidate);
                }
            }
        }
        best.filter(|b| parent - b.impurity > 1e-12)
    }

    fn best_threshold(
        &self,
        indices: &[usize],
        feature: usize,
        totals: [f64; 2],
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = indices.to_vec();
        order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

        let mut left = [0.0; 2];
        let mut best: Option<SplitCandidate> = None;
        for pair in order.windows(2) {
            let (i, next) = (pair[0], pair[1]);
            left[self.y[i] as usize] += self.weights[i];
            let (v, v_next) = (self.x[i][feature], self.x[next][feature]);
            if v_next <= v {
                continue;
            }
            let right = [totals[0] - left[0], totals[1] - left[1]];
            let impurity =
                gini(left) * (left[0] + left[1]) + gini(right) * (right[0] + right[1]);
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = v + (v_next - v) / 2.0;
                if threshold >= v_next {
                    threshold = v;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(totals: [f64; 2]) -> f64 {
    let sum = totals[0] + totals[1];
    if sum <= 0.0 {
        return 0.0;
    }
    let p0 = totals[0] / sum;
    let p1 = totals[1] / sum;
    1.0 - p0 * p0 - p1 * p1
}

fn violent_fraction(totals: [f64; 2]) -> f64 {
    let sum = totals[0] + totals[1];
    if sum <= 0.0 {
        0.0
    } else {
        totals[1] / sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: f64, noise: f64) -> [f64; FEATURE_LEN] {
        let mut r = [0.0; FEATURE_LEN];
        for (j, v) in r.iter_mut().enumerate() {
            *v = value + noise * (j % 3) as f64;
        }
        r
    }

    fn separable() -> (Vec<[f64; FEATURE_LEN]>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..60 {
            let noise = (i % 7) as f64 * 0.1;
            x.push(row(-2.0 - (i % 5) as f64 * 0.1, noise));
            y.push(0);
            if i % 3 == 0 {
                x.push(row(2.0 + (i % 5) as f64 * 0.1, noise));
                y.push(1);
            }
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 15,
            max_depth: 4,
            ..ForestParams::standard()
        }
    }

    #[test]
    fn learns_separable_classes_despite_imbalance() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_params()).unwrap();

        assert_eq!(forest.trees().len(), 15);
        assert!(forest.score(&x, &y) > 0.99);
        assert!(forest.predict_proba(&row(2.5, 0.0)) > 0.8);
        assert!(forest.predict_proba(&row(-2.5, 0.0)) < 0.2);
        forest.validate().unwrap();
    }

    #[test]
    fn same_seed_gives_same_forest() {
        let (x, y) = separable();
        let a = RandomForest::fit(&x, &y, &small_params()).unwrap();
        let b = RandomForest::fit(&x, &y, &small_params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn depth_is_bounded() {
        let (x, y) = separable();
        let params = ForestParams {
            n_trees: 5,
            max_depth: 1,
            ..ForestParams::standard()
        };
        let forest = RandomForest::fit(&x, &y, &params).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn rejects_single_class_or_bad_labels() {
        let x = vec![row(1.0, 0.0); 4];
        assert!(RandomForest::fit(&x, &[0, 0, 0, 0], &small_params()).is_err());
        assert!(RandomForest::fit(&x, &[0, 1, 2, 1], &small_params()).is_err());
        assert!(RandomForest::fit(&x, &[0, 1], &small_params()).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_leaf() {
        let forest = RandomForest {
            params: ForestParams::standard(),
            trees: vec![DecisionTree {
                nodes: vec![Node::Leaf { violent: 1.5 }],
            }],
        };
        assert!(forest.validate().is_err());
    }
}
