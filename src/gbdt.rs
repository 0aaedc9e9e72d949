//! Gradient-boosted decision trees over lead feature rows.
//!
//! Second-order boosting with exact-greedy splits over pre-binned integer
//! features. Split selection scans features and bins in a fixed order and
//! only replaces the incumbent on a strictly larger gain, so identical
//! inputs always yield identical models.

use serde::{Deserialize, Serialize};

use crate::dataset::{TargetMode, TrainingSet};
use crate::errors::AppError;
use crate::features::{FeatureMatrix, FEATURE_COUNT, FEATURE_NAMES};
use crate::metrics::{auc, log_loss, rmse};

/// Loss being minimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Log loss on 0/1 labels; outputs a probability.
    Binary,
    /// Squared error on `[0, 1]` targets; outputs the clamped prediction.
    Regression,
}

impl Objective {
    pub fn for_mode(mode: TargetMode) -> Self {
        match mode {
            TargetMode::Label => Objective::Binary,
            TargetMode::Proxy => Objective::Regression,
        }
    }

    /// Initial raw prediction shared by every row.
    fn base_score(self, targets: &[f64]) -> f64 {
        if targets.is_empty() {
            return 0.0;
        }
        let mean = targets.iter().sum::<f64>() / targets.len() as f64;
        match self {
            Objective::Binary => {
                let p = mean.clamp(1e-6, 1.0 - 1e-6);
                (p / (1.0 - p)).ln()
            }
            Objective::Regression => mean,
        }
    }

    fn gradients(self, raw: &[f64], targets: &[f64]) -> (Vec<f64>, Vec<f64>) {
        raw.iter()
            .zip(targets)
            .map(|(&r, &y)| match self {
                Objective::Binary => {
                    let p = sigmoid(r);
                    (p - y, (p * (1.0 - p)).max(1e-16))
                }
                Objective::Regression => (r - y, 1.0),
            })
            .unzip()
    }

    /// Maps a raw score to the model output.
    pub fn transform(self, raw: f64) -> f64 {
        match self {
            Objective::Binary => sigmoid(raw),
            Objective::Regression => raw.clamp(0.0, 1.0),
        }
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Booster configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub num_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Minimum hessian sum per child.
    pub min_child_weight: f64,
    /// L2 regularization on leaf values.
    pub lambda_l2: f64,
    pub min_split_gain: f64,
    pub max_bins: usize,
    /// Stop after this many rounds without validation improvement; 0 disables.
    pub early_stopping_rounds: usize,
    /// Log evaluation every N rounds; 0 disables.
    pub log_period: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            num_rounds: 500,
            learning_rate: 0.05,
            max_depth: 6,
            min_samples_leaf: 20,
            min_child_weight: 1e-3,
            lambda_l2: 1.0,
            min_split_gain: 0.0,
            max_bins: 255,
            early_stopping_rounds: 50,
            log_period: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `row[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: i64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// One regression tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, row: &[i64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let Some(&value) = row.get(*feature) else {
                        return 0.0;
                    };
                    idx = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= feature_count {
                        return Err(format!("node {} splits on unknown feature {}", idx, feature));
                    }
                    // Children always follow their parent, which rules out cycles
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", idx, child));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {} is not finite", idx));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A trained ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booster {
    pub objective: Objective,
    pub base_score: f64,
    pub feature_count: usize,
    pub trees: Vec<Tree>,
}

impl Booster {
    pub fn predict_raw(&self, row: &[i64]) -> f64 {
        self.base_score + self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>()
    }

    /// Probability (binary) or clamped score (regression) for one row.
    pub fn predict(&self, row: &[i64]) -> f64 {
        self.objective.transform(self.predict_raw(row))
    }

    pub fn predict_matrix(&self, matrix: &FeatureMatrix) -> Vec<f64> {
        matrix.rows().iter().map(|row| self.predict(row)).collect()
    }

    /// Number of splits per feature, in feature order.
    pub fn split_counts(&self) -> [usize; FEATURE_COUNT] {
        let mut counts = [0; FEATURE_COUNT];
        for node in self.trees.iter().flat_map(|tree| &tree.nodes) {
            if let Node::Split { feature, .. } = node {
                if let Some(count) = counts.get_mut(*feature) {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Structural checks run after loading a model from disk.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.feature_count != FEATURE_COUNT {
            return Err(AppError::ModelError(format!(
                "model expects {} features, extractor produces {}",
                self.feature_count, FEATURE_COUNT
            )));
        }
        if !self.base_score.is_finite() {
            return Err(AppError::ModelError("base score is not finite".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count)
                .map_err(|e| AppError::ModelError(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }
}

/// Per-feature bin upper edges learned from training data.
#[derive(Debug, Clone)]
struct FeatureBins {
    edges: Vec<Vec<i64>>,
}

impl FeatureBins {
    fn fit(matrix: &FeatureMatrix, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, u16::MAX as usize);
        let edges = (0..FEATURE_COUNT)
            .map(|f| {
                let mut values: Vec<i64> = matrix.rows().iter().map(|row| row[f]).collect();
                values.sort_unstable();
                let mut unique = values.clone();
                unique.dedup();
                if unique.len() <= max_bins {
                    return unique;
                }
                let mut edges: Vec<i64> = (1..max_bins)
                    .map(|k| values[k * values.len() / max_bins - 1])
                    .collect();
                edges.push(*values.last().unwrap_or(&0));
                edges.dedup();
                edges
            })
            .collect();
        Self { edges }
    }

    fn bin_count(&self, feature: usize) -> usize {
        self.edges[feature].len()
    }

    fn bin(&self, feature: usize, value: i64) -> u16 {
        let edges = &self.edges[feature];
        let idx = edges.partition_point(|&edge| edge < value);
        idx.min(edges.len().saturating_sub(1)) as u16
    }

    fn upper(&self, feature: usize, bin: usize) -> i64 {
        self.edges[feature][bin]
    }

    /// Column-major bin indices for every row.
    fn bin_matrix(&self, matrix: &FeatureMatrix) -> Vec<Vec<u16>> {
        (0..FEATURE_COUNT)
            .map(|f| matrix.rows().iter().map(|row| self.bin(f, row[f])).collect())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct TreeBuilder<'a> {
    params: &'a TrainingParams,
    bins: &'a FeatureBins,
    binned: &'a [Vec<u16>],
    gradients: &'a [f64],
    hessians: &'a [f64],
}

impl TreeBuilder<'_> {
    fn build(&self) -> Tree {
        let indices: Vec<usize> = (0..self.gradients.len()).collect();
        let mut nodes = Vec::new();
        self.grow(&indices, 0, &mut nodes);
        Tree { nodes }
    }

    fn grow(&self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
        let current = nodes.len();
        let (g, h) = self.sums(indices);
        let leaf = Node::Leaf {
            value: -g / (h + self.params.lambda_l2) * self.params.learning_rate,
        };

        if depth >= self.params.max_depth || indices.len() < 2 * self.params.min_samples_leaf.max(1)
        {
            nodes.push(leaf);
            return current;
        }

        let Some(split) = self.best_split(indices, g, h) else {
            nodes.push(leaf);
            return current;
        };

        let column = &self.binned[split.feature];
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| column[i] as usize <= split.bin);

        // Reserve the slot, fill it once children are placed
        nodes.push(leaf);
        let left_idx = self.grow(&left, depth + 1, nodes);
        let right_idx = self.grow(&right, depth + 1, nodes);
        nodes[current] = Node::Split {
            feature: split.feature,
            threshold: self.bins.upper(split.feature, split.bin),
            left: left_idx,
            right: right_idx,
        };
        current
    }

    fn sums(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i], h + self.hessians[i])
        })
    }

    fn best_split(&self, indices: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let lambda = self.params.lambda_l2;
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_score = g_total * g_total / (h_total + lambda);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..FEATURE_COUNT {
            let bin_count = self.bins.bin_count(feature);
            if bin_count < 2 {
                continue;
            }

            let column = &self.binned[feature];
            let mut histogram = vec![(0.0_f64, 0.0_f64, 0_usize); bin_count];
            for &i in indices {
                let slot = &mut histogram[column[i] as usize];
                slot.0 += self.gradients[i];
                slot.1 += self.hessians[i];
                slot.2 += 1;
            }

            let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0);
            for (bin, &(g, h, n)) in histogram.iter().enumerate().take(bin_count - 1) {
                gl += g;
                hl += h;
                nl += n;
                let nr = indices.len() - nl;
                if nl < min_leaf || nr < min_leaf {
                    continue;
                }
                let (gr, hr) = (g_total - gl, h_total - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }

                let gain = gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score;
                if gain <= self.params.min_split_gain {
                    continue;
                }
                if best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }

        best
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub booster: Booster,
    /// Rounds kept in the final model.
    pub best_iteration: usize,
    pub rounds_trained: usize,
    /// Validation metric name and best value, when a validation set was given.
    pub validation: Option<(&'static str, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Auc,
    LogLoss,
    Rmse,
}

impl Metric {
    fn choose(objective: Objective, valid: &TrainingSet) -> Self {
        match objective {
            Objective::Regression => Metric::Rmse,
            Objective::Binary => {
                let has_pos = valid.targets.iter().any(|&y| y >= 0.5);
                let has_neg = valid.targets.iter().any(|&y| y < 0.5);
                if has_pos && has_neg {
                    Metric::Auc
                } else {
                    Metric::LogLoss
                }
            }
        }
    }

    fn name(self) -> &'static str {
        match self {
            Metric::Auc => "auc",
            Metric::LogLoss => "binary_logloss",
            Metric::Rmse => "rmse",
        }
    }

    fn evaluate(self, objective: Objective, raw: &[f64], targets: &[f64]) -> f64 {
        let outputs: Vec<f64> = raw.iter().map(|&r| objective.transform(r)).collect();
        match self {
            Metric::Auc => auc(&outputs, targets).unwrap_or(0.5),
            Metric::LogLoss => log_loss(&outputs, targets),
            Metric::Rmse => rmse(&outputs, targets),
        }
    }

    fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Metric::Auc => candidate > incumbent,
            Metric::LogLoss | Metric::Rmse => candidate < incumbent,
        }
    }
}

/// Boosting driver.
pub struct GbdtTrainer {
    params: TrainingParams,
}

impl GbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Trains on `train`, early-stopping on `valid` when it is non-empty.
    pub fn train(
        &self,
        train: &TrainingSet,
        valid: Option<&TrainingSet>,
    ) -> Result<TrainingReport, AppError> {
        if train.is_empty() {
            return Err(AppError::InvalidDataset("training set is empty".to_string()));
        }
        if self.params.learning_rate <= 0.0 || !self.params.learning_rate.is_finite() {
            return Err(AppError::BadRequest(format!(
                "learning rate must be positive, got {}",
                self.params.learning_rate
            )));
        }

        let objective = Objective::for_mode(train.mode);
        let bins = FeatureBins::fit(&train.features, self.params.max_bins);
        let binned = bins.bin_matrix(&train.features);
        for (name, edges) in FEATURE_NAMES.iter().zip(&bins.edges) {
            tracing::debug!("Feature {}: {} bins", name, edges.len());
        }

        let base_score = objective.base_score(&train.targets);
        let mut train_raw = vec![base_score; train.len()];

        let valid = valid.filter(|v| !v.is_empty());
        let metric = valid.map(|v| Metric::choose(objective, v));
        let mut valid_raw = valid.map(|v| vec![base_score; v.len()]).unwrap_or_default();

        let mut trees: Vec<Tree> = Vec::with_capacity(self.params.num_rounds);
        let mut best: Option<(usize, f64)> = None;

        for round in 0..self.params.num_rounds {
            let (gradients, hessians) = objective.gradients(&train_raw, &train.targets);
            let tree = TreeBuilder {
                params: &self.params,
                bins: &bins,
                binned: &binned,
                gradients: &gradients,
                hessians: &hessians,
            }
            .build();

            for (raw, row) in train_raw.iter_mut().zip(train.features.rows()) {
                *raw += tree.predict(row);
            }
            trees.push(tree);

            let (Some(valid), Some(metric)) = (valid, metric) else {
                continue;
            };
            let tree = &trees[round];
            for (raw, row) in valid_raw.iter_mut().zip(valid.features.rows()) {
                *raw += tree.predict(row);
            }

            let score = metric.evaluate(objective, &valid_raw, &valid.targets);
            if self.params.log_period > 0 && (round + 1) % self.params.log_period == 0 {
                let train_score = metric.evaluate(objective, &train_raw, &train.targets);
                tracing::info!(
                    "[{}] train {}: {:.5}  valid {}: {:.5}",
                    round + 1,
                    metric.name(),
                    train_score,
                    metric.name(),
                    score
                );
            }

            match best {
                Some((_, incumbent)) if !metric.improves(score, incumbent) => {}
                _ => best = Some((round, score)),
            }
            if let Some((best_round, _)) = best {
                let stale = round - best_round;
                if self.params.early_stopping_rounds > 0 && stale >= self.params.early_stopping_rounds
                {
                    tracing::info!(
                        "Early stopping at round {}, best iteration {}",
                        round + 1,
                        best_round + 1
                    );
                    break;
                }
            }
        }

        let rounds_trained = trees.len();
        let best_iteration = best.map_or(rounds_trained, |(round, _)| round + 1);
        trees.truncate(best_iteration);

        let booster = Booster {
            objective,
            base_score,
            feature_count: FEATURE_COUNT,
            trees,
        };

        Ok(TrainingReport {
            booster,
            best_iteration,
            rounds_trained,
            validation: metric.zip(best.map(|(_, score)| score)).map(|(m, s)| (m.name(), s)),
        })
    }
}
