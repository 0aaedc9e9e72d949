//! Training-set construction from raw leads.
//!
//! Pairs the feature matrix with a target column and enforces the fatal
//! dataset conditions: missing target column, empty dataset, single class.
//! Provides a deterministic seeded train/validation split.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::num::Wrapping;
use std::str::FromStr;

use crate::errors::AppError;
use crate::features::{extract_batch_at, FeatureMatrix};
use crate::labels::normalize_labels;
use crate::lead::Lead;
use crate::scoring::proxy_score;

/// Below this many leads a trained model is unlikely to mean much.
pub const MIN_RECOMMENDED_LEADS: usize = 50;

/// Default name of the binary label column.
pub const DEFAULT_TARGET_COLUMN: &str = "converted";

/// Which training target to derive from each lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    /// Binary 0/1 label read from a target column.
    #[default]
    Label,
    /// Rule-based proxy score in `[0, 1]`, no label column needed.
    Proxy,
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMode::Label => write!(f, "label"),
            TargetMode::Proxy => write!(f, "proxy"),
        }
    }
}

impl FromStr for TargetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "label" | "binary" => Ok(TargetMode::Label),
            "proxy" | "rule" | "rules" => Ok(TargetMode::Proxy),
            other => Err(format!(
                "unknown target mode '{}', expected 'label' or 'proxy'",
                other
            )),
        }
    }
}

/// Target definition for a training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub mode: TargetMode,
    /// Column read in [`TargetMode::Label`]; ignored for proxy targets.
    pub column: String,
}

impl TargetSpec {
    pub fn label(column: impl Into<String>) -> Self {
        Self {
            mode: TargetMode::Label,
            column: column.into(),
        }
    }

    pub fn proxy() -> Self {
        Self {
            mode: TargetMode::Proxy,
            column: String::new(),
        }
    }

    /// Name recorded in the model descriptor.
    pub fn describe(&self) -> String {
        match self.mode {
            TargetMode::Label => self.column.clone(),
            TargetMode::Proxy => "proxy_score".to_string(),
        }
    }
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self::label(DEFAULT_TARGET_COLUMN)
    }
}

/// Feature rows paired with cleaned targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub features: FeatureMatrix,
    pub targets: Vec<f64>,
    pub mode: TargetMode,
}

/// Counts reported after building a training set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub input_leads: usize,
    pub kept: usize,
    pub dropped: usize,
}

impl TrainingSet {
    /// Builds a training set relative to the current wall clock.
    pub fn build(leads: &[Lead], target: &TargetSpec) -> Result<(Self, BuildSummary), AppError> {
        Self::build_at(leads, target, Utc::now())
    }

    pub fn build_at(
        leads: &[Lead],
        target: &TargetSpec,
        now: DateTime<Utc>,
    ) -> Result<(Self, BuildSummary), AppError> {
        if leads.is_empty() {
            return Err(AppError::InvalidDataset("no leads to train on".to_string()));
        }
        if leads.len() < MIN_RECOMMENDED_LEADS {
            tracing::warn!(
                "Very few leads ({}); consider adding more data for a meaningful model",
                leads.len()
            );
        }

        let features = extract_batch_at(leads, now);
        tracing::debug!("Extracted {} feature rows", features.len());

        let set = match target.mode {
            TargetMode::Label => Self::with_labels(leads, features, &target.column)?,
            TargetMode::Proxy => Self {
                targets: leads.iter().map(proxy_score).collect(),
                features,
                mode: TargetMode::Proxy,
            },
        };

        let summary = BuildSummary {
            input_leads: leads.len(),
            kept: set.len(),
            dropped: leads.len() - set.len(),
        };
        Ok((set, summary))
    }

    fn with_labels(
        leads: &[Lead],
        features: FeatureMatrix,
        column: &str,
    ) -> Result<Self, AppError> {
        let raw: Vec<&Value> = leads
            .iter()
            .map(|lead| lead.get_first(&[column]).unwrap_or(&Value::Null))
            .collect();

        if raw.iter().all(|value| value.is_null()) {
            return Err(AppError::InvalidDataset(format!(
                "target column '{}' not found; provide a binary 0/1 label column",
                column
            )));
        }

        let labels = normalize_labels(raw);
        if labels.invalid_count() > 0 {
            tracing::warn!(
                "Target column '{}' has {} non-binary or missing values; dropping those rows",
                column,
                labels.invalid_count()
            );
        }
        labels.ensure_two_classes()?;

        let (negatives, positives) = labels.class_counts();
        tracing::info!(
            "Labels: {} positive, {} negative ({} dropped)",
            positives,
            negatives,
            labels.invalid_count()
        );

        Ok(Self {
            features: features.filter(labels.valid_mask()),
            targets: labels.valid_labels().into_iter().map(f64::from).collect(),
            mode: TargetMode::Label,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(indices),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            mode: self.mode,
        }
    }

    /// Deterministic seeded split into `(train, validation)`.
    ///
    /// Label targets are stratified so both parts keep the class ratio; each
    /// class with at least two rows contributes at least one validation row.
    pub fn split(&self, test_size: f64, seed: u64) -> (Self, Self) {
        let test_size = test_size.clamp(0.0, 1.0);
        let mut rng = LcgRng::new(seed);

        let groups: Vec<Vec<usize>> = match self.mode {
            TargetMode::Label => {
                let (neg, pos): (Vec<usize>, Vec<usize>) =
                    (0..self.len()).partition(|&i| self.targets[i] < 0.5);
                vec![neg, pos]
            }
            TargetMode::Proxy => vec![(0..self.len()).collect()],
        };

        let mut train = Vec::with_capacity(self.len());
        let mut valid = Vec::new();
        for mut group in groups {
            rng.shuffle(&mut group);
            let n = group.len();
            let mut n_valid = (test_size * n as f64).round() as usize;
            if test_size > 0.0 && n >= 2 {
                n_valid = n_valid.clamp(1, n - 1);
            }
            let n_valid = n_valid.min(n);
            valid.extend_from_slice(&group[..n_valid]);
            train.extend_from_slice(&group[n_valid..]);
        }

        // Interleave classes deterministically
        rng.shuffle(&mut train);
        rng.shuffle(&mut valid);
        (self.select(&train), self.select(&valid))
    }
}

/// Linear congruential generator (glibc constants) for reproducible shuffles.
#[derive(Clone, Debug)]
struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 1_103_515_245;
    const INCREMENT: u64 = 12_345;
    const MODULUS: u64 = 1 << 31;

    fn new(seed: u64) -> Self {
        Self {
            state: Wrapping(seed % Self::MODULUS),
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 % Self::MODULUS
    }

    fn next_below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % bound as u64) as usize
    }

    /// Fisher-Yates shuffle.
    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }
}
