//! Binary label normalization for training targets.
//!
//! Raw target columns arrive as numbers, booleans, numeric strings or
//! yes/no words. Only values that clearly mean 0 or 1 are accepted; anything
//! else is rejected rather than guessed, and the rejection mask is what
//! filters both labels and feature rows.

use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;

const TRUE_WORDS: [&str; 3] = ["true", "yes", "y"];
const FALSE_WORDS: [&str; 3] = ["false", "no", "n"];

/// Normalizes a single raw target value to 0/1, or `None` when unusable.
pub fn normalize_label(raw: &Value) -> Option<u8> {
    if let Some(number) = coerce_numeric(raw) {
        if number == 0.0 {
            return Some(0);
        }
        if number == 1.0 {
            return Some(1);
        }
    }

    let Value::String(s) = raw else {
        return None;
    };
    let word = s.trim().to_lowercase();
    if TRUE_WORDS.contains(&word.as_str()) {
        Some(1)
    } else if FALSE_WORDS.contains(&word.as_str()) {
        Some(0)
    } else {
        None
    }
}

fn coerce_numeric(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Per-position normalized labels plus the validity mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSet {
    labels: Vec<Option<u8>>,
    valid_mask: Vec<bool>,
}

impl LabelSet {
    /// Normalization result for every input position, `None` where invalid.
    pub fn labels(&self) -> &[Option<u8>] {
        &self.labels
    }

    pub fn valid_mask(&self) -> &[bool] {
        &self.valid_mask
    }

    /// Labels of the valid rows only, in input order.
    pub fn valid_labels(&self) -> Vec<u8> {
        self.labels.iter().flatten().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_mask.iter().filter(|valid| **valid).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.len() - self.valid_count()
    }

    /// `(negatives, positives)` among valid labels.
    pub fn class_counts(&self) -> (usize, usize) {
        self.labels
            .iter()
            .flatten()
            .fold((0, 0), |(neg, pos), label| match label {
                0 => (neg + 1, pos),
                _ => (neg, pos + 1),
            })
    }

    /// Fails when the valid labels do not contain both classes.
    pub fn ensure_two_classes(&self) -> Result<(), AppError> {
        let (negatives, positives) = self.class_counts();
        if negatives == 0 || positives == 0 {
            return Err(AppError::InvalidDataset(format!(
                "target has only one class after cleaning ({} negatives, {} positives); \
                 need both 0 and 1 to train a binary model",
                negatives, positives
            )));
        }
        Ok(())
    }
}

/// Normalizes a column of raw target values.
pub fn normalize_labels<'a, I>(raw_values: I) -> LabelSet
where
    I: IntoIterator<Item = &'a Value>,
{
    let labels: Vec<Option<u8>> = raw_values.into_iter().map(normalize_label).collect();
    let valid_mask = labels.iter().map(Option::is_some).collect();
    LabelSet { labels, valid_mask }
}
