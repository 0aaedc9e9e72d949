//! Feature extraction for lead scoring.
//!
//! Maps one lead record to a fixed-order integer feature vector. Training and
//! serving both go through this module, so the field list and its order are a
//! versioned contract: changing [`FEATURE_NAMES`] invalidates every stored
//! model and its `feature_config.json`.
//!
//! Extraction is total. Missing or malformed inputs degrade to 0 for the one
//! field they feed and never affect the other fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lead::{Lead, LeadField};

/// Number of features per lead.
pub const FEATURE_COUNT: usize = 11;

/// Ordered feature names. Must match training and serving.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "has_email",
    "has_phone",
    "has_aadhar",
    "has_name",
    "num_sources_seen",
    "num_products_seen",
    "days_since_created",
    "p_id_personal_loan",
    "p_id_credit_card",
    "p_id_home_loan",
    "p_id_other",
];

/// Version written to `feature_config.json` alongside a trained model.
pub const FEATURE_SCHEMA_VERSION: &str = "1.1";

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Product category derived from the free-text product identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    PersonalLoan,
    CreditCard,
    HomeLoan,
    Other,
}

impl ProductCategory {
    /// Classifies by substring in fixed priority order.
    pub fn classify(product_id: &str) -> Self {
        let upper = product_id.to_uppercase();
        if upper.contains("PERSONAL") || upper.contains("LOAN") {
            ProductCategory::PersonalLoan
        } else if upper.contains("CREDIT") || upper.contains("CARD") {
            ProductCategory::CreditCard
        } else if upper.contains("HOME") {
            ProductCategory::HomeLoan
        } else {
            ProductCategory::Other
        }
    }

    fn one_hot(self) -> [i64; 4] {
        match self {
            ProductCategory::PersonalLoan => [1, 0, 0, 0],
            ProductCategory::CreditCard => [0, 1, 0, 0],
            ProductCategory::HomeLoan => [0, 0, 1, 0],
            ProductCategory::Other => [0, 0, 0, 1],
        }
    }
}

/// Encoded features of a single lead, in [`FEATURE_NAMES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureVector {
    pub has_email: i64,
    pub has_phone: i64,
    pub has_aadhar: i64,
    pub has_name: i64,
    pub num_sources_seen: i64,
    pub num_products_seen: i64,
    pub days_since_created: i64,
    pub p_id_personal_loan: i64,
    pub p_id_credit_card: i64,
    pub p_id_home_loan: i64,
    pub p_id_other: i64,
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [i64; FEATURE_COUNT] {
        [
            self.has_email,
            self.has_phone,
            self.has_aadhar,
            self.has_name,
            self.num_sources_seen,
            self.num_products_seen,
            self.days_since_created,
            self.p_id_personal_loan,
            self.p_id_credit_card,
            self.p_id_home_loan,
            self.p_id_other,
        ]
    }

    /// `(name, value)` pairs in [`FEATURE_NAMES`] order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, i64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }

    pub fn product_category(&self) -> ProductCategory {
        match (
            self.p_id_personal_loan,
            self.p_id_credit_card,
            self.p_id_home_loan,
        ) {
            (1, _, _) => ProductCategory::PersonalLoan,
            (_, 1, _) => ProductCategory::CreditCard,
            (_, _, 1) => ProductCategory::HomeLoan,
            _ => ProductCategory::Other,
        }
    }
}

/// Row-aligned feature rows for a batch of leads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: Vec<[i64; FEATURE_COUNT]>,
}

impl FeatureMatrix {
    pub fn from_rows(rows: Vec<[i64; FEATURE_COUNT]>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[[i64; FEATURE_COUNT]] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<[i64; FEATURE_COUNT]> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keeps the rows whose mask entry is `true`.
    ///
    /// The mask must have one entry per row; the label normalizer's mask is
    /// built that way.
    pub fn filter(&self, mask: &[bool]) -> Self {
        debug_assert_eq!(mask.len(), self.rows.len());
        let rows = self
            .rows
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(row, _)| *row)
            .collect();
        Self { rows }
    }

    /// Selects rows by index, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| self.rows[i]).collect(),
        }
    }

    /// Per-feature `(min, max)` over all rows.
    pub fn feature_ranges(&self) -> Vec<(i64, i64)> {
        let mut ranges = vec![(i64::MAX, i64::MIN); FEATURE_COUNT];
        for row in &self.rows {
            for (range, &value) in ranges.iter_mut().zip(row) {
                range.0 = range.0.min(value);
                range.1 = range.1.max(value);
            }
        }
        ranges
    }
}

/// Extracts features using the current wall-clock time.
pub fn extract(lead: &Lead) -> FeatureVector {
    extract_at(lead, Utc::now())
}

/// Extracts features relative to a fixed reference time.
pub fn extract_at(lead: &Lead, now: DateTime<Utc>) -> FeatureVector {
    let category = lead
        .text(LeadField::ProductId)
        .map(|p_id| ProductCategory::classify(&p_id))
        .unwrap_or(ProductCategory::Other);
    let [personal_loan, credit_card, home_loan, other] = category.one_hot();

    FeatureVector {
        has_email: lead.has(LeadField::Email) as i64,
        has_phone: lead.has(LeadField::PhoneNumber) as i64,
        has_aadhar: lead.has(LeadField::AadharNumber) as i64,
        has_name: lead.has(LeadField::Name) as i64,
        num_sources_seen: lead.sequence_len(LeadField::SourcesSeen) as i64,
        num_products_seen: lead.sequence_len(LeadField::ProductsSeen) as i64,
        days_since_created: days_since_created(lead, now),
        p_id_personal_loan: personal_loan,
        p_id_credit_card: credit_card,
        p_id_home_loan: home_loan,
        p_id_other: other,
    }
}

/// Extracts one row per lead, in input order, using the wall clock once.
pub fn extract_batch(leads: &[Lead]) -> FeatureMatrix {
    extract_batch_at(leads, Utc::now())
}

/// Extracts one row per lead relative to a fixed reference time.
pub fn extract_batch_at(leads: &[Lead], now: DateTime<Utc>) -> FeatureMatrix {
    let rows = leads
        .iter()
        .map(|lead| extract_at(lead, now).to_array())
        .collect();
    FeatureMatrix { rows }
}

fn days_since_created(lead: &Lead, now: DateTime<Utc>) -> i64 {
    lead.field(LeadField::CreatedAt)
        .and_then(parse_timestamp)
        .map(|created| ((now - created).num_milliseconds() / MILLIS_PER_DAY).max(0))
        .unwrap_or(0)
}

/// Parses a creation timestamp into UTC.
///
/// Accepts RFC 3339, RFC 2822, naive date-times and dates (taken as UTC),
/// integer epoch milliseconds and Mongo extended JSON `{"$date": ...}`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(map) => match map.get("$date") {
            Some(Value::Object(inner)) => inner
                .get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            Some(inner) => parse_timestamp(inner),
            None => None,
        },
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
