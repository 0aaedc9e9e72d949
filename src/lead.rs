//! Open-ended lead records and dual-convention field access.
//!
//! Upstream producers disagree on naming: store documents use camelCase
//! (`phoneNumber`), tabular exports use snake_case (`phone_number`). Every
//! read of a lead field goes through [`Lead::field`], which probes the
//! candidate keys in priority order and returns the first present non-null
//! value. Values from different keys are never merged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A lead field the scoring pipeline knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadField {
    Email,
    PhoneNumber,
    AadharNumber,
    Name,
    SourcesSeen,
    ProductsSeen,
    CreatedAt,
    ProductId,
    LeadId,
}

impl LeadField {
    /// Candidate keys in lookup priority order.
    pub const fn keys(self) -> &'static [&'static str] {
        match self {
            LeadField::Email => &["email"],
            LeadField::PhoneNumber => &["phoneNumber", "phone_number"],
            LeadField::AadharNumber => &["aadharNumber", "aadhar_number"],
            LeadField::Name => &["name"],
            LeadField::SourcesSeen => &["sourcesSeen", "sources_seen"],
            LeadField::ProductsSeen => &["productsSeen", "products_seen"],
            LeadField::CreatedAt => &["createdAt", "created_at"],
            LeadField::ProductId => &["pId", "p_id"],
            LeadField::LeadId => &["leadId", "lead_id"],
        }
    }
}

/// One prospective customer record, kept as a generic JSON map.
///
/// Only the keys named by [`LeadField`] (and an optional target column) are
/// ever inspected; everything else passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lead(Map<String, Value>);

impl Lead {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builds a lead from any JSON value. Non-object values yield an empty lead.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// First present, non-null value among `keys`.
    pub fn get_first(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| !value.is_null())
    }

    /// Dual-convention lookup of a known field.
    pub fn field(&self, field: LeadField) -> Option<&Value> {
        self.get_first(field.keys())
    }

    /// Whether `field` holds a non-empty value. See [`is_present`].
    pub fn has(&self, field: LeadField) -> bool {
        self.field(field).is_some_and(is_present)
    }

    /// Length of `field` when it is a JSON array, 0 for any other shape.
    pub fn sequence_len(&self, field: LeadField) -> usize {
        match self.field(field) {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    /// Number of distinct elements of `field` when it is a JSON array.
    pub fn distinct_len(&self, field: LeadField) -> usize {
        match self.field(field) {
            Some(Value::Array(items)) => items
                .iter()
                .map(Value::to_string)
                .collect::<HashSet<_>>()
                .len(),
            _ => 0,
        }
    }

    /// Textual value of `field`: strings as-is, numbers and booleans rendered.
    pub fn text(&self, field: LeadField) -> Option<String> {
        self.field(field).and_then(scalar_text)
    }
}

impl From<Map<String, Value>> for Lead {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Presence rule shared by the feature extractor and the proxy scorer.
///
/// Null is absent. Strings count when non-empty after trimming. Any other
/// value has a non-empty textual rendering and therefore counts.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
