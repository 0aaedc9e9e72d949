//! File-based lead sources.
//!
//! CSV exports use flat column names; they are mapped onto the document keys
//! the extractor reads so a CSV lead and a stored lead produce identical
//! features.

use serde_json::{Map, Number, Value};
use std::path::Path;

use crate::errors::{AppError, ResultExt};
use crate::lead::Lead;

/// Canonical key for a known CSV column. Unknown columns keep their header.
fn canonical_column(header: &str) -> &str {
    match header {
        "email" => "email",
        "phone" | "phone_number" | "phoneNumber" => "phoneNumber",
        "aadhar" | "aadhar_number" | "aadharNumber" => "aadharNumber",
        "name" => "name",
        "p_id" | "pId" | "product_id" => "pId",
        "source_id" | "sourceId" => "sourceId",
        "created_at" | "createdAt" => "createdAt",
        "lead_score" | "leadScore" => "leadScore",
        "sources_seen" | "sourcesSeen" => "sourcesSeen",
        "products_seen" | "productsSeen" => "productsSeen",
        other => other,
    }
}

/// Empty cells are null, integers and finite decimals become numbers and
/// everything else stays text.
fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(float).filter(|_| float.is_finite()) {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}

/// Reads leads from any CSV reader with a header row.
pub fn read_leads_csv<R: std::io::Read>(reader: R) -> Result<Vec<Lead>, AppError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| canonical_column(header).to_string())
        .collect();

    let mut leads = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut map = Map::new();
        for (key, cell) in headers.iter().zip(record.iter()) {
            map.insert(key.clone(), parse_cell(cell));
        }
        leads.push(Lead::new(map));
    }
    Ok(leads)
}

pub fn load_leads_from_csv(path: &Path) -> Result<Vec<Lead>, AppError> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;
    let leads = read_leads_csv(file).with_context(|| format!("reading CSV {}", path.display()))?;
    tracing::info!("Loaded {} leads from {}", leads.len(), path.display());
    Ok(leads)
}

/// Reads a JSON file holding one lead object or an array of lead objects.
pub fn load_leads_from_json(path: &Path) -> Result<Vec<Lead>, AppError> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing JSON {}", path.display()))?;
    leads_from_json_value(value)
}

pub fn leads_from_json_value(value: Value) -> Result<Vec<Lead>, AppError> {
    match value {
        Value::Object(map) => Ok(vec![Lead::new(map)]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(map) => Ok(Lead::new(map)),
                _ => Err(AppError::BadRequest(format!(
                    "lead at index {} is not a JSON object",
                    idx
                ))),
            })
            .collect(),
        _ => Err(AppError::BadRequest(
            "input must be a JSON object or an array of objects".to_string(),
        )),
    }
}
