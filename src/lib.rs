//! Lead Scoring Library
//!
//! Turns semi-structured lead records into a fixed numeric feature vector,
//! derives training targets (recorded conversion labels or a rule-based
//! proxy score), trains a gradient-boosted tree classifier and scores new
//! leads with it. The same extractor feeds training and inference so their
//! feature vectors cannot drift apart.
//!
//! # Modules
//!
//! - `api`: HTTP route table.
//! - `core`: Domain-layer namespace (features, scoring, training).
//! - `obs`: Observability and logging.
//! - `config`: Configuration management.
//! - `dataset`: Target selection, dataset assembly and splitting.
//! - `db`: Postgres lead store.
//! - `errors`: Error handling types.
//! - `features`: Feature schema and extraction.
//! - `gbdt`: Gradient-boosted decision trees.
//! - `handlers`: HTTP request handlers.
//! - `labels`: Conversion label normalization.
//! - `lead`: Lead record access with dual key conventions.
//! - `metrics`: Evaluation metrics.
//! - `model`: Model artifacts and inference.
//! - `models`: API payload and response models.
//! - `scoring`: Rule-based proxy score.
//! - `sources`: CSV and JSON lead files.

pub mod api;
pub mod core;
pub mod obs;

pub mod config;
pub mod dataset;
pub mod db;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod handlers;
pub mod labels;
pub mod lead;
pub mod metrics;
pub mod model;
pub mod models;
pub mod scoring;
pub mod sources;
