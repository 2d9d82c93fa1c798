//! Client-data normalization and churn/health-risk scoring.
//!
//! Pipeline: raw import rows → canonical [`client::Client`] → health
//! metrics → cached [`churn_analyzer::Analysis`] → prioritized nudges.

pub mod churn_analyzer;
pub mod client;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod health_metrics;
pub mod import_normalizer;
pub mod nudge_generator;
pub mod repository;
pub mod sample_data;
pub mod score_cache;
pub mod store;
pub mod types;
