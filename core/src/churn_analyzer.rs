//! Churn analyzer: weighted health score and risk tier per client.
//!
//! For each client:
//!   1. Fingerprints the scoring-relevant fields (order independent)
//!   2. Returns the cached Analysis on a fingerprint hit
//!   3. Otherwise computes health metrics, combines them with the
//!      configured weights (summing to 1) and maps the score to a tier
//!   4. Stores the result in the ScoreCache
//!
//! Total over well-formed clients. A client without an id is a caller
//! contract violation and is rejected before any work is done.

use crate::{
    client::Client,
    clock::Clock,
    config::{ScoringConfig, TierThresholds},
    error::{RetentionError, RetentionResult},
    health_metrics::{HealthMetrics, HealthMetricsCalculator, MetricsSource},
    score_cache::ScoreCache,
    types::ClientId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fmt, sync::Arc};

// ── Public types ─────────────────────────────────────────────────────────────

/// Ordered worst to best, so `Critical < AtRisk < Watch < Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Critical,
    AtRisk,
    Watch,
    Healthy,
}

impl RiskTier {
    /// Exhaustive over every f64: scores below `at_risk` (and NaN) are critical.
    pub fn from_score(score: f64, t: &TierThresholds) -> Self {
        if score >= t.healthy {
            Self::Healthy
        } else if score >= t.watch {
            Self::Watch
        } else if score >= t.at_risk {
            Self::AtRisk
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::AtRisk   => "at_risk",
            Self::Watch    => "watch",
            Self::Healthy  => "healthy",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Recency,
    Frequency,
    Consumption,
    Monetary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub metric:       Metric,
    pub score:        f64,
    pub weight:       f64,
    /// score × weight; the contributions sum to the health score.
    pub contribution: f64,
}

/// Hex SHA-256 over the canonicalized scoring inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub client_id:            ClientId,
    pub health_score:         f64,
    pub risk_tier:            RiskTier,
    /// Fixed metric order: recency, frequency, consumption, monetary.
    pub contributing_factors: Vec<FactorContribution>,
    pub metrics:              HealthMetrics,
    /// Evaluation date every "days since" was measured against.
    pub as_of:                NaiveDate,
    pub computed_at:          DateTime<Utc>,
    pub fingerprint:          Fingerprint,
}

impl Analysis {
    /// The metric with the lowest raw score, i.e. what drags health down most.
    pub fn weakest_factor(&self) -> Option<&FactorContribution> {
        self.contributing_factors
            .iter()
            .min_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
    }
}

// ── Fingerprint ──────────────────────────────────────────────────────────────

/// Stable hash over every field the score depends on, plus the evaluation
/// date. Keys go through a BTreeMap so declaration order never matters.
pub fn fingerprint(client: &Client, as_of: NaiveDate) -> Fingerprint {
    let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
    fields.insert("id", json!(client.id));
    fields.insert("remainingSessions", json!(client.remaining_sessions));
    fields.insert("expireDate", json!(client.expire_date));
    fields.insert("lastVisit", json!(client.last_visit));
    fields.insert("visitCount", json!(client.visit_count));
    fields.insert("totalSpend", json!(client.total_spend));
    fields.insert("status", json!(client.status));
    fields.insert("membershipType", json!(client.membership_type));
    fields.insert("createdAt", json!(client.created_at.to_rfc3339()));
    fields.insert("updatedAt", json!(client.updated_at.to_rfc3339()));
    fields.insert("asOf", json!(as_of));

    let mut hasher = Sha256::new();
    for (key, value) in &fields {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b";");
    }
    Fingerprint(hex::encode(hasher.finalize()))
}

// ── Analyzer ─────────────────────────────────────────────────────────────────

pub struct ChurnAnalyzer<M: MetricsSource = HealthMetricsCalculator> {
    metrics: M,
    config:  ScoringConfig,
    cache:   Arc<ScoreCache>,
    clock:   Arc<dyn Clock>,
}

impl ChurnAnalyzer<HealthMetricsCalculator> {
    pub fn new(config: ScoringConfig, cache: Arc<ScoreCache>, clock: Arc<dyn Clock>) -> Self {
        let metrics = HealthMetricsCalculator::new(config.clone());
        Self::with_metrics(metrics, config, cache, clock)
    }
}

impl<M: MetricsSource> ChurnAnalyzer<M> {
    pub fn with_metrics(
        metrics: M,
        config: ScoringConfig,
        cache: Arc<ScoreCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { metrics, config, cache, clock }
    }

    pub fn cache(&self) -> &Arc<ScoreCache> {
        &self.cache
    }

    pub fn metrics_source(&self) -> &M {
        &self.metrics
    }

    /// Cached analysis of `client` as of the clock's current date.
    pub fn analyze(&self, client: &Client) -> RetentionResult<Analysis> {
        if client.id.trim().is_empty() {
            return Err(RetentionError::MissingClientId);
        }
        let as_of = self.clock.today();
        let fingerprint = fingerprint(client, as_of);

        Ok(self.cache.get_or_compute(&fingerprint, &client.id, || {
            self.compute(client, as_of, fingerprint.clone())
        }))
    }

    /// Uncached computation. Pure apart from the `computed_at` stamp.
    fn compute(&self, client: &Client, as_of: NaiveDate, fingerprint: Fingerprint) -> Analysis {
        let metrics = self.metrics.calculate(client, as_of);
        let w = &self.config.weights;

        let contributing_factors: Vec<FactorContribution> = [
            (Metric::Recency,     metrics.recency_score,    w.recency),
            (Metric::Frequency,   metrics.frequency_score,  w.frequency),
            (Metric::Consumption, metrics.consumption_rate, w.consumption),
            (Metric::Monetary,    metrics.monetary_score,   w.monetary),
        ]
        .into_iter()
        .map(|(metric, score, weight)| FactorContribution {
            metric,
            score,
            weight,
            contribution: score * weight,
        })
        .collect();

        let raw: f64 = contributing_factors.iter().map(|f| f.contribution).sum();
        let health_score = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 100.0) };
        let risk_tier = RiskTier::from_score(health_score, &self.config.tiers);

        log::debug!(
            "churn: client={} score={health_score:.1} tier={risk_tier} as_of={as_of}",
            client.id,
        );

        Analysis {
            client_id: client.id.clone(),
            health_score,
            risk_tier,
            contributing_factors,
            metrics,
            as_of,
            computed_at: self.clock.now(),
            fingerprint,
        }
    }
}
