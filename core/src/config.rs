use crate::error::{RetentionError, RetentionResult};
use serde::{Deserialize, Serialize};

// ── Scoring model ──────────────────────────────────────────────────

/// Weight of each sub-metric in the composite health score. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub recency:     f64,
    pub frequency:   f64,
    pub consumption: f64,
    pub monetary:    f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            recency:     0.35,
            frequency:   0.25,
            consumption: 0.20,
            monetary:    0.20,
        }
    }
}

impl MetricWeights {
    pub fn sum(&self) -> f64 {
        self.recency + self.frequency + self.consumption + self.monetary
    }
}

/// Lower bounds (inclusive) of each tier. Anything below `at_risk` is critical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub healthy: f64,
    pub watch:   f64,
    pub at_risk: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            healthy: 75.0,
            watch:   50.0,
            at_risk: 25.0,
        }
    }
}

/// Multiplier applied to the ongoing-engagement metrics (recency,
/// frequency, consumption) per client status. Monetary is historical
/// and is never discounted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusFactors {
    pub active:    f64,
    pub at_risk:   f64,
    pub inactive:  f64,
    pub cancelled: f64,
}

impl Default for StatusFactors {
    fn default() -> Self {
        Self {
            active:    1.0,
            at_risk:   1.0,
            inactive:  0.5,
            cancelled: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights:                    MetricWeights,
    pub tiers:                      TierThresholds,
    /// Days after which the recency score halves.
    pub recency_half_life_days:     f64,
    /// Visits per 30 days that earn a full frequency score.
    pub target_visits_per_month:    f64,
    /// Account age floor so brand-new accounts are not over-rewarded.
    pub min_account_age_days:       i64,
    /// Spend at which the monetary curve reaches 100.
    pub monetary_saturation:        f64,
    /// Consumption score when nothing has been allotted or used yet.
    pub neutral_consumption:        f64,
    /// Consumption score for Unlimited memberships.
    pub unlimited_consumption:      f64,
    pub status_factors:             StatusFactors,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights:                 MetricWeights::default(),
            tiers:                   TierThresholds::default(),
            recency_half_life_days:  21.0,
            target_visits_per_month: 8.0,
            min_account_age_days:    30,
            monetary_saturation:     5_000.0,
            neutral_consumption:     50.0,
            unlimited_consumption:   100.0,
            status_factors:          StatusFactors::default(),
        }
    }
}

// ── Import ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Read ambiguous `03/04/2024` as 3 April instead of 4 March.
    pub prefer_day_first:    bool,
    /// Dates outside this year window are implausible and dropped.
    pub min_plausible_year:  i32,
    pub max_plausible_year:  i32,
    /// Numeric session values that legacy exports use to mean "unlimited".
    /// Each must be negative or at least `MIN_POSITIVE_SENTINEL`.
    pub unlimited_sentinels: Vec<i64>,
    /// Batches at or above this size are split across worker threads.
    pub parallel_threshold:  usize,
}

/// Smallest positive session value allowed to mean "unlimited". Anything
/// lower is a real pack size.
pub const MIN_POSITIVE_SENTINEL: i64 = 9_999;

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            prefer_day_first:    false,
            min_plausible_year:  1990,
            max_plausible_year:  2100,
            unlimited_sentinels: vec![-1, 9999],
            parallel_threshold:  256,
        }
    }
}

// ── Nudges ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    /// Remaining sessions at or below this fire the low-sessions rule.
    pub low_sessions_threshold: u32,
    /// Memberships expiring within this many days fire the renewal rule.
    pub expiry_window_days:     i64,
    /// Active clients without a visit for this long fire the re-engagement rule.
    pub inactivity_days:        i64,
    /// Monetary score at or above which a healthy client is high value.
    pub high_value_monetary:    f64,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            low_sessions_threshold: 2,
            expiry_window_days:     14,
            inactivity_days:        21,
            high_value_monetary:    80.0,
        }
    }
}

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub scoring: ScoringConfig,
    pub import:  ImportConfig,
    pub nudges:  NudgeConfig,
}

impl RetentionConfig {
    /// Load from the data/ directory.
    /// In tests, use RetentionConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/retention/retention_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: RetentionConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RetentionResult<()> {
        let s = &self.scoring;
        let w = &s.weights;

        for (name, value) in [
            ("recency", w.recency),
            ("frequency", w.frequency),
            ("consumption", w.consumption),
            ("monetary", w.monetary),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("weight '{name}'={value} outside [0,1]")));
            }
        }
        if (w.sum() - 1.0).abs() > 1e-6 {
            return Err(invalid(format!("metric weights sum to {}, expected 1", w.sum())));
        }

        let t = &s.tiers;
        if !(0.0 < t.at_risk && t.at_risk < t.watch && t.watch < t.healthy && t.healthy <= 100.0) {
            return Err(invalid(format!(
                "tier thresholds must satisfy 0 < at_risk < watch < healthy <= 100 (got {}/{}/{})",
                t.at_risk, t.watch, t.healthy,
            )));
        }

        if s.recency_half_life_days <= 0.0
            || s.target_visits_per_month <= 0.0
            || s.monetary_saturation <= 0.0
            || s.min_account_age_days < 1
        {
            return Err(invalid("scoring curve parameters must be positive".into()));
        }

        for value in [s.neutral_consumption, s.unlimited_consumption] {
            if !(0.0..=100.0).contains(&value) {
                return Err(invalid(format!("consumption constant {value} outside [0,100]")));
            }
        }

        let f = &s.status_factors;
        for value in [f.active, f.at_risk, f.inactive, f.cancelled] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("status factor {value} outside [0,1]")));
            }
        }

        if self.import.min_plausible_year >= self.import.max_plausible_year {
            return Err(invalid("plausible year window is empty".into()));
        }

        if let Some(bad) = self
            .import
            .unlimited_sentinels
            .iter()
            .find(|&&v| (0..MIN_POSITIVE_SENTINEL).contains(&v))
        {
            return Err(invalid(format!(
                "unlimited sentinel {bad} collides with real session counts \
                 (use a negative value or >= {MIN_POSITIVE_SENTINEL})"
            )));
        }

        Ok(())
    }
}

fn invalid(reason: String) -> RetentionError {
    RetentionError::InvalidConfig { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RetentionConfig::default().validate().unwrap();
        assert!((MetricWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut config = RetentionConfig::default();
        config.scoring.weights.monetary = 0.5;
        assert!(matches!(config.validate(), Err(RetentionError::InvalidConfig { .. })));
    }

    #[test]
    fn rejects_unordered_tiers() {
        let mut config = RetentionConfig::default();
        config.scoring.tiers.watch = 80.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RetentionConfig =
            serde_json::from_str(r#"{ "nudges": { "inactivity_days": 30 } }"#).unwrap();
        assert_eq!(config.nudges.inactivity_days, 30);
        assert_eq!(config.nudges.expiry_window_days, 14);
        assert_eq!(config.scoring, ScoringConfig::default());
    }

    #[test]
    fn rejects_sentinels_that_look_like_counts() {
        let mut config = RetentionConfig::default();
        config.import.unlimited_sentinels = vec![-1, 5];
        assert!(matches!(config.validate(), Err(RetentionError::InvalidConfig { .. })));

        config.import.unlimited_sentinels = vec![0];
        assert!(config.validate().is_err());

        config.import.unlimited_sentinels = vec![-99, 99_999];
        config.validate().unwrap();
    }

    #[test]
    fn partial_tiers_fall_back_to_defaults() {
        let config: RetentionConfig =
            serde_json::from_str(r#"{ "scoring": { "tiers": { "healthy": 80 } } }"#).unwrap();
        assert_eq!(config.scoring.tiers.healthy, 80.0);
        assert_eq!(config.scoring.tiers.watch, 50.0);
        assert_eq!(config.scoring.tiers.at_risk, 25.0);
        config.validate().unwrap();

        let config: RetentionConfig =
            serde_json::from_str(r#"{ "scoring": { "status_factors": { "inactive": 0.25 } } }"#).unwrap();
        assert_eq!(config.scoring.status_factors.inactive, 0.25);
        assert_eq!(config.scoring.status_factors.active, 1.0);
    }

    #[test]
    fn load_reads_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("retention")).unwrap();
        std::fs::write(
            dir.path().join("retention/retention_config.json"),
            r#"{ "scoring": { "tiers": { "healthy": 80, "watch": 55, "at_risk": 30 } } }"#,
        )
        .unwrap();

        let config = RetentionConfig::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.scoring.tiers.healthy, 80.0);
    }
}
