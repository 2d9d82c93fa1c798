//! Health sub-metrics: bounded, pure functions of a client snapshot.
//!
//! Every score lies in [0,100]:
//!   recency     = 100 × 0.5^(days_since_visit / half_life)     (no visit → 0)
//!   frequency   = 100 × min(1, visits_per_30d / target)
//!   consumption = 100 × used / (used + remaining)              (Unlimited → constant)
//!   monetary    = 100 × min(1, ln(1 + spend) / ln(1 + saturation))
//!
//! Recency, frequency and consumption describe ongoing engagement and are
//! scaled by the client's status factor (cancelled → 0). Monetary is history.

use crate::{
    client::{Client, ClientStatus, Sessions},
    config::ScoringConfig,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub recency_score:    f64,
    pub frequency_score:  f64,
    pub consumption_rate: f64,
    pub monetary_score:   f64,
}

/// Anything that turns a client into health metrics. The churn analyzer
/// is generic over this so callers can observe or replace the computation.
pub trait MetricsSource: Send + Sync {
    fn calculate(&self, client: &Client, as_of: NaiveDate) -> HealthMetrics;
}

pub struct HealthMetricsCalculator {
    config: ScoringConfig,
}

impl HealthMetricsCalculator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn calculate_health_metrics(&self, client: &Client, as_of: NaiveDate) -> HealthMetrics {
        let engagement = self.status_factor(client.status);

        HealthMetrics {
            recency_score:    bound(self.recency(client, as_of) * engagement),
            frequency_score:  bound(self.frequency(client, as_of) * engagement),
            consumption_rate: bound(self.consumption(client) * engagement),
            monetary_score:   bound(self.monetary(client)),
        }
    }

    fn status_factor(&self, status: ClientStatus) -> f64 {
        let f = &self.config.status_factors;
        match status {
            ClientStatus::Active    => f.active,
            ClientStatus::AtRisk    => f.at_risk,
            ClientStatus::Inactive  => f.inactive,
            ClientStatus::Cancelled => f.cancelled,
        }
    }

    fn recency(&self, client: &Client, as_of: NaiveDate) -> f64 {
        match client.days_since_last_visit(as_of) {
            None => 0.0,
            Some(days) => 100.0 * 0.5_f64.powf(days as f64 / self.config.recency_half_life_days),
        }
    }

    fn frequency(&self, client: &Client, as_of: NaiveDate) -> f64 {
        let age_days = (as_of - client.created_at.date_naive())
            .num_days()
            .max(self.config.min_account_age_days);
        let visits_per_month = client.visit_count as f64 * 30.0 / age_days as f64;
        100.0 * (visits_per_month / self.config.target_visits_per_month).min(1.0)
    }

    fn consumption(&self, client: &Client) -> f64 {
        match client.remaining_sessions {
            Sessions::Unlimited => self.config.unlimited_consumption,
            Sessions::Count(remaining) => {
                let used = client.visit_count as f64;
                let allotted = used + remaining as f64;
                if allotted <= 0.0 {
                    self.config.neutral_consumption
                } else {
                    100.0 * used / allotted
                }
            }
        }
    }

    fn monetary(&self, client: &Client) -> f64 {
        let spend = client.total_spend.max(0.0);
        100.0 * ((1.0 + spend).ln() / (1.0 + self.config.monetary_saturation).ln()).min(1.0)
    }
}

impl MetricsSource for HealthMetricsCalculator {
    fn calculate(&self, client: &Client, as_of: NaiveDate) -> HealthMetrics {
        self.calculate_health_metrics(client, as_of)
    }
}

/// Clamp to [0,100]; NaN collapses to 0.
fn bound(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn client() -> Client {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut c = Client::new("c-1", created);
        c.visit_count = 40;
        c.remaining_sessions = Sessions::Count(10);
        c.total_spend = 1_200.0;
        c.last_visit = Some(as_of() - Duration::days(3));
        c
    }

    fn calc() -> HealthMetricsCalculator {
        HealthMetricsCalculator::new(ScoringConfig::default())
    }

    #[test]
    fn recency_decreases_with_days_since_visit() {
        let calc = calc();
        let mut c = client();
        let mut previous = f64::INFINITY;
        for days in [0, 1, 7, 21, 60, 365, 5_000] {
            c.last_visit = Some(as_of() - Duration::days(days));
            let score = calc.calculate_health_metrics(&c, as_of()).recency_score;
            assert!(score <= previous, "recency must not increase: {days}d -> {score}");
            previous = score;
        }
        c.last_visit = Some(as_of());
        assert_eq!(calc.calculate_health_metrics(&c, as_of()).recency_score, 100.0);
    }

    #[test]
    fn no_visit_scores_lowest_recency() {
        let mut c = client();
        c.last_visit = None;
        assert_eq!(calc().calculate_health_metrics(&c, as_of()).recency_score, 0.0);
    }

    #[test]
    fn unlimited_sessions_get_constant_consumption() {
        let calc = calc();
        let mut c = client();
        c.remaining_sessions = Sessions::Unlimited;
        let a = calc.calculate_health_metrics(&c, as_of()).consumption_rate;
        c.visit_count = 0;
        let b = calc.calculate_health_metrics(&c, as_of()).consumption_rate;
        assert_eq!(a, 100.0);
        assert_eq!(a, b);
    }

    #[test]
    fn consumption_is_used_over_allotted() {
        let m = calc().calculate_health_metrics(&client(), as_of());
        assert!((m.consumption_rate - 80.0).abs() < 1e-9, "40 used of 50 -> 80, got {}", m.consumption_rate);
    }

    #[test]
    fn empty_history_consumption_is_neutral() {
        let mut c = client();
        c.visit_count = 0;
        c.remaining_sessions = Sessions::Count(0);
        assert_eq!(calc().calculate_health_metrics(&c, as_of()).consumption_rate, 50.0);
    }

    #[test]
    fn monetary_has_diminishing_returns_and_caps() {
        let calc = calc();
        let mut c = client();
        let score = |c: &Client| calc.calculate_health_metrics(c, as_of()).monetary_score;

        c.total_spend = 100.0;
        let s100 = score(&c);
        c.total_spend = 200.0;
        let s200 = score(&c);
        c.total_spend = 300.0;
        let s300 = score(&c);
        assert!(s200 - s100 > s300 - s200);

        c.total_spend = 1e12;
        assert_eq!(score(&c), 100.0);
        c.total_spend = 0.0;
        assert_eq!(score(&c), 0.0);
    }

    #[test]
    fn cancelled_status_zeroes_engagement() {
        let mut c = client();
        c.status = ClientStatus::Cancelled;
        let m = calc().calculate_health_metrics(&c, as_of());
        assert_eq!(m.recency_score, 0.0);
        assert_eq!(m.frequency_score, 0.0);
        assert_eq!(m.consumption_rate, 0.0);
        assert!(m.monetary_score > 0.0, "spend history survives cancellation");
    }

    #[test]
    fn inactive_status_discounts_engagement() {
        let calc = calc();
        let active = calc.calculate_health_metrics(&client(), as_of());
        let mut c = client();
        c.status = ClientStatus::Inactive;
        let inactive = calc.calculate_health_metrics(&c, as_of());
        assert!((inactive.recency_score - active.recency_score * 0.5).abs() < 1e-9);
        assert_eq!(inactive.monetary_score, active.monetary_score);
    }

    #[test]
    fn new_accounts_use_minimum_age() {
        let mut c = client();
        c.created_at = Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap();
        c.visit_count = 4;
        // One day old but measured over 30 days: 4 visits / 8 target.
        let m = calc().calculate_health_metrics(&c, as_of());
        assert!((m.frequency_score - 50.0).abs() < 1e-9);
    }
}
