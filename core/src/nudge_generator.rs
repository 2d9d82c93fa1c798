//! Nudge generator: deterministic retention recommendations.
//!
//! Each rule sees only (analysis, client, config), fires at most once and
//! never observes another rule's outcome. Output is sorted by descending
//! priority; ties keep rule declaration order. Nothing here sends anything.

use crate::{
    churn_analyzer::{Analysis, RiskTier},
    client::{Client, ClientStatus, Sessions},
    config::NudgeConfig,
    types::{ClientId, RuleId},
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeCategory {
    SessionRenewal,
    MembershipRenewal,
    ReEngagement,
    CheckIn,
    WinBack,
    Referral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgePriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Nudge {
    pub client_id:    ClientId,
    pub category:     NudgeCategory,
    pub message:      String,
    pub priority:     NudgePriority,
    pub triggered_by: RuleId,
}

struct RuleContext<'a> {
    analysis: &'a Analysis,
    client:   &'a Client,
    config:   &'a NudgeConfig,
    name:     String,
}

struct Firing {
    category: NudgeCategory,
    priority: NudgePriority,
    message:  String,
}

struct NudgeRule {
    id:       RuleId,
    evaluate: fn(&RuleContext<'_>) -> Option<Firing>,
}

/// Declaration order is the tie-break order. Append new rules; do not reorder.
const RULES: &[NudgeRule] = &[
    NudgeRule { id: "sessions_nearly_exhausted", evaluate: sessions_nearly_exhausted },
    NudgeRule { id: "membership_expiring",       evaluate: membership_expiring },
    NudgeRule { id: "membership_expired",        evaluate: membership_expired },
    NudgeRule { id: "no_recent_visit",           evaluate: no_recent_visit },
    NudgeRule { id: "critical_health",           evaluate: critical_health },
    NudgeRule { id: "declining_health",          evaluate: declining_health },
    NudgeRule { id: "cancelled_win_back",        evaluate: cancelled_win_back },
    NudgeRule { id: "high_value_referral",       evaluate: high_value_referral },
];

pub struct NudgeGenerator {
    config: NudgeConfig,
}

impl NudgeGenerator {
    pub fn new(config: NudgeConfig) -> Self {
        Self { config }
    }

    /// Identifiers of every rule, in declaration order.
    pub fn rule_ids() -> impl Iterator<Item = RuleId> {
        RULES.iter().map(|r| r.id)
    }

    pub fn generate(&self, analysis: &Analysis, client: &Client) -> Vec<Nudge> {
        let ctx = RuleContext {
            analysis,
            client,
            config: &self.config,
            name: client.display_name(),
        };

        let mut nudges: Vec<Nudge> = RULES
            .iter()
            .filter_map(|rule| {
                (rule.evaluate)(&ctx).map(|firing| Nudge {
                    client_id:    client.id.clone(),
                    category:     firing.category,
                    message:      firing.message,
                    priority:     firing.priority,
                    triggered_by: rule.id,
                })
            })
            .collect();

        // Stable: equal priorities keep declaration order.
        nudges.sort_by(|a, b| b.priority.cmp(&a.priority));

        log::debug!("nudge: client={} fired={}", client.id, nudges.len());
        nudges
    }
}

// ── Rules ────────────────────────────────────────────────────────────────────

fn is_ongoing(status: ClientStatus) -> bool {
    matches!(status, ClientStatus::Active | ClientStatus::AtRisk)
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn sessions_nearly_exhausted(ctx: &RuleContext<'_>) -> Option<Firing> {
    let Sessions::Count(left) = ctx.client.remaining_sessions else {
        return None;
    };
    if !is_ongoing(ctx.client.status) || left > ctx.config.low_sessions_threshold {
        return None;
    }
    let plan = ctx.client.membership_type.as_deref().unwrap_or("their package");
    Some(Firing {
        category: NudgeCategory::SessionRenewal,
        priority: if left == 0 { NudgePriority::Urgent } else { NudgePriority::High },
        message:  format!(
            "{} has {} left on {plan}. Offer a renewal pack.",
            ctx.name,
            plural(left as i64, "session"),
        ),
    })
}

fn membership_expiring(ctx: &RuleContext<'_>) -> Option<Firing> {
    let days = ctx.client.days_until_expiry(ctx.analysis.as_of)?;
    if !is_ongoing(ctx.client.status) || !(0..=ctx.config.expiry_window_days).contains(&days) {
        return None;
    }
    Some(Firing {
        category: NudgeCategory::MembershipRenewal,
        priority: if days <= 3 { NudgePriority::Urgent } else { NudgePriority::High },
        message:  format!(
            "{}'s membership expires in {}. Reach out about renewing.",
            ctx.name,
            plural(days, "day"),
        ),
    })
}

fn membership_expired(ctx: &RuleContext<'_>) -> Option<Firing> {
    let days = ctx.client.days_until_expiry(ctx.analysis.as_of)?;
    if !is_ongoing(ctx.client.status) || days >= 0 {
        return None;
    }
    Some(Firing {
        category: NudgeCategory::MembershipRenewal,
        priority: NudgePriority::High,
        message:  format!(
            "{}'s membership lapsed {} ago but they are still marked {}. Confirm renewal.",
            ctx.name,
            plural(-days, "day"),
            ctx.client.status,
        ),
    })
}

fn no_recent_visit(ctx: &RuleContext<'_>) -> Option<Firing> {
    if ctx.client.status != ClientStatus::Active {
        return None;
    }
    let as_of = ctx.analysis.as_of;
    let message = match ctx.client.days_since_last_visit(as_of) {
        Some(days) if days >= ctx.config.inactivity_days => {
            format!("{} has not visited in {}. Send a check-in.", ctx.name, plural(days, "day"))
        }
        Some(_) => return None,
        None => {
            let age = (as_of - ctx.client.created_at.date_naive()).num_days();
            if age < ctx.config.inactivity_days {
                return None;
            }
            format!("{} joined {} ago and has never visited. Book a first session.", ctx.name, plural(age, "day"))
        }
    };
    Some(Firing {
        category: NudgeCategory::ReEngagement,
        priority: NudgePriority::Medium,
        message,
    })
}

fn critical_health(ctx: &RuleContext<'_>) -> Option<Firing> {
    if ctx.analysis.risk_tier != RiskTier::Critical || ctx.client.status == ClientStatus::Cancelled {
        return None;
    }
    Some(Firing {
        category: NudgeCategory::WinBack,
        priority: NudgePriority::Urgent,
        message:  format!(
            "{} is at critical churn risk (health {:.0}). Call personally this week.",
            ctx.name, ctx.analysis.health_score,
        ),
    })
}

fn declining_health(ctx: &RuleContext<'_>) -> Option<Firing> {
    if ctx.analysis.risk_tier != RiskTier::AtRisk || ctx.client.status == ClientStatus::Cancelled {
        return None;
    }
    let weakest = ctx
        .analysis
        .weakest_factor()
        .map(|f| format!("{:?}", f.metric).to_lowercase())
        .unwrap_or_else(|| "engagement".into());
    Some(Firing {
        category: NudgeCategory::CheckIn,
        priority: NudgePriority::High,
        message:  format!(
            "{}'s health dropped to {:.0}, driven by low {weakest}. Schedule a check-in.",
            ctx.name, ctx.analysis.health_score,
        ),
    })
}

fn cancelled_win_back(ctx: &RuleContext<'_>) -> Option<Firing> {
    if ctx.client.status != ClientStatus::Cancelled {
        return None;
    }
    Some(Firing {
        category: NudgeCategory::WinBack,
        priority: NudgePriority::Low,
        message:  format!("{} cancelled. Send a come-back offer.", ctx.name),
    })
}

fn high_value_referral(ctx: &RuleContext<'_>) -> Option<Firing> {
    if ctx.analysis.risk_tier != RiskTier::Healthy
        || ctx.analysis.metrics.monetary_score < ctx.config.high_value_monetary
    {
        return None;
    }
    Some(Firing {
        category: NudgeCategory::Referral,
        priority: NudgePriority::Low,
        message:  format!("{} is a healthy, high-value client. Ask for a referral.", ctx.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_ids_are_unique() {
        let ids: Vec<_> = NudgeGenerator::rule_ids().collect();
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "day"), "1 day");
        assert_eq!(plural(0, "session"), "0 sessions");
        assert_eq!(plural(3, "day"), "3 days");
    }
}
