//! End-to-end: import into a repository, analyze, patch, summarize.

use chrono::NaiveDate;
use retention_core::{
    churn_analyzer::RiskTier,
    client::{ClientPatch, ClientStatus, Sessions},
    clock::{Clock, FixedClock},
    config::RetentionConfig,
    engine::RetentionEngine,
    error::RetentionError,
    repository::{ClientRepository, InMemoryClientRepository},
    sample_data::SampleGenerator,
    store::SqliteClientStore,
};
use serde_json::{json, Value};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::on(as_of()))
}

fn in_memory_engine() -> RetentionEngine<InMemoryClientRepository> {
    let _ = env_logger::builder().is_test(true).try_init();
    RetentionEngine::build(
        RetentionConfig::default(),
        InMemoryClientRepository::new(clock()),
        clock(),
    )
    .unwrap()
}

fn sqlite_engine() -> RetentionEngine<SqliteClientStore> {
    let store = SqliteClientStore::in_memory().unwrap().with_clock(clock());
    store.migrate().unwrap();
    RetentionEngine::build(RetentionConfig::default(), store, clock()).unwrap()
}

fn roster() -> Vec<Value> {
    vec![
        // Lapsed: a month since the last visit, no sessions left.
        json!({
            "Client ID": "c-lapsed",
            "name": "Abendroth, Jennifer",
            "Sessions Remaining": "0",
            "Total Visits": 10,
            "Last Visit": "05/02/2024",
            "Join Date": "2024-01-01",
            "Total Spend": "$0.00",
        }),
        // Loyal regular.
        json!({
            "Client ID": "c-loyal",
            "Full Name": "John Smith",
            "Sessions Remaining": "Unlimited",
            "Total Visits": 60,
            "Last Visit": "2024-05-31",
            "Join Date": "2024-01-01",
            "Total Spend": "$5,000",
        }),
        // Never visited.
        json!({
            "Client ID": "c-ghost",
            "first_name": "Priya",
            "lastName": "Patel",
            "Join Date": "2024-01-01",
        }),
        // No identity; rejected.
        json!({ "Notes": "walk-in" }),
    ]
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn import_inserts_successes_and_reports_failures() {
    let mut engine = in_memory_engine();
    let outcome = engine.import(&roster()).unwrap();

    assert_eq!(outcome.succeeded(), 3);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].index, 3);
    assert_eq!(engine.repository().len(), 3);

    let loyal = engine.repository().get_by_id("c-loyal").unwrap().unwrap();
    assert_eq!(loyal.remaining_sessions, Sessions::Unlimited);
    assert_eq!(loyal.total_spend, 5_000.0);
}

#[test]
fn analyze_by_id_and_missing_client() {
    let mut engine = in_memory_engine();
    engine.import(&roster()).unwrap();

    let row = engine.analyze_by_id("c-loyal").unwrap();
    assert_eq!(row.client.first_name, "John");
    assert_eq!(row.analysis.risk_tier, RiskTier::Healthy);
    assert_eq!(row.analysis.as_of, as_of());

    let err = engine.analyze_by_id("nobody").unwrap_err();
    assert!(matches!(err, RetentionError::ClientNotFound { ref id } if id == "nobody"));
}

#[test]
fn clients_by_health_lists_everyone_least_healthy_first() {
    let mut engine = in_memory_engine();
    engine.import(&roster()).unwrap();

    let rows = engine.clients_by_health().unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.client.id.as_str()).collect();
    assert_eq!(ids, vec!["c-ghost", "c-lapsed", "c-loyal"]);
    assert!(rows
        .windows(2)
        .all(|w| w[0].analysis.health_score <= w[1].analysis.health_score));
    assert_eq!(rows[0].analysis.risk_tier, RiskTier::Critical);
    assert_eq!(rows[1].analysis.risk_tier, RiskTier::AtRisk);
}

/// Healthy and watch clients are left out.
#[test]
fn at_risk_clients_only_lists_at_risk_and_critical() {
    let mut engine = in_memory_engine();
    engine.import(&roster()).unwrap();

    let rows = engine.at_risk_clients().unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.client.id.as_str()).collect();
    assert_eq!(ids, vec!["c-ghost", "c-lapsed"]);
    assert!(rows
        .iter()
        .all(|r| matches!(r.analysis.risk_tier, RiskTier::AtRisk | RiskTier::Critical)));
}

#[test]
fn duplicate_ids_in_one_import_keep_the_first() {
    let mut engine = in_memory_engine();
    let outcome = engine
        .import(&[
            json!({ "id": "c-dup", "name": "Ada Lovelace", "visits": 2 }),
            json!({ "id": "c-dup", "name": "Ada King", "visits": 40 }),
        ])
        .unwrap();

    assert_eq!(outcome.succeeded(), 1);
    assert_eq!(outcome.failures[0].index, 1);
    assert_eq!(engine.repository().len(), 1, "succeeded() matches what was stored");
    let stored = engine.repository().get_by_id("c-dup").unwrap().unwrap();
    assert_eq!(stored.last_name, "Lovelace");
    assert_eq!(stored.visit_count, 2);
}

#[test]
fn risk_summary_counts_every_client() {
    let mut engine = in_memory_engine();
    engine.import(&roster()).unwrap();

    let summary = engine.risk_summary().unwrap();
    assert_eq!(summary.client_count, 3);
    assert_eq!(summary.count(RiskTier::Critical), 1);
    assert_eq!(summary.count(RiskTier::AtRisk), 1);
    assert_eq!(summary.count(RiskTier::Healthy), 1);
    assert_eq!(summary.count(RiskTier::Watch), 0);
    assert!(summary.average_health_score > 0.0 && summary.average_health_score < 100.0);
}

#[test]
fn empty_repository_summary_is_zeroed() {
    let engine = in_memory_engine();
    let summary = engine.risk_summary().unwrap();
    assert_eq!(summary.client_count, 0);
    assert_eq!(summary.average_health_score, 0.0);
    assert!(engine.at_risk_clients().unwrap().is_empty());
    assert!(engine.clients_by_health().unwrap().is_empty());
}

/// Recording a visit through the engine drops the cached analysis and the
/// next read reflects the new data.
#[test]
fn update_invalidates_and_rescores() {
    let mut engine = in_memory_engine();
    engine.import(&roster()).unwrap();

    let before = engine.analyze_by_id("c-lapsed").unwrap().analysis;
    assert_eq!(before.risk_tier, RiskTier::AtRisk);
    assert_eq!(engine.cache().len(), 1);

    let patch = ClientPatch {
        last_visit: Some(Some(as_of())),
        ..Default::default()
    };
    let updated = engine.update_client("c-lapsed", &patch).unwrap();
    assert_eq!(updated.last_visit, Some(as_of()));
    assert!(engine.cache().is_empty(), "mutation hook must invalidate");

    let after = engine.analyze_by_id("c-lapsed").unwrap().analysis;
    assert!(after.health_score > before.health_score);
    assert_eq!(after.risk_tier, RiskTier::Watch);
    assert_ne!(after.fingerprint, before.fingerprint);
}

#[test]
fn no_op_patch_keeps_cache() {
    let mut engine = in_memory_engine();
    engine.import(&roster()).unwrap();
    engine.analyze_by_id("c-loyal").unwrap();

    let patch = ClientPatch {
        status: Some(ClientStatus::Active),
        ..Default::default()
    };
    engine.update_client("c-loyal", &patch).unwrap();
    assert_eq!(engine.cache().len(), 1);
}

#[test]
fn update_unknown_client_fails() {
    let mut engine = in_memory_engine();
    let err = engine.update_client("nobody", &ClientPatch::default()).unwrap_err();
    assert!(matches!(err, RetentionError::ClientNotFound { .. }));
}

#[test]
fn generate_nudges_through_engine() {
    let mut engine = in_memory_engine();
    engine.import(&roster()).unwrap();

    let ghost = engine.repository().get_by_id("c-ghost").unwrap().unwrap();
    let nudges = engine.generate_nudges(&ghost).unwrap();
    assert_eq!(nudges[0].triggered_by, "sessions_nearly_exhausted");
    assert!(nudges.iter().any(|n| n.triggered_by == "critical_health"));
}

#[test]
fn build_rejects_invalid_config() {
    let mut config = RetentionConfig::default();
    config.scoring.weights.recency = 0.9;
    let result = RetentionEngine::build(config, InMemoryClientRepository::new(clock()), clock());
    assert!(matches!(result, Err(RetentionError::InvalidConfig { .. })));
}

#[test]
fn sqlite_engine_matches_in_memory() {
    let mut memory = in_memory_engine();
    let mut sqlite = sqlite_engine();
    let raws = SampleGenerator::new(42, as_of()).raw_batch(300);

    let a = memory.import(&raws).unwrap();
    let b = sqlite.import(&raws).unwrap();
    assert_eq!(a.succeeded(), b.succeeded());
    assert_eq!(sqlite.repository().client_count().unwrap() as usize, a.succeeded());

    assert_eq!(memory.risk_summary().unwrap(), sqlite.risk_summary().unwrap());
}

#[test]
fn sqlite_update_invalidates_through_hook() {
    let mut engine = sqlite_engine();
    engine.import(&roster()).unwrap();
    engine.analyze_by_id("c-ghost").unwrap();
    assert_eq!(engine.cache().len(), 1);

    let patch = ClientPatch {
        visit_count: Some(4),
        last_visit: Some(Some(as_of())),
        ..Default::default()
    };
    engine.update_client("c-ghost", &patch).unwrap();
    assert!(engine.cache().is_empty());

    let stored = engine.repository().get_by_id("c-ghost").unwrap().unwrap();
    assert_eq!(stored.visit_count, 4);
}

/// Analyses are shareable across threads while the engine keeps the repo.
#[test]
fn analyzer_handle_is_shareable() {
    let mut engine = in_memory_engine();
    engine.import(&roster()).unwrap();
    let clients = engine.repository().get_all().unwrap();
    let analyzer = engine.analyzer();

    std::thread::scope(|scope| {
        for client in &clients {
            let analyzer = Arc::clone(&analyzer);
            scope.spawn(move || analyzer.analyze(client).unwrap());
        }
    });
    assert_eq!(engine.cache().len(), clients.len());
}
