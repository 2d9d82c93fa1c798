//! retention-runner: headless import and churn report.
//!
//! Usage:
//!   retention-runner --input clients.json --db clients.db --as-of 2024-06-01
//!   retention-runner --synthetic 500 --seed 12345 --top 10
//!   retention-runner --synthetic 50 --json

use anyhow::{Context, Result};
use chrono::NaiveDate;
use retention_core::{
    clock::{Clock, FixedClock, SystemClock},
    config::RetentionConfig,
    engine::{RetentionEngine, RiskSummary},
    import_normalizer::ImportFailure,
    nudge_generator::Nudge,
    sample_data::SampleGenerator,
    score_cache::CacheStats,
    store::SqliteClientStore,
};
use serde_json::Value;
use std::{env, path::Path, sync::Arc};

#[derive(serde::Serialize)]
struct AtRiskRow {
    client_id:    String,
    name:         String,
    health_score: f64,
    risk_tier:    String,
    nudges:       Vec<Nudge>,
}

#[derive(serde::Serialize)]
struct Report {
    as_of:    NaiveDate,
    imported: usize,
    warnings: usize,
    failures: Vec<ImportFailure>,
    summary:  RiskSummary,
    at_risk:  Vec<AtRiskRow>,
    cache:    CacheStats,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let synthetic = parse_arg(&args, "--synthetic", 0usize);
    let top = parse_arg(&args, "--top", 10usize);
    let json_output = args.iter().any(|a| a == "--json");
    let input = flag_value(&args, "--input");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");

    let clock: Arc<dyn Clock> = match flag_value(&args, "--as-of") {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("--as-of expects YYYY-MM-DD, got '{raw}'"))?;
            Arc::new(FixedClock::on(date))
        }
        None => Arc::new(SystemClock),
    };
    let as_of = clock.today();

    let config = if Path::new(data_dir).join("retention").exists() {
        RetentionConfig::load(data_dir)?
    } else {
        log::warn!("runner: no config under {data_dir}, using defaults");
        RetentionConfig::default()
    };

    let raws = match input {
        Some(path) => read_records(path)?,
        None if synthetic > 0 => SampleGenerator::new(seed, as_of).raw_batch(synthetic),
        None => anyhow::bail!("nothing to import: pass --input <file.json> or --synthetic <n>"),
    };

    if !json_output {
        println!("retention-runner");
        println!("  as_of:     {as_of}");
        println!("  records:   {}", raws.len());
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let store = SqliteClientStore::open(db)?.with_clock(Arc::clone(&clock));
    store.migrate()?;
    let mut engine = RetentionEngine::build(config, store, clock)?;

    let outcome = engine.import(&raws)?;
    let summary = engine.risk_summary()?;

    let mut at_risk = Vec::new();
    for row in engine.clients_by_health()?.into_iter().take(top) {
        at_risk.push(AtRiskRow {
            nudges:       engine.generate_nudges(&row.client)?,
            client_id:    row.client.id.clone(),
            name:         row.client.display_name(),
            health_score: row.analysis.health_score,
            risk_tier:    row.analysis.risk_tier.to_string(),
        });
    }

    let report = Report {
        as_of,
        imported: outcome.succeeded(),
        warnings: outcome.warning_count(),
        failures: outcome.failures,
        summary,
        at_risk,
        cache: engine.cache().stats(),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, engine.repository().client_count()?);
    }
    Ok(())
}

/// A JSON array of records, or an object wrapping one under "clients".
fn read_records(path: &str) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    let parsed: Value =
        serde_json::from_str(&content).with_context(|| format!("Cannot parse {path}"))?;
    match parsed {
        Value::Array(records) => Ok(records),
        Value::Object(mut object) => match object.remove("clients") {
            Some(Value::Array(records)) => Ok(records),
            _ => anyhow::bail!("{path}: expected an array of records or {{\"clients\": [...]}}"),
        },
        _ => anyhow::bail!("{path}: expected an array of records"),
    }
}

fn print_report(report: &Report, stored: i64) {
    let s = &report.summary;

    println!("=== IMPORT ===");
    println!("  imported:       {}", report.imported);
    println!("  failed:         {}", report.failures.len());
    println!("  warnings:       {}", report.warnings);
    println!("  stored clients: {stored}");
    for failure in report.failures.iter().take(5) {
        println!("    record {}: {}", failure.index, failure.reason);
    }

    println!();
    println!("=== RISK SUMMARY ===");
    println!("  clients:        {}", s.client_count);
    println!("  healthy:        {}", s.healthy);
    println!("  watch:          {}", s.watch);
    println!("  at risk:        {}", s.at_risk);
    println!("  critical:       {}", s.critical);
    println!("  avg health:     {:.1}", s.average_health_score);

    println!();
    println!("=== LEAST HEALTHY ({}) ===", report.at_risk.len());
    for row in &report.at_risk {
        println!(
            "  {:<12} {:<28} {:>5.1}  {}",
            row.client_id, row.name, row.health_score, row.risk_tier
        );
        for nudge in &row.nudges {
            println!("      [{:?}] {}", nudge.priority, nudge.message);
        }
    }

    println!();
    println!(
        "cache: {} entries, {} hits, {} misses",
        report.cache.entries, report.cache.hits, report.cache.misses
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
