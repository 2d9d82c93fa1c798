//! The retention engine: dashboard and import façade over the pipeline.
//!
//! DATA FLOW:
//!   raw record → ImportNormalizer → Client → repository
//!   Client → ChurnAnalyzer (ScoreCache) → Analysis → NudgeGenerator → Nudges
//!
//! RULES:
//!   - The repository is injected; there is no process-wide client list.
//!   - The engine registers one mutation hook on the repository at build
//!     time. Every insert/update invalidates that client's cached analyses.
//!   - Analyzer and cache are shareable across threads; the repository is
//!     owned by the engine and mutated through `&mut self` only.

use crate::{
    churn_analyzer::{Analysis, ChurnAnalyzer, RiskTier},
    client::{Client, ClientPatch},
    clock::Clock,
    config::RetentionConfig,
    error::{RetentionError, RetentionResult},
    event::ClientEvent,
    import_normalizer::{BatchOutcome, ImportNormalizer},
    nudge_generator::{Nudge, NudgeGenerator},
    repository::ClientRepository,
    score_cache::ScoreCache,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct ClientAnalysis {
    pub client:   Client,
    pub analysis: Analysis,
}

/// Portfolio-level view of the current risk distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskSummary {
    pub client_count:         usize,
    pub healthy:              usize,
    pub watch:                usize,
    pub at_risk:              usize,
    pub critical:             usize,
    pub average_health_score: f64,
}

impl RiskSummary {
    pub fn count(&self, tier: RiskTier) -> usize {
        match tier {
            RiskTier::Healthy  => self.healthy,
            RiskTier::Watch    => self.watch,
            RiskTier::AtRisk   => self.at_risk,
            RiskTier::Critical => self.critical,
        }
    }
}

pub struct RetentionEngine<R: ClientRepository> {
    repo:       R,
    analyzer:   Arc<ChurnAnalyzer>,
    nudges:     NudgeGenerator,
    normalizer: ImportNormalizer,
    cache:      Arc<ScoreCache>,
}

impl<R: ClientRepository> RetentionEngine<R> {
    /// Build a fully wired engine and hook cache invalidation into `repo`.
    pub fn build(config: RetentionConfig, mut repo: R, clock: Arc<dyn Clock>) -> RetentionResult<Self> {
        config.validate()?;

        let cache = Arc::new(ScoreCache::new());
        let hook_cache = Arc::clone(&cache);
        repo.register_mutation_hook(Box::new(move |event: &ClientEvent| {
            let dropped = hook_cache.invalidate(event.client_id());
            log::debug!(
                "engine: {} client={} invalidated {dropped} cached analyses",
                event.event_type(),
                event.client_id(),
            );
        }));

        Ok(Self {
            analyzer:   Arc::new(ChurnAnalyzer::new(config.scoring, Arc::clone(&cache), Arc::clone(&clock))),
            nudges:     NudgeGenerator::new(config.nudges),
            normalizer: ImportNormalizer::new(config.import, clock),
            cache,
            repo,
        })
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Shared handle for concurrent dashboard consumers.
    pub fn analyzer(&self) -> Arc<ChurnAnalyzer> {
        Arc::clone(&self.analyzer)
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    pub fn analyze(&self, client: &Client) -> RetentionResult<Analysis> {
        self.analyzer.analyze(client)
    }

    pub fn generate_nudges(&self, client: &Client) -> RetentionResult<Vec<Nudge>> {
        let analysis = self.analyzer.analyze(client)?;
        Ok(self.nudges.generate(&analysis, client))
    }

    pub fn analyze_by_id(&self, id: &str) -> RetentionResult<ClientAnalysis> {
        let client = self
            .repo
            .get_by_id(id)?
            .ok_or_else(|| RetentionError::ClientNotFound { id: id.to_string() })?;
        let analysis = self.analyzer.analyze(&client)?;
        Ok(ClientAnalysis { client, analysis })
    }

    /// Patch a client through the repository. The repository's mutation
    /// hook drops the stale analysis before this returns.
    pub fn update_client(&mut self, id: &str, patch: &ClientPatch) -> RetentionResult<Client> {
        self.repo.update(id, patch)
    }

    /// Normalize `raws` and insert every success. Per-record failures are
    /// reported in the outcome; only repository errors abort.
    pub fn import(&mut self, raws: &[Value]) -> RetentionResult<BatchOutcome> {
        let outcome = self.normalizer.normalize_batch(raws);
        for normalized in &outcome.clients {
            self.repo.insert(normalized.client.clone())?;
        }
        log::info!(
            "engine: imported {} clients ({} failures)",
            outcome.succeeded(),
            outcome.failures.len(),
        );
        Ok(outcome)
    }

    /// Clients in the at_risk or critical tiers, least healthy first.
    pub fn at_risk_clients(&self) -> RetentionResult<Vec<ClientAnalysis>> {
        Ok(self
            .clients_by_health()?
            .into_iter()
            .filter(|row| matches!(row.analysis.risk_tier, RiskTier::AtRisk | RiskTier::Critical))
            .collect())
    }

    /// Every client with its analysis, least healthy first. Ties keep id order.
    pub fn clients_by_health(&self) -> RetentionResult<Vec<ClientAnalysis>> {
        let mut rows = self
            .repo
            .get_all()?
            .into_iter()
            .map(|client| {
                let analysis = self.analyzer.analyze(&client)?;
                Ok(ClientAnalysis { client, analysis })
            })
            .collect::<RetentionResult<Vec<_>>>()?;

        rows.sort_by(|a, b| {
            a.analysis
                .health_score
                .partial_cmp(&b.analysis.health_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(rows)
    }

    pub fn risk_summary(&self) -> RetentionResult<RiskSummary> {
        let mut summary = RiskSummary::default();
        let mut total = 0.0;

        for client in self.repo.get_all()? {
            let analysis = self.analyzer.analyze(&client)?;
            summary.client_count += 1;
            total += analysis.health_score;
            match analysis.risk_tier {
                RiskTier::Healthy  => summary.healthy += 1,
                RiskTier::Watch    => summary.watch += 1,
                RiskTier::AtRisk   => summary.at_risk += 1,
                RiskTier::Critical => summary.critical += 1,
            }
        }

        if summary.client_count > 0 {
            summary.average_health_score = total / summary.client_count as f64;
        }
        Ok(summary)
    }
}
