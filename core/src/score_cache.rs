//! Fingerprint-keyed memoization of analyses.
//!
//! RULES:
//!   - Entries never expire on time. They go away through
//!     `invalidate(client_id)` (driven by repository mutation hooks), `clear()`,
//!     or when a newer fingerprint for the same client is stored.
//!   - At most one stored entry per client.
//!   - At most one computation per fingerprint is in flight. Concurrent
//!     callers for the same fingerprint wait for it and share its result.
//!   - A computation whose client is invalidated mid-flight is returned to
//!     its caller but never stored.

use crate::{
    churn_analyzer::{Analysis, Fingerprint},
    types::ClientId,
};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits:      u64,
    pub misses:    u64,
    pub entries:   usize,
    pub in_flight: usize,
}

#[derive(Default)]
struct CacheState {
    entries:   HashMap<Fingerprint, Analysis>,
    by_client: HashMap<ClientId, HashSet<Fingerprint>>,
    in_flight: HashMap<Fingerprint, ClientId>,
    discarded: HashSet<Fingerprint>,
    hits:      u64,
    misses:    u64,
}

impl CacheState {
    /// Keep only the newest fingerprint per client. Older snapshots (an
    /// earlier evaluation date, an edit made outside the repository) are
    /// dropped here. In-flight computations are left alone.
    fn store(&mut self, fingerprint: Fingerprint, analysis: Analysis) {
        let owned = self.by_client.entry(analysis.client_id.clone()).or_default();
        let stale: Vec<Fingerprint> = owned.drain().filter(|fp| *fp != fingerprint).collect();
        owned.insert(fingerprint.clone());

        for fp in &stale {
            self.entries.remove(fp);
        }
        if !stale.is_empty() {
            log::debug!("cache: client={} replaced {} stale entries", analysis.client_id, stale.len());
        }
        self.entries.insert(fingerprint, analysis);
    }
}

#[derive(Default)]
pub struct ScoreCache {
    state: Mutex<CacheState>,
    ready: Condvar,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Analysis> {
        let mut state = self.state.lock();
        let hit = state.entries.get(fingerprint).cloned();
        if hit.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        hit
    }

    pub fn put(&self, fingerprint: Fingerprint, analysis: Analysis) {
        self.state.lock().store(fingerprint, analysis);
    }

    /// Drop every entry belonging to `client_id`. Returns how many were dropped.
    pub fn invalidate(&self, client_id: &str) -> usize {
        let mut state = self.state.lock();

        let dropped = match state.by_client.remove(client_id) {
            Some(fingerprints) => {
                for fp in &fingerprints {
                    state.entries.remove(fp);
                }
                fingerprints.len()
            }
            None => 0,
        };

        let pending: Vec<Fingerprint> = state
            .in_flight
            .iter()
            .filter(|(_, owner)| owner.as_str() == client_id)
            .map(|(fp, _)| fp.clone())
            .collect();
        state.discarded.extend(pending);

        log::debug!("cache: invalidated client={client_id} dropped={dropped}");
        dropped
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.by_client.clear();
        let pending: Vec<Fingerprint> = state.in_flight.keys().cloned().collect();
        state.discarded.extend(pending);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits:      state.hits,
            misses:    state.misses,
            entries:   state.entries.len(),
            in_flight: state.in_flight.len(),
        }
    }

    /// Return the cached analysis for `fingerprint`, or run `compute` once
    /// while any concurrent callers for the same fingerprint wait.
    pub fn get_or_compute<F>(&self, fingerprint: &Fingerprint, client_id: &str, compute: F) -> Analysis
    where
        F: FnOnce() -> Analysis,
    {
        let mut state = self.state.lock();
        loop {
            if let Some(hit) = state.entries.get(fingerprint).cloned() {
                state.hits += 1;
                return hit;
            }
            if !state.in_flight.contains_key(fingerprint) {
                break;
            }
            self.ready.wait(&mut state);
        }
        state.misses += 1;
        state.in_flight.insert(fingerprint.clone(), client_id.to_string());
        drop(state);

        let mut flight = InFlight { cache: self, fingerprint, finished: false };
        let analysis = compute();
        flight.finish(Some(&analysis));
        analysis
    }
}

/// Clears the in-flight marker even if the computation panics, so waiters
/// wake up and retry instead of blocking forever.
struct InFlight<'a> {
    cache:       &'a ScoreCache,
    fingerprint: &'a Fingerprint,
    finished:    bool,
}

impl InFlight<'_> {
    fn finish(&mut self, analysis: Option<&Analysis>) {
        self.finished = true;
        let mut state = self.cache.state.lock();
        state.in_flight.remove(self.fingerprint);
        let discarded = state.discarded.remove(self.fingerprint);
        if let (Some(analysis), false) = (analysis, discarded) {
            state.store(self.fingerprint.clone(), analysis.clone());
        }
        drop(state);
        self.cache.ready.notify_all();
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(None);
        }
    }
}
