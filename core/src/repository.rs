//! The client repository seam.
//!
//! RULE: The retention core never owns client records. It reads them and
//! writes field-level patches through this trait, and relies on every
//! implementation to emit a ClientEvent after each successful mutation.

use crate::{
    client::{Client, ClientPatch},
    clock::{Clock, SystemClock},
    error::{RetentionError, RetentionResult},
    event::{ClientEvent, MutationHook, MutationHooks},
};
use std::{collections::BTreeMap, sync::Arc};

pub trait ClientRepository: Send {
    fn get_all(&self) -> RetentionResult<Vec<Client>>;

    fn get_by_id(&self, id: &str) -> RetentionResult<Option<Client>>;

    /// Apply `patch` and return the updated client. Emits `ClientUpdated`
    /// when at least one field changed.
    fn update(&mut self, id: &str, patch: &ClientPatch) -> RetentionResult<Client>;

    /// Insert or replace a client. Emits `ClientImported`.
    fn insert(&mut self, client: Client) -> RetentionResult<()>;

    fn register_mutation_hook(&mut self, hook: MutationHook);
}

/// Map-backed repository. Iteration is in id order.
pub struct InMemoryClientRepository {
    clients: BTreeMap<String, Client>,
    hooks:   MutationHooks,
    clock:   Arc<dyn Clock>,
}

impl Default for InMemoryClientRepository {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryClientRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: BTreeMap::new(),
            hooks:   MutationHooks::default(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl ClientRepository for InMemoryClientRepository {
    fn get_all(&self) -> RetentionResult<Vec<Client>> {
        Ok(self.clients.values().cloned().collect())
    }

    fn get_by_id(&self, id: &str) -> RetentionResult<Option<Client>> {
        Ok(self.clients.get(id).cloned())
    }

    fn update(&mut self, id: &str, patch: &ClientPatch) -> RetentionResult<Client> {
        let client = self
            .clients
            .get_mut(id)
            .ok_or_else(|| RetentionError::ClientNotFound { id: id.to_string() })?;

        let changed = patch.apply(client, self.clock.now());
        let updated = client.clone();

        if !changed.is_empty() {
            self.hooks.emit(&ClientEvent::ClientUpdated {
                client_id:      id.to_string(),
                changed_fields: changed.into_iter().map(String::from).collect(),
            });
        }
        Ok(updated)
    }

    fn insert(&mut self, client: Client) -> RetentionResult<()> {
        if client.id.trim().is_empty() {
            return Err(RetentionError::MissingClientId);
        }
        let client_id = client.id.clone();
        self.clients.insert(client_id.clone(), client);
        self.hooks.emit(&ClientEvent::ClientImported { client_id });
        Ok(())
    }

    fn register_mutation_hook(&mut self, hook: MutationHook) {
        self.hooks.register(hook);
    }
}
