//! Client mutation events.
//!
//! RULE: Every repository mutation path emits exactly one event after the
//! write succeeds. Hooks registered on the repository receive it; the
//! retention engine uses this to invalidate cached analyses.

use crate::types::ClientId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    ClientImported {
        client_id: ClientId,
    },
    ClientUpdated {
        client_id:      ClientId,
        changed_fields: Vec<String>,
    },
}

impl ClientEvent {
    pub fn client_id(&self) -> &str {
        match self {
            Self::ClientImported { client_id }    => client_id,
            Self::ClientUpdated { client_id, .. } => client_id,
        }
    }

    /// Stable name used in log lines.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ClientImported { .. } => "client_imported",
            Self::ClientUpdated { .. }  => "client_updated",
        }
    }
}

/// Callback invoked after a successful mutation.
pub type MutationHook = Box<dyn Fn(&ClientEvent) + Send + Sync>;

/// Registered hooks of one repository, called in registration order.
#[derive(Default)]
pub struct MutationHooks {
    hooks: Vec<MutationHook>,
}

impl MutationHooks {
    pub fn register(&mut self, hook: MutationHook) {
        self.hooks.push(hook);
    }

    pub fn emit(&self, event: &ClientEvent) {
        log::debug!("event: {} client={}", event.event_type(), event.client_id());
        for hook in &self.hooks {
            hook(event);
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
