//! Shared primitive types used across the retention core.

/// Stable identifier of a client, owned by the repository.
pub type ClientId = String;

/// Stable identifier of a nudge rule.
pub type RuleId = &'static str;
