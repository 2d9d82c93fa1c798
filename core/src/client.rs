//! Canonical client record.
//!
//! RULE: Unlimited sessions are a variant, never a number.
//! Numeric sentinels for "unlimited" exist only at serialization
//! boundaries (the SQLite store, import parsing), never in arithmetic.

use crate::types::ClientId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Inactive,
    AtRisk,
    Cancelled,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active    => "active",
            Self::Inactive  => "inactive",
            Self::AtRisk    => "at_risk",
            Self::Cancelled => "cancelled",
        }
    }

    /// Lenient parse used by import and the store. Accepts common spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "active" | "current" | "enrolled"          => Some(Self::Active),
            "inactive" | "frozen" | "paused" | "onhold" => Some(Self::Inactive),
            "atrisk" | "risk"                           => Some(Self::AtRisk),
            "cancelled" | "canceled" | "terminated"     => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaining sessions on a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sessions {
    Unlimited,
    Count(u32),
}

impl Sessions {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// The finite count, if any.
    pub fn count(&self) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::Count(n)  => Some(*n),
        }
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl fmt::Display for Sessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Count(n)  => write!(f, "{n}"),
        }
    }
}

// JSON form: the string "unlimited" or a non-negative integer.
impl Serialize for Sessions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unlimited => serializer.serialize_str("unlimited"),
            Self::Count(n)  => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for Sessions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(u32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(n) => Ok(Self::Count(n)),
            Repr::Text(s) if s.eq_ignore_ascii_case("unlimited") => Ok(Self::Unlimited),
            Repr::Text(s) => s
                .trim()
                .parse::<u32>()
                .map(Self::Count)
                .map_err(|_| serde::de::Error::custom(format!("invalid session count '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id:                 ClientId,
    pub first_name:         String,
    pub last_name:          String,
    pub email:              Option<String>,
    pub phone:              Option<String>,
    pub status:             ClientStatus,
    pub membership_type:    Option<String>,
    pub remaining_sessions: Sessions,
    pub expire_date:        Option<NaiveDate>,
    pub last_visit:         Option<NaiveDate>,
    pub visit_count:        u32,
    pub total_spend:        f64,
    pub created_at:         DateTime<Utc>,
    pub updated_at:         DateTime<Utc>,
}

impl Client {
    /// A minimal active client with no history. Mostly useful for tests
    /// and for building records field by field.
    pub fn new(id: impl Into<ClientId>, created_at: DateTime<Utc>) -> Self {
        Self {
            id:                 id.into(),
            first_name:         String::new(),
            last_name:          String::new(),
            email:              None,
            phone:              None,
            status:             ClientStatus::Active,
            membership_type:    None,
            remaining_sessions: Sessions::Count(0),
            expire_date:        None,
            last_visit:         None,
            visit_count:        0,
            total_spend:        0.0,
            created_at,
            updated_at:         created_at,
        }
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone().unwrap_or_else(|| self.id.clone())
        } else {
            full.to_string()
        }
    }

    /// Days from the last visit to `as_of`. `None` when the client never visited.
    pub fn days_since_last_visit(&self, as_of: NaiveDate) -> Option<i64> {
        self.last_visit.map(|d| (as_of - d).num_days().max(0))
    }

    /// Days until the membership expires; negative once expired.
    pub fn days_until_expiry(&self, as_of: NaiveDate) -> Option<i64> {
        self.expire_date.map(|d| (d - as_of).num_days())
    }
}

/// A field-level change to a client. `None` leaves a field untouched;
/// the doubly optional fields can clear a value with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientPatch {
    pub first_name:         Option<String>,
    pub last_name:          Option<String>,
    pub email:              Option<Option<String>>,
    pub phone:              Option<Option<String>>,
    pub status:             Option<ClientStatus>,
    pub membership_type:    Option<Option<String>>,
    pub remaining_sessions: Option<Sessions>,
    pub expire_date:        Option<Option<NaiveDate>>,
    pub last_visit:         Option<Option<NaiveDate>>,
    pub visit_count:        Option<u32>,
    pub total_spend:        Option<f64>,
}

impl ClientPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to `client`, bump `updated_at` if anything changed and
    /// return the names of the fields that actually changed.
    pub fn apply(&self, client: &mut Client, now: DateTime<Utc>) -> Vec<&'static str> {
        let mut changed = Vec::new();

        macro_rules! set {
            ($field:ident, $name:literal) => {
                if let Some(value) = &self.$field {
                    if client.$field != *value {
                        client.$field = value.clone();
                        changed.push($name);
                    }
                }
            };
        }

        set!(first_name, "firstName");
        set!(last_name, "lastName");
        set!(email, "email");
        set!(phone, "phone");
        set!(status, "status");
        set!(membership_type, "membershipType");
        set!(remaining_sessions, "remainingSessions");
        set!(expire_date, "expireDate");
        set!(last_visit, "lastVisit");
        set!(visit_count, "visitCount");

        if let Some(spend) = self.total_spend {
            let spend = spend.max(0.0);
            if client.total_spend != spend {
                client.total_spend = spend;
                changed.push("totalSpend");
            }
        }

        if !changed.is_empty() {
            client.updated_at = now;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn sessions_json_form() {
        assert_eq!(serde_json::to_string(&Sessions::Unlimited).unwrap(), "\"unlimited\"");
        assert_eq!(serde_json::to_string(&Sessions::Count(4)).unwrap(), "4");

        let parsed: Sessions = serde_json::from_str("\"Unlimited\"").unwrap();
        assert_eq!(parsed, Sessions::Unlimited);
        let parsed: Sessions = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, Sessions::Count(7));
        assert!(serde_json::from_str::<Sessions>("-1").is_err());
    }

    #[test]
    fn status_parse_accepts_common_spellings() {
        assert_eq!(ClientStatus::parse("Canceled"), Some(ClientStatus::Cancelled));
        assert_eq!(ClientStatus::parse("at risk"), Some(ClientStatus::AtRisk));
        assert_eq!(ClientStatus::parse("AT-RISK"), Some(ClientStatus::AtRisk));
        assert_eq!(ClientStatus::parse("On Hold"), Some(ClientStatus::Inactive));
        assert_eq!(ClientStatus::parse("vip"), None);
    }

    #[test]
    fn patch_reports_only_real_changes() {
        let mut client = Client::new("c-1", t0());
        client.visit_count = 3;

        let later = t0() + chrono::Duration::days(2);
        let patch = ClientPatch {
            visit_count: Some(3),
            last_visit: Some(Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())),
            ..Default::default()
        };

        let changed = patch.apply(&mut client, later);
        assert_eq!(changed, vec!["lastVisit"]);
        assert_eq!(client.updated_at, later);

        let changed = patch.apply(&mut client, later + chrono::Duration::days(1));
        assert!(changed.is_empty());
        assert_eq!(client.updated_at, later, "no-op patch must not bump updated_at");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut client = Client::new("c-2", t0());
        client.email = Some("pat@example.com".into());
        assert_eq!(client.display_name(), "pat@example.com");
        client.first_name = "Pat".into();
        assert_eq!(client.display_name(), "Pat");
    }
}
