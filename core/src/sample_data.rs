//! Deterministic sample data: messy raw import rows and canonical clients.
//!
//! RULE: Nothing here calls a platform RNG. Every generator is seeded, so
//! the same seed always yields the same rows (property tests rely on it).

use crate::client::{Client, ClientStatus, Sessions};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde_json::{json, Map, Value};

/// A seeded RNG with the handful of draws the generators need.
pub struct SampleRng {
    inner: Pcg64Mcg,
}

impl SampleRng {
    pub fn new(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.next_u64_below(items.len() as u64) as usize]
    }
}

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda",
    "David", "Elizabeth", "Priya", "Wei", "Carlos", "Fatima", "Kenji", "Amara",
    "Luca", "Sofia", "Mateo", "Aisha", "Noah", "Olivia", "Liam", "Emma",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
    "Abendroth", "Nguyen", "Patel", "Kim", "Okafor", "Rossi", "Tanaka", "Haddad",
    "van der Berg", "O'Brien", "Schmidt", "Silva",
];

const MEMBERSHIPS: &[&str] = &["10-pack", "20-pack", "Monthly Unlimited", "Drop-in", "Annual"];

const STATUS_SPELLINGS: &[&str] = &["Active", "active", "ACTIVE", "Inactive", "At Risk", "Canceled", "frozen"];

/// Generates plausible but untidy studio-management exports.
pub struct SampleGenerator {
    rng:   SampleRng,
    as_of: NaiveDate,
}

impl SampleGenerator {
    pub fn new(seed: u64, as_of: NaiveDate) -> Self {
        Self { rng: SampleRng::new(seed), as_of }
    }

    fn name(&mut self) -> (&'static str, &'static str) {
        (*self.rng.pick(FIRST_NAMES), *self.rng.pick(LAST_NAMES))
    }

    fn days_ago(&mut self, max: u64) -> NaiveDate {
        self.as_of - Duration::days(self.rng.next_u64_below(max + 1) as i64)
    }

    /// One raw export row. Field names, formats and sentinels vary per row;
    /// roughly one row in forty has no usable identity.
    pub fn raw_record(&mut self, index: usize) -> Value {
        let mut row = Map::new();
        let (first, last) = self.name();

        if self.rng.chance(0.025) {
            row.insert("Notes".into(), json!("walk-in, no details"));
            row.insert("Visits".into(), json!(self.rng.next_u64_below(5)));
            return Value::Object(row);
        }

        row.insert("Client ID".into(), json!(format!("c-{index:06}")));
        match self.rng.next_u64_below(3) {
            0 => {
                row.insert("name".into(), json!(format!("{last}, {first}")));
            }
            1 => {
                row.insert("Full Name".into(), json!(format!("{first} {last}")));
            }
            _ => {
                row.insert("first_name".into(), json!(first));
                row.insert("lastName".into(), json!(last));
            }
        }

        let email = format!("{}.{}@example.com", first.to_lowercase(), last.replace([' ', '\''], "").to_lowercase());
        row.insert("Email".into(), json!(if self.rng.chance(0.05) { "N/A".to_string() } else { email }));
        row.insert("Status".into(), json!(self.rng.pick(STATUS_SPELLINGS)));

        let membership = *self.rng.pick(MEMBERSHIPS);
        row.insert("Membership Type".into(), json!(membership));
        let sessions = if membership.contains("Unlimited") {
            json!(if self.rng.chance(0.5) { "Unlimited" } else { "-1" })
        } else if self.rng.chance(0.05) {
            json!("see notes")
        } else {
            json!(self.rng.next_u64_below(21).to_string())
        };
        row.insert("Sessions Remaining".into(), sessions);

        let expire = self.as_of + Duration::days(self.rng.next_u64_below(120) as i64 - 30);
        let expire = match self.rng.next_u64_below(4) {
            0 => json!(expire.format("%Y-%m-%d").to_string()),
            1 => json!(expire.format("%m/%d/%Y").to_string()),
            2 => json!(expire.format("%b %d, %Y").to_string()),
            _ => json!(if self.rng.chance(0.5) { "12/31/9999" } else { "" }),
        };
        row.insert("Expiration Date".into(), expire);

        if !self.rng.chance(0.1) {
            let visit = self.days_ago(90);
            row.insert("Last Visit".into(), json!(visit.format("%Y-%m-%d").to_string()));
        }

        row.insert("Total Visits".into(), json!(self.rng.next_u64_below(80)));
        let spend = self.rng.next_f64() * 4_000.0;
        row.insert("Total Spend".into(), json!(format!("${spend:.2}")));
        row.insert("Join Date".into(), json!(self.days_ago(900).format("%Y-%m-%d").to_string()));

        Value::Object(row)
    }

    pub fn raw_batch(&mut self, n: usize) -> Vec<Value> {
        (0..n).map(|i| self.raw_record(i)).collect()
    }

    /// A canonical client with arbitrary but valid field values, including
    /// edge cases (no visits, zero spend, Unlimited, cancelled).
    pub fn client(&mut self, index: usize) -> Client {
        let created_days = self.rng.next_u64_below(1_500) as i64;
        let created: DateTime<Utc> = (self.as_of - Duration::days(created_days))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        let (first, last) = self.name();

        let mut client = Client::new(format!("c-{index:06}"), created);
        client.first_name = first.to_string();
        client.last_name = last.to_string();
        client.status = *self.rng.pick(&[
            ClientStatus::Active,
            ClientStatus::Active,
            ClientStatus::AtRisk,
            ClientStatus::Inactive,
            ClientStatus::Cancelled,
        ]);
        client.remaining_sessions = if self.rng.chance(0.2) {
            Sessions::Unlimited
        } else {
            Sessions::Count(self.rng.next_u64_below(30) as u32)
        };
        client.expire_date = self
            .rng
            .chance(0.7)
            .then(|| self.as_of + Duration::days(self.rng.next_u64_below(400) as i64 - 100));
        client.last_visit = self
            .rng
            .chance(0.85)
            .then(|| self.days_ago(created_days.max(0) as u64));
        client.visit_count = if self.rng.chance(0.1) { 0 } else { self.rng.next_u64_below(500) as u32 };
        client.total_spend = if self.rng.chance(0.1) { 0.0 } else { self.rng.next_f64() * 20_000.0 };
        client
    }
}
