//! Import normalizer: raw spreadsheet/PDF export rows to canonical clients.
//!
//! Import sources disagree on field names, encode "missing" as assorted
//! sentinels and mix date formats. This module:
//!   1. Resolves fields through an alias table (case and punctuation blind)
//!   2. Splits single-field names ("Last, First" or "First Last")
//!   3. Parses sessions, counts, money and dates leniently
//!   4. Records every lossy repair as a DataQualityWarning
//!
//! Only missing identity (no name and no email) fails a record, plus,
//! within a batch, an id that an earlier record already claimed.
//! A failed record never aborts a batch.

use crate::{
    client::{Client, ClientStatus, Sessions},
    clock::Clock,
    config::ImportConfig,
    error::ValidationError,
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningIssue {
    UnparseableDate,
    ImplausibleDate,
    UnparseableNumber,
    NegativeNumber,
    FractionalCount,
    UnparseableSessions,
    OutOfRange,
    UnknownStatus,
    InvalidEmail,
    ShortPhone,
}

/// A lossy repair applied while normalizing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityWarning {
    pub field: &'static str,
    pub issue: WarningIssue,
    pub raw:   String,
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?} ({:?})", self.field, self.issue, self.raw)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Normalized {
    pub client:   Client,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    /// Position of the record in the input batch.
    pub index:   usize,
    pub payload: Value,
    #[serde(serialize_with = "serialize_reason")]
    pub reason:  ValidationError,
}

fn serialize_reason<S: serde::Serializer>(reason: &ValidationError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(reason)
}

/// Result of a batch import. `clients` keeps input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub clients:  Vec<Normalized>,
    pub failures: Vec<ImportFailure>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.clients.len()
    }

    pub fn warning_count(&self) -> usize {
        self.clients.iter().map(|n| n.warnings.len()).sum()
    }
}

// ── Field aliases ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    FirstName,
    LastName,
    Name,
    Email,
    Phone,
    Status,
    MembershipType,
    RemainingSessions,
    ExpireDate,
    LastVisit,
    VisitCount,
    TotalSpend,
    CreatedAt,
    UpdatedAt,
}

impl Field {
    /// Canonical output name, used in warnings.
    fn name(&self) -> &'static str {
        match self {
            Self::Id                => "id",
            Self::FirstName         => "firstName",
            Self::LastName          => "lastName",
            Self::Name              => "name",
            Self::Email             => "email",
            Self::Phone             => "phone",
            Self::Status            => "status",
            Self::MembershipType    => "membershipType",
            Self::RemainingSessions => "remainingSessions",
            Self::ExpireDate        => "expireDate",
            Self::LastVisit         => "lastVisit",
            Self::VisitCount        => "visitCount",
            Self::TotalSpend        => "totalSpend",
            Self::CreatedAt         => "createdAt",
            Self::UpdatedAt         => "updatedAt",
        }
    }

    /// Fields that describe past events; a future value is implausible.
    fn is_past_only(&self) -> bool {
        matches!(self, Self::LastVisit | Self::CreatedAt | Self::UpdatedAt)
    }

    /// Accepted source keys, already folded by `fold_key`. First match wins.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Id                => &["id", "clientid", "memberid", "customerid"],
            Self::FirstName         => &["firstname", "first", "givenname", "fname"],
            Self::LastName          => &["lastname", "last", "surname", "familyname", "lname"],
            Self::Name              => &["name", "fullname", "clientname", "membername"],
            Self::Email             => &["email", "emailaddress", "mail"],
            Self::Phone             => &["phone", "phonenumber", "mobile", "cell", "telephone"],
            Self::Status            => &["status", "memberstatus", "clientstatus"],
            Self::MembershipType    => &["membershiptype", "membership", "plan", "package"],
            Self::RemainingSessions => &["remainingsessions", "sessionsremaining", "sessionsleft", "remaining", "credits"],
            Self::ExpireDate        => &["expiredate", "expirationdate", "expirydate", "expires", "expiry", "enddate"],
            Self::LastVisit         => &["lastvisit", "lastvisitdate", "lastcheckin", "lastattended"],
            Self::VisitCount        => &["visitcount", "visits", "totalvisits", "checkins"],
            Self::TotalSpend        => &["totalspend", "totalspent", "spend", "revenue", "lifetimevalue", "ltv"],
            Self::CreatedAt         => &["createdat", "created", "joindate", "joined", "membersince", "startdate"],
            Self::UpdatedAt         => &["updatedat", "updated", "lastmodified", "modifiedat"],
        }
    }
}

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Placeholder strings exports use for "no value".
const MISSING_SENTINELS: &[&str] = &[
    "", "-", "--", "n/a", "na", "#n/a", "null", "nil", "none", "undefined", "unknown", "?",
];

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            MISSING_SENTINELS.contains(&s.as_str())
        }
        _ => false,
    }
}

/// One raw record with keys folded for alias lookup.
struct RawFields<'a> {
    by_key: HashMap<String, &'a Value>,
}

impl<'a> RawFields<'a> {
    fn new(object: &'a serde_json::Map<String, Value>) -> Self {
        let mut by_key = HashMap::with_capacity(object.len());
        for (key, value) in object {
            // First spelling of a key wins when two fold to the same name.
            by_key.entry(fold_key(key)).or_insert(value);
        }
        Self { by_key }
    }

    fn value(&self, field: Field) -> Option<&'a Value> {
        field
            .aliases()
            .iter()
            .filter_map(|alias| self.by_key.get(*alias).copied())
            .find(|v| !is_missing(v))
    }

    fn text(&self, field: Field) -> Option<String> {
        match self.value(field)? {
            Value::String(s) => Some(collapse_whitespace(s)),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b)   => Some(b.to_string()),
            _ => None,
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Normalizer ───────────────────────────────────────────────────────────────

pub struct ImportNormalizer {
    config: ImportConfig,
    clock:  Arc<dyn Clock>,
}

impl ImportNormalizer {
    pub fn new(config: ImportConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Normalize one raw record. Fails only on missing identity.
    pub fn normalize(&self, raw: &Value) -> Result<Normalized, ValidationError> {
        let object = raw.as_object().ok_or(ValidationError::NotAnObject)?;
        let fields = RawFields::new(object);
        let mut warnings = Vec::new();

        let (first_name, last_name) = resolve_name(&fields);

        let email = fields.text(Field::Email).and_then(|raw_email| {
            let email = raw_email.to_lowercase();
            if is_plausible_email(&email) {
                Some(email)
            } else {
                warnings.push(warning(Field::Email, WarningIssue::InvalidEmail, raw_email));
                None
            }
        });

        if first_name.is_empty() && last_name.is_empty() && email.is_none() {
            return Err(ValidationError::MissingIdentity);
        }

        let phone = fields.text(Field::Phone).and_then(|raw_phone| {
            let phone = normalize_phone(&raw_phone);
            if phone.chars().filter(char::is_ascii_digit).count() >= 7 {
                Some(phone)
            } else {
                warnings.push(warning(Field::Phone, WarningIssue::ShortPhone, raw_phone));
                None
            }
        });

        let status = match fields.text(Field::Status) {
            None => ClientStatus::Active,
            Some(raw_status) => ClientStatus::parse(&raw_status).unwrap_or_else(|| {
                warnings.push(warning(Field::Status, WarningIssue::UnknownStatus, raw_status));
                ClientStatus::Active
            }),
        };

        let remaining_sessions = self.resolve_sessions(&fields, &mut warnings);
        let expire_date = self.resolve_date(&fields, Field::ExpireDate, &mut warnings);
        let last_visit = self.resolve_date(&fields, Field::LastVisit, &mut warnings);
        let visit_count = resolve_count(&fields, Field::VisitCount, &mut warnings);
        let total_spend = resolve_amount(&fields, Field::TotalSpend, &mut warnings);

        let now = self.clock.now();
        let created_at = self
            .resolve_timestamp(&fields, Field::CreatedAt, &mut warnings)
            .unwrap_or(now);
        let updated_at = self
            .resolve_timestamp(&fields, Field::UpdatedAt, &mut warnings)
            .unwrap_or(created_at);

        let id = fields
            .text(Field::Id)
            .unwrap_or_else(|| format!("cl-{}", uuid::Uuid::new_v4()));

        for w in &warnings {
            log::debug!("import: client={id} warning {w}");
        }

        Ok(Normalized {
            client: Client {
                id,
                first_name,
                last_name,
                email,
                phone,
                status,
                membership_type: fields.text(Field::MembershipType),
                remaining_sessions,
                expire_date,
                last_visit,
                visit_count,
                total_spend,
                created_at,
                updated_at,
            },
            warnings,
        })
    }

    /// Normalize every record. Output order matches input order; large
    /// batches are split across scoped worker threads.
    pub fn normalize_batch(&self, raws: &[Value]) -> BatchOutcome {
        let results: Vec<Result<Normalized, ValidationError>> =
            if raws.len() >= self.config.parallel_threshold.max(2) {
                self.normalize_parallel(raws)
            } else {
                raws.iter().map(|raw| self.normalize(raw)).collect()
            };

        let mut outcome = BatchOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        for (index, (result, raw)) in results.into_iter().zip(raws).enumerate() {
            // First occurrence of an id wins; later ones would overwrite it on insert.
            let result = result.and_then(|normalized| {
                if seen.insert(normalized.client.id.clone()) {
                    Ok(normalized)
                } else {
                    Err(ValidationError::DuplicateId { id: normalized.client.id })
                }
            });
            match result {
                Ok(normalized) => outcome.clients.push(normalized),
                Err(reason) => {
                    log::warn!("import: record {index} rejected: {reason}");
                    outcome.failures.push(ImportFailure {
                        index,
                        payload: raw.clone(),
                        reason,
                    });
                }
            }
        }

        log::info!(
            "import: batch of {} -> {} clients, {} failures, {} warnings",
            raws.len(),
            outcome.succeeded(),
            outcome.failures.len(),
            outcome.warning_count(),
        );
        outcome
    }

    fn normalize_parallel(&self, raws: &[Value]) -> Vec<Result<Normalized, ValidationError>> {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let chunk_size = raws.len().div_ceil(workers).max(1);

        std::thread::scope(|scope| {
            let handles: Vec<_> = raws
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk.iter().map(|raw| self.normalize(raw)).collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }

    fn resolve_sessions(&self, fields: &RawFields<'_>, warnings: &mut Vec<DataQualityWarning>) -> Sessions {
        let field = Field::RemainingSessions;
        let Some(value) = fields.value(field) else {
            return Sessions::Count(0);
        };

        let number = match value {
            Value::String(s) => {
                let s = s.trim();
                if is_unlimited_word(s) {
                    return Sessions::Unlimited;
                }
                parse_number(s)
            }
            Value::Number(n) => n.as_f64(),
            _ => None,
        };

        let Some(number) = number else {
            warnings.push(warning(field, WarningIssue::UnparseableSessions, raw_text(value)));
            return Sessions::Count(0);
        };

        // Only an exact integer can be a sentinel: "-1.5" is a bad count.
        if number.fract() == 0.0 && self.config.unlimited_sentinels.contains(&(number as i64)) {
            return Sessions::Unlimited;
        }
        if number < 0.0 {
            warnings.push(warning(field, WarningIssue::NegativeNumber, raw_text(value)));
            return Sessions::Count(0);
        }
        Sessions::Count(whole_count(number, field, value, warnings))
    }

    fn resolve_date(
        &self,
        fields: &RawFields<'_>,
        field: Field,
        warnings: &mut Vec<DataQualityWarning>,
    ) -> Option<NaiveDate> {
        let value = fields.value(field)?;
        match parse_date_value(value, self.config.prefer_day_first) {
            Some(date) if self.is_plausible(field, date) => Some(date),
            Some(_) => {
                warnings.push(warning(field, WarningIssue::ImplausibleDate, raw_text(value)));
                None
            }
            None => {
                warnings.push(warning(field, WarningIssue::UnparseableDate, raw_text(value)));
                None
            }
        }
    }

    fn resolve_timestamp(
        &self,
        fields: &RawFields<'_>,
        field: Field,
        warnings: &mut Vec<DataQualityWarning>,
    ) -> Option<DateTime<Utc>> {
        let value = fields.value(field)?;
        let parsed = value
            .as_str()
            .and_then(|s| parse_instant(s.trim()))
            .or_else(|| {
                parse_date_value(value, self.config.prefer_day_first)
                    .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
            });

        match parsed {
            Some(ts) if self.is_plausible(field, ts.date_naive()) => Some(ts),
            Some(_) => {
                warnings.push(warning(field, WarningIssue::ImplausibleDate, raw_text(value)));
                None
            }
            None => {
                warnings.push(warning(field, WarningIssue::UnparseableDate, raw_text(value)));
                None
            }
        }
    }

    /// Inside the configured year window, and not in the future for fields
    /// that record something that already happened.
    fn is_plausible(&self, field: Field, date: NaiveDate) -> bool {
        let in_window =
            (self.config.min_plausible_year..=self.config.max_plausible_year).contains(&date.year());
        in_window && (!field.is_past_only() || date <= self.clock.today())
    }
}

// ── Field parsers ────────────────────────────────────────────────────────────

fn warning(field: Field, issue: WarningIssue, raw: String) -> DataQualityWarning {
    DataQualityWarning { field: field.name(), issue, raw }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Explicit first/last fields win; otherwise split a single name field.
fn resolve_name(fields: &RawFields<'_>) -> (String, String) {
    let first = fields.text(Field::FirstName);
    let last = fields.text(Field::LastName);
    if first.is_some() || last.is_some() {
        return (first.unwrap_or_default(), last.unwrap_or_default());
    }
    fields
        .text(Field::Name)
        .map(|name| split_name(&name))
        .unwrap_or_default()
}

/// "Last, First" when a comma is present, otherwise "First Rest Of Name".
pub fn split_name(name: &str) -> (String, String) {
    if let Some((last, first)) = name.split_once(',') {
        return (collapse_whitespace(first), collapse_whitespace(last));
    }
    let mut tokens = name.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_string();
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    }
}

fn is_unlimited_word(s: &str) -> bool {
    s.eq_ignore_ascii_case("unlimited") || s.eq_ignore_ascii_case("unl") || s == "∞"
}

/// Parse a number written the way spreadsheets export it: "$1,234.50", " 12 ".
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' ' | '\u{a0}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn resolve_count(fields: &RawFields<'_>, field: Field, warnings: &mut Vec<DataQualityWarning>) -> u32 {
    let Some(value) = fields.value(field) else {
        return 0;
    };
    match parse_numeric_value(value) {
        None => {
            warnings.push(warning(field, WarningIssue::UnparseableNumber, raw_text(value)));
            0
        }
        Some(n) if n < 0.0 => {
            warnings.push(warning(field, WarningIssue::NegativeNumber, raw_text(value)));
            0
        }
        Some(n) => whole_count(n, field, value, warnings),
    }
}

/// Truncate a non-negative count to u32, warning on fractions and overflow.
fn whole_count(n: f64, field: Field, value: &Value, warnings: &mut Vec<DataQualityWarning>) -> u32 {
    if n.fract() != 0.0 {
        warnings.push(warning(field, WarningIssue::FractionalCount, raw_text(value)));
    }
    let whole = n.trunc();
    if whole > u32::MAX as f64 {
        warnings.push(warning(field, WarningIssue::OutOfRange, raw_text(value)));
        return u32::MAX;
    }
    whole as u32
}

fn resolve_amount(fields: &RawFields<'_>, field: Field, warnings: &mut Vec<DataQualityWarning>) -> f64 {
    let Some(value) = fields.value(field) else {
        return 0.0;
    };
    match parse_numeric_value(value) {
        None => {
            warnings.push(warning(field, WarningIssue::UnparseableNumber, raw_text(value)));
            0.0
        }
        Some(n) if n < 0.0 => {
            warnings.push(warning(field, WarningIssue::NegativeNumber, raw_text(value)));
            0.0
        }
        Some(n) => n,
    }
}

// ── Dates ────────────────────────────────────────────────────────────────────

/// Day zero of spreadsheet serial dates (1900 date system, leap-bug adjusted).
fn spreadsheet_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

const SERIAL_MAX: i64 = 2_958_465; // 9999-12-31

fn from_serial(serial: i64) -> Option<NaiveDate> {
    if !(1..=SERIAL_MAX).contains(&serial) {
        return None;
    }
    spreadsheet_epoch().checked_add_signed(chrono::Duration::days(serial))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%a, %d %b %Y",
];

/// Timestamps with a time-of-day component.
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_date_value(value: &Value, prefer_day_first: bool) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => n.as_f64().and_then(|f| from_serial(f.trunc() as i64)),
        Value::String(s) => parse_date_text(s.trim(), prefer_day_first),
        _ => None,
    }
}

/// Accepts ISO, RFC 3339, month-name forms, numeric slash/dash/dot forms
/// (a component above 12 settles day vs month order) and spreadsheet serials.
pub fn parse_date_text(s: &str, prefer_day_first: bool) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Some(instant) = parse_instant(s) {
        return Some(instant.date_naive());
    }
    // Before the strftime formats: "%Y/%m/%d" would read "1/2/24" as year 1.
    if let Some(date) = parse_numeric_dmy(s, prefer_day_first) {
        return Some(date);
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(date);
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        if s.len() == 8 {
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
                return Some(date);
            }
        }
        return s.parse::<i64>().ok().and_then(from_serial);
    }
    None
}

fn parse_numeric_dmy(s: &str, prefer_day_first: bool) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split(['/', '-', '.']).collect();
    let [a, b, y] = parts.as_slice() else {
        return None;
    };
    if a.len() > 2 || b.len() > 2 || !(y.len() == 2 || y.len() == 4) {
        return None;
    }
    let a: u32 = a.parse().ok()?;
    let b: u32 = b.parse().ok()?;
    let mut year: i32 = y.parse().ok()?;
    if y.len() == 2 {
        // Same pivot as strftime's %y.
        year += if year < 69 { 2000 } else { 1900 };
    }

    let (day, month) = if a > 12 && b <= 12 {
        (a, b)
    } else if b > 12 && a <= 12 {
        (b, a)
    } else if prefer_day_first {
        (a, b)
    } else {
        (b, a)
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn folds_keys_across_spellings() {
        assert_eq!(fold_key("First Name"), "firstname");
        assert_eq!(fold_key("first_name"), "firstname");
        assert_eq!(fold_key("firstName"), "firstname");
        assert_eq!(fold_key("E-mail"), "email");
    }

    #[test]
    fn splits_names() {
        assert_eq!(split_name("Abendroth, Jennifer"), ("Jennifer".into(), "Abendroth".into()));
        assert_eq!(split_name("John Smith"), ("John".into(), "Smith".into()));
        assert_eq!(split_name("Cher"), ("Cher".into(), String::new()));
        assert_eq!(split_name("Maria van der Berg"), ("Maria".into(), "van der Berg".into()));
    }

    #[test]
    fn parses_spreadsheet_numbers() {
        assert_eq!(parse_number("$1,234.50"), Some(1234.5));
        assert_eq!(parse_number(" 12 "), Some(12.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn parses_common_date_formats() {
        assert_eq!(parse_date_text("2024-03-01", false), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date_text("2024-03-01T10:30:00Z", false), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date_text("March 5, 2024", false), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_text("5 Mar 2024", false), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_text("05-Mar-2024", false), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_text("20240305", false), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_text("45352", false), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date_text("not a date", false), None);
        assert_eq!(parse_date_text("13/13/2024", false), None);
    }

    #[test]
    fn disambiguates_slash_dates() {
        // Ambiguous: follows preference.
        assert_eq!(parse_date_text("03/04/2024", false), Some(ymd(2024, 3, 4)));
        assert_eq!(parse_date_text("03/04/2024", true), Some(ymd(2024, 4, 3)));
        // A component above 12 settles the order regardless of preference.
        assert_eq!(parse_date_text("25/04/2024", false), Some(ymd(2024, 4, 25)));
        assert_eq!(parse_date_text("04/25/2024", true), Some(ymd(2024, 4, 25)));
        // Two-digit years pivot at 69.
        assert_eq!(parse_date_text("1/2/24", false), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_date_text("1/2/85", false), Some(ymd(1985, 1, 2)));
    }

    #[test]
    fn sentinel_strings_read_as_missing() {
        for s in ["", "N/A", "#N/A", "null", " - ", "None"] {
            assert!(is_missing(&Value::String(s.into())), "{s:?} should be missing");
        }
        assert!(!is_missing(&Value::String("0".into())));
    }
}
