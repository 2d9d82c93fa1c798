//! SQLite-backed client repository.
//!
//! RULE: Only store.rs talks to the database.
//! Unlimited sessions are written as the -1 sentinel and never leave this
//! file in that form; rows are converted back to `Sessions` on read.

use crate::{
    client::{Client, ClientPatch, ClientStatus, Sessions},
    clock::{Clock, SystemClock},
    error::{RetentionError, RetentionResult},
    event::{ClientEvent, MutationHook, MutationHooks},
    repository::ClientRepository,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::sync::Arc;

const UNLIMITED_SENTINEL: i64 = -1;
const DATE_FORMAT: &str = "%Y-%m-%d";

const CLIENT_COLUMNS: &str = "id, first_name, last_name, email, phone, status, membership_type,
     remaining_sessions, expire_date, last_visit, visit_count, total_spend,
     created_at, updated_at";

pub struct SqliteClientStore {
    conn:  Connection,
    hooks: MutationHooks,
    clock: Arc<dyn Clock>,
}

impl SqliteClientStore {
    /// Open (or create) the client database at `path`.
    pub fn open(path: &str) -> RetentionResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RetentionResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            hooks: MutationHooks::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RetentionResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_clients.sql"))?;
        Ok(())
    }

    pub fn client_count(&self) -> RetentionResult<i64> {
        let n = self.conn.query_row("SELECT COUNT(*) FROM client", [], |row| row.get(0))?;
        Ok(n)
    }

    fn write_client(&self, c: &Client) -> RetentionResult<()> {
        let sessions = match c.remaining_sessions {
            Sessions::Unlimited => UNLIMITED_SENTINEL,
            Sessions::Count(n)  => n as i64,
        };
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO client ({CLIENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                &c.id,
                &c.first_name,
                &c.last_name,
                &c.email,
                &c.phone,
                c.status.as_str(),
                &c.membership_type,
                sessions,
                c.expire_date.map(|d| d.format(DATE_FORMAT).to_string()),
                c.last_visit.map(|d| d.format(DATE_FORMAT).to_string()),
                c.visit_count as i64,
                c.total_spend,
                c.created_at.to_rfc3339(),
                c.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

// ── Row decoding ─────────────────────────────────────────────────────────────

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| conversion_error(idx, format!("bad date '{s}': {e}")))
        })
        .transpose()
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{s}': {e}")))
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    let status: String = row.get(5)?;
    let status = ClientStatus::parse(&status)
        .ok_or_else(|| conversion_error(5, format!("unknown status '{status}'")))?;

    let sessions: i64 = row.get(7)?;
    let remaining_sessions = if sessions == UNLIMITED_SENTINEL {
        Sessions::Unlimited
    } else {
        Sessions::Count(u32::try_from(sessions).map_err(|_| {
            conversion_error(7, format!("invalid session count {sessions}"))
        })?)
    };

    Ok(Client {
        id:              row.get(0)?,
        first_name:      row.get(1)?,
        last_name:       row.get(2)?,
        email:           row.get(3)?,
        phone:           row.get(4)?,
        status,
        membership_type: row.get(6)?,
        remaining_sessions,
        expire_date:     date_column(row, 8)?,
        last_visit:      date_column(row, 9)?,
        visit_count:     row.get::<_, i64>(10)?.max(0) as u32,
        total_spend:     row.get(11)?,
        created_at:      timestamp_column(row, 12)?,
        updated_at:      timestamp_column(row, 13)?,
    })
}

impl ClientRepository for SqliteClientStore {
    fn get_all(&self) -> RetentionResult<Vec<Client>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CLIENT_COLUMNS} FROM client ORDER BY id ASC"))?;
        let rows = stmt.query_map([], client_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn get_by_id(&self, id: &str) -> RetentionResult<Option<Client>> {
        let client = self
            .conn
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM client WHERE id = ?1"),
                params![id],
                client_from_row,
            )
            .optional()?;
        Ok(client)
    }

    fn update(&mut self, id: &str, patch: &ClientPatch) -> RetentionResult<Client> {
        let mut client = self
            .get_by_id(id)?
            .ok_or_else(|| RetentionError::ClientNotFound { id: id.to_string() })?;

        let changed = patch.apply(&mut client, self.clock.now());
        if changed.is_empty() {
            return Ok(client);
        }

        self.write_client(&client)?;
        self.hooks.emit(&ClientEvent::ClientUpdated {
            client_id:      id.to_string(),
            changed_fields: changed.into_iter().map(String::from).collect(),
        });
        Ok(client)
    }

    fn insert(&mut self, client: Client) -> RetentionResult<()> {
        if client.id.trim().is_empty() {
            return Err(RetentionError::MissingClientId);
        }
        self.write_client(&client)?;
        self.hooks.emit(&ClientEvent::ClientImported { client_id: client.id });
        Ok(())
    }

    fn register_mutation_hook(&mut self, hook: MutationHook) {
        self.hooks.register(hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> SqliteClientStore {
        let store = SqliteClientStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    fn client(id: &str) -> Client {
        let mut c = Client::new(id, Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap());
        c.first_name = "Jennifer".into();
        c.last_name = "Abendroth".into();
        c.email = Some("jen@example.com".into());
        c.membership_type = Some("10-pack".into());
        c.remaining_sessions = Sessions::Count(4);
        c.expire_date = NaiveDate::from_ymd_opt(2024, 12, 31);
        c.visit_count = 6;
        c.total_spend = 350.5;
        c
    }

    #[test]
    fn unlimited_sessions_survive_the_sentinel() {
        let mut store = store();
        let mut c = client("c-1");
        c.remaining_sessions = Sessions::Unlimited;
        store.insert(c.clone()).unwrap();

        let loaded = store.get_by_id("c-1").unwrap().unwrap();
        assert_eq!(loaded.remaining_sessions, Sessions::Unlimited);
        assert_eq!(loaded, c);
    }

    #[test]
    fn update_persists_patch() {
        let mut store = store();
        store.insert(client("c-1")).unwrap();

        let patch = ClientPatch {
            last_visit: Some(NaiveDate::from_ymd_opt(2024, 5, 30)),
            status: Some(ClientStatus::AtRisk),
            ..Default::default()
        };
        store.update("c-1", &patch).unwrap();

        let loaded = store.get_by_id("c-1").unwrap().unwrap();
        assert_eq!(loaded.last_visit, NaiveDate::from_ymd_opt(2024, 5, 30));
        assert_eq!(loaded.status, ClientStatus::AtRisk);
        assert!(loaded.updated_at > loaded.created_at);
    }

    #[test]
    fn file_backed_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.db");
        let path = path.to_str().unwrap();
        {
            let mut store = SqliteClientStore::open(path).unwrap();
            store.migrate().unwrap();
            store.insert(client("c-7")).unwrap();
        }
        let store = SqliteClientStore::open(path).unwrap();
        store.migrate().unwrap();
        assert_eq!(store.client_count().unwrap(), 1);
        assert!(store.get_by_id("c-7").unwrap().is_some());
    }
}
