//! SQLite contact store.
//!
//! Uses a single SQLite database file with two tables:
//! - `contacts`: the contact records
//! - `store_meta`: bookkeeping; its `write_epoch` row is bumped by every
//!   transaction to take the write lock up front
//!
//! Every transaction writes before it reads, so concurrent reconciliations
//! queue on `busy_timeout` and run one after another (serializable) instead
//! of failing half-way with `SQLITE_BUSY`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use linkwise_config::StoreConfig;
use linkwise_core::{
    Contact, ContactId, ContactStore, ContactTransaction, Link, LinkPrecedence, NewContact,
    StoreError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::sql::store_error;

const COLUMNS: &str =
    "id, email, phone_number, linked_id, link_precedence, created_at, updated_at";

/// A production SQLite contact store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`.
    ///
    /// Accepts `sqlite://path/to/file.db` or a bare path. Parent directories
    /// are created as needed.
    pub async fn open(url: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout())
            .pragma("foreign_keys", "ON");

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Failed to create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| store_error("Failed to open SQLite", e))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite contact store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run schema migrations: creates tables and indexes.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                email           TEXT,
                phone_number    TEXT,
                linked_id       INTEGER REFERENCES contacts(id),
                link_precedence TEXT NOT NULL
                                CHECK (link_precedence IN ('primary', 'secondary')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                CHECK (email IS NOT NULL OR phone_number IS NOT NULL),
                CHECK ((link_precedence = 'primary' AND linked_id IS NULL)
                    OR (link_precedence = 'secondary' AND linked_id IS NOT NULL))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("contacts table: {e}")))?;

        // One row per email/phone pair; a second insert of the same pair can
        // only come from a concurrent duplicate.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_contacts_identity \
             ON contacts (COALESCE(email, ''), COALESCE(phone_number, ''))",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("identity index: {e}")))?;

        for (name, column) in [
            ("idx_contacts_email", "email"),
            ("idx_contacts_phone", "phone_number"),
            ("idx_contacts_linked", "linked_id"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {name} ON contacts({column})"
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS store_meta (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("store_meta table: {e}")))?;

        sqlx::query("INSERT OR IGNORE INTO store_meta (key, value) VALUES ('write_epoch', 0)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("write_epoch row: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// How many write transactions have started against this database.
    pub async fn write_epoch(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT value FROM store_meta WHERE key = 'write_epoch'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("write_epoch", e))?;
        row.try_get("value")
            .map_err(|e| StoreError::QueryFailed(format!("value column: {e}")))
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort correctly.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("{column} '{raw}': {e}")))
}

/// Current time at the precision we store.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Parse a `Contact` from a SQLite row.
fn row_to_contact(row: &sqlx::sqlite::SqliteRow) -> Result<Contact, StoreError> {
    let column = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));

    let id: i64 = row.try_get("id").map_err(|e| column("id", e))?;
    let email: Option<String> = row.try_get("email").map_err(|e| column("email", e))?;
    let phone_number: Option<String> = row
        .try_get("phone_number")
        .map_err(|e| column("phone_number", e))?;
    let linked_id: Option<i64> = row.try_get("linked_id").map_err(|e| column("linked_id", e))?;
    let precedence: String = row
        .try_get("link_precedence")
        .map_err(|e| column("link_precedence", e))?;
    let created_at: String = row.try_get("created_at").map_err(|e| column("created_at", e))?;
    let updated_at: String = row.try_get("updated_at").map_err(|e| column("updated_at", e))?;

    let precedence = LinkPrecedence::from_str(&precedence).map_err(StoreError::QueryFailed)?;
    let link = Link::from_parts(precedence, linked_id.map(ContactId))
        .map_err(|e| StoreError::QueryFailed(format!("contact {id}: {e}")))?;

    Ok(Contact {
        id: ContactId(id),
        email,
        phone_number,
        link,
        created_at: parse_ts("created_at", &created_at)?,
        updated_at: parse_ts("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl ContactStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn begin(&self) -> Result<Box<dyn ContactTransaction>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("BEGIN", e))?;

        sqlx::query("UPDATE store_meta SET value = value + 1 WHERE key = 'write_epoch'")
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("write lock", e))?;

        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn list_all(&self) -> Result<Vec<Contact>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM contacts ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("list contacts", e))?;

        rows.iter().map(row_to_contact).collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM contacts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("COUNT", e))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;

        Ok(cnt as usize)
    }
}

/// An open SQLite transaction. Dropping it rolls back.
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl ContactTransaction for SqliteTransaction {
    async fn find_by_email_or_phone(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError> {
        let filter = match (email, phone) {
            (Some(_), Some(_)) => "email = ?1 OR phone_number = ?2",
            (Some(_), None) => "email = ?1",
            (None, Some(_)) => "phone_number = ?1",
            (None, None) => return Ok(Vec::new()),
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM contacts WHERE {filter} ORDER BY created_at ASC, id ASC"
        );

        let mut query = sqlx::query(&sql);
        for value in [email, phone].into_iter().flatten() {
            query = query.bind(value);
        }

        let rows = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| store_error("find by email or phone", e))?;

        rows.iter().map(row_to_contact).collect()
    }

    async fn get(&mut self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM contacts WHERE id = ?1"))
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| store_error("GET by id", e))?;

        row.as_ref().map(row_to_contact).transpose()
    }

    async fn find_cluster(&mut self, primary_id: ContactId) -> Result<Vec<Contact>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM contacts WHERE id = ?1 OR linked_id = ?1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(primary_id.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| store_error("find cluster", e))?;

        rows.iter().map(row_to_contact).collect()
    }

    async fn insert(&mut self, contact: NewContact) -> Result<Contact, StoreError> {
        let ts = now();
        let stamp = format_ts(ts);

        let result = sqlx::query(
            r#"
            INSERT INTO contacts (email, phone_number, linked_id, link_precedence, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&contact.email)
        .bind(&contact.phone_number)
        .bind(contact.link.linked_id().map(|id| id.0))
        .bind(contact.link.precedence().as_str())
        .bind(&stamp)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| store_error("INSERT contact", e))?;

        let id = ContactId(result.last_insert_rowid());
        debug!(%id, precedence = %contact.link.precedence(), "Inserted contact");

        Ok(Contact {
            id,
            email: contact.email,
            phone_number: contact.phone_number,
            link: contact.link,
            created_at: ts,
            updated_at: ts,
        })
    }

    async fn update_link(&mut self, id: ContactId, link: Link) -> Result<(), StoreError> {
        let current = self.get(id).await?.ok_or(StoreError::NotFound(id))?;
        if current.link == link {
            return Ok(());
        }

        sqlx::query(
            "UPDATE contacts SET link_precedence = ?1, linked_id = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(link.precedence().as_str())
        .bind(link.linked_id().map(|l| l.0))
        .bind(format_ts(now()))
        .bind(id.0)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| store_error("UPDATE link", e))?;

        Ok(())
    }

    async fn relink_secondaries(
        &mut self,
        from: ContactId,
        to: ContactId,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE contacts SET linked_id = ?1, updated_at = ?2 WHERE linked_id = ?3",
        )
        .bind(to.0)
        .bind(format_ts(now()))
        .bind(from.0)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| store_error("relink secondaries", e))?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| store_error("COMMIT", e))
    }
}
