//! Helpers shared by the sqlx-backed stores.

use linkwise_core::StoreError;

/// SQLite result codes (as reported by `DatabaseError::code`) and Postgres
/// SQLSTATEs that mean "another writer got there first".
const CONFLICT_CODES: &[&str] = &[
    "517",   // SQLITE_BUSY_SNAPSHOT
    "40001", // serialization_failure
    "40P01", // deadlock_detected
];

/// Lock waits that outlived the busy / statement timeout.
const TIMEOUT_CODES: &[&str] = &[
    "5",     // SQLITE_BUSY
    "6",     // SQLITE_LOCKED
    "261",   // SQLITE_BUSY_RECOVERY
    "57014", // query_canceled (statement_timeout)
    "55P03", // lock_not_available
];

/// Classify a sqlx error into the store taxonomy.
pub(crate) fn store_error(context: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("{context}: timed out acquiring a connection"))
        }
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
            StoreError::Unavailable(format!("{context}: {err}"))
        }
        sqlx::Error::Database(db) => {
            let code = db.code();
            let code = code.as_deref().unwrap_or_default();
            if db.is_unique_violation() || CONFLICT_CODES.contains(&code) {
                StoreError::Conflict(format!("{context}: {}", db.message()))
            } else if TIMEOUT_CODES.contains(&code) {
                StoreError::Timeout(format!("{context}: {}", db.message()))
            } else {
                StoreError::QueryFailed(format!("{context}: {err}"))
            }
        }
        _ => StoreError::QueryFailed(format!("{context}: {err}")),
    }
}
