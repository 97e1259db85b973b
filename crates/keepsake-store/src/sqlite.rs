// ABOUTME: SQLite-backed PersistentState storing pairs in a buckets/pairs schema.
// ABOUTME: Upserts run in a transaction and bucket deletion cascades to the bucket's pairs.

use std::fs;
use std::path::{Path, PathBuf};

use keepsake_core::StateError;
use keepsake_core::state::{PersistentState, Snapshot, Visitor, insert_into_snapshot};
use rusqlite::{Connection, params};
use thiserror::Error;

const CREATE_SCHEMA: &str = "
    BEGIN;
    CREATE TABLE IF NOT EXISTS buckets (
        id BLOB PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS pairs (
        bucket_id BLOB REFERENCES buckets (id) ON DELETE CASCADE,
        key BLOB NOT NULL,
        value BLOB NOT NULL,
        PRIMARY KEY (bucket_id, key)
    );
    COMMIT;
";

const GET_QUERY: &str = "SELECT value FROM pairs WHERE bucket_id = ?1 AND key = ?2";
const FOR_EACH_QUERY: &str = "SELECT key, value FROM pairs WHERE bucket_id = ?1";
const ALL_PAIRS_QUERY: &str = "SELECT bucket_id, key, value FROM pairs";
const DELETE_QUERY: &str = "DELETE FROM pairs WHERE bucket_id = ?1 AND key = ?2";
const DELETE_BUCKET_QUERY: &str = "DELETE FROM buckets WHERE id = ?1";
const INSERT_BUCKET_QUERY: &str = "INSERT OR IGNORE INTO buckets (id) VALUES (?1)";
const UPSERT_PAIR_QUERY: &str =
    "INSERT OR REPLACE INTO pairs (bucket_id, key, value) VALUES (?1, ?2, ?3)";

/// Errors that can occur while opening or querying the SQLite store.
#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SqliteError> for StateError {
    fn from(err: SqliteError) -> Self {
        StateError::storage(err)
    }
}

fn storage(err: rusqlite::Error) -> StateError {
    SqliteError::from(err).into()
}

/// A PersistentState persisted in a SQLite database.
///
/// Once closed, every operation returns `StateError::Closed`; stored pairs
/// are only readable again by reopening the database.
pub struct SqlitePersistentState {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqlitePersistentState {
    /// Open or create a state database at the given path or `file:` URI.
    /// Creates missing parent directories for plain paths and ensures the
    /// schema exists.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        let is_uri = path.to_str().is_some_and(|p| p.starts_with("file:"));
        if !is_uri
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, path.to_path_buf())
    }

    /// Open a private database that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self, SqliteError> {
        // Cascading bucket deletes depend on foreign key enforcement.
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(CREATE_SCHEMA)?;
        tracing::debug!(path = %path.display(), "opened persistent state");

        Ok(Self {
            path,
            conn: Some(conn),
        })
    }

    /// The locator this store was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `close` has released the connection.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn conn(&self) -> Result<&Connection, StateError> {
        self.conn.as_ref().ok_or(StateError::Closed)
    }

    /// Visit every pair of every bucket.
    fn for_all(
        &self,
        visit: &mut dyn FnMut(&[u8], &[u8], &[u8]) -> Result<(), StateError>,
    ) -> Result<(), StateError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(ALL_PAIRS_QUERY).map_err(storage)?;
        let mut rows = stmt.query([]).map_err(storage)?;

        while let Some(row) = rows.next().map_err(storage)? {
            let bucket: Vec<u8> = row.get(0).map_err(storage)?;
            let key: Vec<u8> = row.get(1).map_err(storage)?;
            let value: Vec<u8> = row.get(2).map_err(storage)?;
            visit(&bucket, &key, &value)?;
        }

        Ok(())
    }
}

impl PersistentState for SqlitePersistentState {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(GET_QUERY).map_err(storage)?;

        match stmt.query_row(params![bucket, key], |row| row.get::<_, Vec<u8>>(0)) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    fn set(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<(), StateError> {
        let conn = self.conn.as_mut().ok_or(StateError::Closed)?;
        let tx = conn.transaction().map_err(storage)?;
        tx.execute(INSERT_BUCKET_QUERY, params![bucket])
            .map_err(storage)?;
        tx.execute(UPSERT_PAIR_QUERY, params![bucket, key, value])
            .map_err(storage)?;
        tx.commit().map_err(storage)?;

        tracing::trace!(bucket = %String::from_utf8_lossy(bucket), "set pair");
        Ok(())
    }

    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<(), StateError> {
        self.conn()?
            .execute(DELETE_QUERY, params![bucket, key])
            .map_err(storage)?;
        Ok(())
    }

    fn delete_bucket(&mut self, bucket: &[u8]) -> Result<(), StateError> {
        let removed = self
            .conn()?
            .execute(DELETE_BUCKET_QUERY, params![bucket])
            .map_err(storage)?;

        tracing::debug!(
            bucket = %String::from_utf8_lossy(bucket),
            removed,
            "deleted bucket"
        );
        Ok(())
    }

    fn for_each(&self, bucket: &[u8], visit: &mut Visitor<'_>) -> Result<(), StateError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(FOR_EACH_QUERY).map_err(storage)?;
        let mut rows = stmt.query(params![bucket]).map_err(storage)?;

        while let Some(row) = rows.next().map_err(storage)? {
            let key: Vec<u8> = row.get(0).map_err(storage)?;
            let value: Vec<u8> = row.get(1).map_err(storage)?;
            visit(&key, &value)?;
        }

        Ok(())
    }

    fn copy_to(&self, other: &mut dyn PersistentState) -> Result<(), StateError> {
        let mut copied = 0usize;
        self.for_all(&mut |bucket, key, value| {
            other.set(bucket, key, value)?;
            copied += 1;
            Ok(())
        })?;

        tracing::debug!(pairs = copied, "copied persistent state");
        Ok(())
    }

    fn data(&self) -> Result<Snapshot, StateError> {
        let mut snapshot = Snapshot::new();
        self.for_all(&mut |bucket, key, value| {
            insert_into_snapshot(&mut snapshot, bucket, key, value);
            Ok(())
        })?;
        Ok(snapshot)
    }

    fn close(&mut self) -> Result<(), StateError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "closed persistent state");
                Ok(())
            }
            Err((conn, err)) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to close persistent state");
                self.conn = Some(conn);
                Err(storage(err))
            }
        }
    }
}

impl Drop for SqlitePersistentState {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "persistent state dropped without a clean close");
        }
    }
}
