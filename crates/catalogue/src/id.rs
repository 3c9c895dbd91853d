//! Unique Identifier Allocation
//!
//! Archive files and recycle-log entries carry identifiers that are unique
//! for the lifetime of the catalogue and are never reused, even across
//! deletes. How the backend hands them out differs per engine, so the
//! allocation step is a strategy the dialect selects.
//!
//! Allocation always happens on the caller's connection, inside the
//! caller's transaction, so an aborted insert never burns a visible id
//! out of order with its row.

use crate::error::{DbResultExt, ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::{Row, SqliteConnection};

/// Hands out the next unique id for one entity kind.
#[async_trait]
pub trait IdAllocator: Send + Sync {
    async fn next_id(&self, conn: &mut SqliteConnection) -> Result<u64>;
}

/// Allocates by inserting a placeholder row into a dedicated
/// auto-increment counter table, reading back the generated rowid, then
/// deleting the placeholder. The counter table's auto-increment state
/// survives the delete, so ids are never reused.
pub struct CounterTableIdAllocator {
    insert_sql: &'static str,
    select_sql: &'static str,
    delete_sql: &'static str,
}

impl CounterTableIdAllocator {
    /// Allocator over the `archive_file_id` counter table.
    pub fn archive_file_sqlite() -> Self {
        Self {
            insert_sql: "INSERT INTO archive_file_id (id) VALUES (NULL)",
            select_sql: "SELECT LAST_INSERT_ROWID() AS id",
            delete_sql: "DELETE FROM archive_file_id WHERE id = ?",
        }
    }

    /// Allocator over the `file_recycle_log_id` counter table.
    pub fn recycle_log_sqlite() -> Self {
        Self {
            insert_sql: "INSERT INTO file_recycle_log_id (id) VALUES (NULL)",
            select_sql: "SELECT LAST_INSERT_ROWID() AS id",
            delete_sql: "DELETE FROM file_recycle_log_id WHERE id = ?",
        }
    }

    pub fn archive_file_mysql() -> Self {
        Self {
            insert_sql: "INSERT INTO archive_file_id (id) VALUES (NULL)",
            select_sql: "SELECT LAST_INSERT_ID() AS id",
            delete_sql: "DELETE FROM archive_file_id WHERE id = ?",
        }
    }

    pub fn recycle_log_mysql() -> Self {
        Self {
            insert_sql: "INSERT INTO file_recycle_log_id (id) VALUES (NULL)",
            select_sql: "SELECT LAST_INSERT_ID() AS id",
            delete_sql: "DELETE FROM file_recycle_log_id WHERE id = ?",
        }
    }
}

#[async_trait]
impl IdAllocator for CounterTableIdAllocator {
    async fn next_id(&self, conn: &mut SqliteConnection) -> Result<u64> {
        sqlx::query(self.insert_sql).execute(&mut *conn).await.or_db_err()?;
        let rows = sqlx::query(self.select_sql).fetch_all(&mut *conn).await.or_db_err()?;
        if rows.len() != 1 {
            exn::bail!(ErrorKind::Inconsistency(
                "id counter table returned an unexpected number of rows"
            ));
        }
        let id: i64 = rows[0].try_get("id").or_db_err()?;
        sqlx::query(self.delete_sql).bind(id).execute(&mut *conn).await.or_db_err()?;
        u64::try_from(id).or_raise(|| ErrorKind::InvalidData("id counter produced a negative id"))
    }
}

/// Allocates from the sequence backing a serial column, with a single
/// `NEXTVAL('name')` round trip.
pub struct SerialIdAllocator {
    select_sql: &'static str,
}

impl SerialIdAllocator {
    pub fn archive_file() -> Self {
        Self { select_sql: "SELECT NEXTVAL('archive_file_id_seq') AS id" }
    }

    pub fn recycle_log() -> Self {
        Self { select_sql: "SELECT NEXTVAL('file_recycle_log_id_seq') AS id" }
    }
}

#[async_trait]
impl IdAllocator for SerialIdAllocator {
    async fn next_id(&self, conn: &mut SqliteConnection) -> Result<u64> {
        let id: i64 = sqlx::query_scalar(self.select_sql).fetch_one(&mut *conn).await.or_db_err()?;
        u64::try_from(id).or_raise(|| ErrorKind::InvalidData("sequence produced a negative id"))
    }
}

/// Allocates from a first-class sequence object in a single round trip,
/// for engines where sequences are addressed as `name.NEXTVAL`.
pub struct SequenceIdAllocator {
    select_sql: &'static str,
}

impl SequenceIdAllocator {
    pub fn archive_file() -> Self {
        Self { select_sql: "SELECT archive_file_id_seq.NEXTVAL AS id FROM DUAL" }
    }

    pub fn recycle_log() -> Self {
        Self { select_sql: "SELECT file_recycle_log_id_seq.NEXTVAL AS id FROM DUAL" }
    }
}

#[async_trait]
impl IdAllocator for SequenceIdAllocator {
    async fn next_id(&self, conn: &mut SqliteConnection) -> Result<u64> {
        let id: i64 = sqlx::query_scalar(self.select_sql).fetch_one(&mut *conn).await.or_db_err()?;
        u64::try_from(id).or_raise(|| ErrorKind::InvalidData("sequence produced a negative id"))
    }
}
