//! Backend Dialect Selection
//!
//! The catalogue runs on one embedded engine, but its write paths were
//! shaped by several. The dialect bundles the per-engine decisions: how
//! ids are allocated and whether a restore must mark the destination tape
//! dirty for consistency-checker reconciliation.

use crate::id::{CounterTableIdAllocator, IdAllocator, SerialIdAllocator};
use std::sync::Arc;

/// Database engine flavour the catalogue schema is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl Dialect {
    /// Id allocation strategy for archive files.
    pub fn archive_file_id_allocator(self) -> Arc<dyn IdAllocator> {
        match self {
            Self::Sqlite => Arc::new(CounterTableIdAllocator::archive_file_sqlite()),
            Self::Mysql => Arc::new(CounterTableIdAllocator::archive_file_mysql()),
            Self::Postgres => Arc::new(SerialIdAllocator::archive_file()),
        }
    }

    /// Id allocation strategy for recycle-log entries.
    pub fn recycle_log_id_allocator(self) -> Arc<dyn IdAllocator> {
        match self {
            Self::Sqlite => Arc::new(CounterTableIdAllocator::recycle_log_sqlite()),
            Self::Mysql => Arc::new(CounterTableIdAllocator::recycle_log_mysql()),
            Self::Postgres => Arc::new(SerialIdAllocator::recycle_log()),
        }
    }

    /// Whether restoring a recycled copy marks the destination tape dirty,
    /// forcing the next consistency check to re-reconcile it.
    pub fn marks_tape_dirty_on_restore(self) -> bool {
        matches!(self, Self::Postgres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_postgres_marks_tape_dirty_on_restore() {
        assert!(Dialect::Postgres.marks_tape_dirty_on_restore());
        assert!(!Dialect::Sqlite.marks_tape_dirty_on_restore());
        assert!(!Dialect::Mysql.marks_tape_dirty_on_restore());
    }
}
