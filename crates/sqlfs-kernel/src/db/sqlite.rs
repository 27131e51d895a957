//! SQLite dialect.

use crate::db::dialect::{Dialect, DialectKind, InodeAllocation};
use crate::db::PoolConfig;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS metadata (
        inode INTEGER PRIMARY KEY AUTOINCREMENT,
        uid INTEGER NOT NULL,
        gid INTEGER NOT NULL,
        mode INTEGER NOT NULL,
        type INTEGER NOT NULL,
        ctime INTEGER NOT NULL,
        atime INTEGER NOT NULL,
        mtime INTEGER NOT NULL,
        name TEXT NOT NULL,
        size INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_metadata_name ON metadata(name)",
    "CREATE TABLE IF NOT EXISTS parent (
        pinode INTEGER NOT NULL,
        inode INTEGER NOT NULL UNIQUE
    )",
    "CREATE INDEX IF NOT EXISTS idx_parent_pinode ON parent(pinode, inode)",
    "CREATE TABLE IF NOT EXISTS filedata (
        inode INTEGER PRIMARY KEY,
        data BLOB NOT NULL
    )",
];

/// SQLite, through a single pooled connection.
///
/// SQLite allows one writer at a time; with a one-connection pool writers
/// queue in the pool instead of failing with `SQLITE_BUSY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn pool_config(&self, base: &PoolConfig) -> PoolConfig {
        PoolConfig {
            max_connections: 1,
            min_connections: base.min_connections.min(1),
            ..base.clone()
        }
    }

    fn schema(&self) -> &'static [&'static str] {
        SCHEMA
    }

    fn seed_root_sql(&self) -> &'static str {
        "INSERT OR IGNORE INTO metadata (inode, uid, gid, mode, type, ctime, atime, mtime, name, size)
         VALUES (1, ?, ?, ?, ?, ?, ?, ?, '', 0)"
    }

    /// The sqlx `Any` driver never reports `last_insert_rowid()` for
    /// SQLite, so the id is read back with `RETURNING` (SQLite 3.35+).
    fn allocation(&self) -> InodeAllocation {
        InodeAllocation::Returning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_connection() {
        let pool = Sqlite.pool_config(&PoolConfig::default());
        assert_eq!(pool.max_connections, 1);
        assert!(pool.min_connections <= 1);
    }

    #[test]
    fn test_allocates_with_returning() {
        assert_eq!(Sqlite.allocation(), InodeAllocation::Returning);
    }
}
