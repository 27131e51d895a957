//! MySQL / MariaDB dialect.

use crate::db::dialect::{Dialect, DialectKind};
use crate::db::PoolConfig;

// MySQL has no `CREATE INDEX IF NOT EXISTS`, so indexes are declared inline.
// Names use a binary collation so lookups are case-sensitive.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS metadata (
        inode BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        uid BIGINT NOT NULL,
        gid BIGINT NOT NULL,
        mode BIGINT NOT NULL,
        type BIGINT NOT NULL,
        ctime BIGINT NOT NULL,
        atime BIGINT NOT NULL,
        mtime BIGINT NOT NULL,
        name VARCHAR(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
        size BIGINT NOT NULL DEFAULT 0,
        INDEX idx_metadata_name (name)
    )",
    "CREATE TABLE IF NOT EXISTS parent (
        pinode BIGINT NOT NULL,
        inode BIGINT NOT NULL,
        UNIQUE KEY uq_parent_inode (inode),
        INDEX idx_parent_pinode (pinode, inode)
    )",
    "CREATE TABLE IF NOT EXISTS filedata (
        inode BIGINT NOT NULL PRIMARY KEY,
        data LONGBLOB NOT NULL
    )",
];

/// Connections are recycled before server-side idle timeouts kick in.
const MAX_LIFETIME_SECS: u64 = 3 * 60;
const MAX_CONNECTIONS: u32 = 10;

/// MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn pool_config(&self, base: &PoolConfig) -> PoolConfig {
        PoolConfig {
            max_connections: base.max_connections.min(MAX_CONNECTIONS),
            max_lifetime_secs: Some(base.max_lifetime_secs.unwrap_or(MAX_LIFETIME_SECS)),
            ..base.clone()
        }
    }

    fn schema(&self) -> &'static [&'static str] {
        SCHEMA
    }

    fn seed_root_sql(&self) -> &'static str {
        "INSERT IGNORE INTO metadata (inode, uid, gid, mode, type, ctime, atime, mtime, name, size)
         VALUES (1, ?, ?, ?, ?, ?, ?, ?, '', 0)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sizing() {
        let pool = MySql.pool_config(&PoolConfig::default());
        assert_eq!(pool.max_connections, 10);
        assert_eq!(pool.max_lifetime_secs, Some(180));

        let custom = PoolConfig {
            max_connections: 4,
            max_lifetime_secs: Some(60),
            ..PoolConfig::default()
        };
        let pool = MySql.pool_config(&custom);
        assert_eq!(pool.max_connections, 4);
        assert_eq!(pool.max_lifetime_secs, Some(60));
    }
}
