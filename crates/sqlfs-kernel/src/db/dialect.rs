//! Per-engine specializations.
//!
//! Each supported engine implements [`Dialect`]: pool sizing, bootstrap
//! DDL, the root seed statement and the two non-portable bits of statement
//! text (placeholder style and how a new inode number is reported). The
//! statement bodies themselves are shared and rendered by [`Sql`](super::Sql).

use std::fmt;

use crate::db::mysql::MySql;
use crate::db::postgres::Postgres;
use crate::db::sqlite::Sqlite;
use crate::db::PoolConfig;

/// Supported relational engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    Sqlite,
    MySql,
    Postgres,
}

impl DialectKind {
    pub const ALL: [DialectKind; 3] = [DialectKind::Sqlite, DialectKind::MySql, DialectKind::Postgres];

    /// Map a URI scheme to an engine. Aliases: `mariadb`, `postgresql`.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Canonical scheme, as understood by the sqlx `Any` driver.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Self::Sqlite => &Sqlite,
            Self::MySql => &MySql,
            Self::Postgres => &Postgres,
        }
    }

    /// Comma-separated list of accepted schemes, for error messages.
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|k| k.scheme())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect().name())
    }
}

/// Bind parameter syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholders {
    /// `?` for every parameter.
    Question,
    /// `$1`, `$2`, ...
    Dollar,
}

/// How the engine reports the inode number assigned by an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeAllocation {
    /// Auto-increment column; the driver reports the id (MySQL).
    LastInsertId,
    /// The id is read back with `INSERT ... RETURNING inode`.
    Returning,
}

/// Engine-specific behaviour.
///
/// Implementations are stateless; one `&'static` instance per engine is
/// handed out by [`DialectKind::dialect`].
pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> DialectKind;

    /// Human-readable engine name.
    fn name(&self) -> &'static str;

    /// Adjust the configured pool for this engine.
    fn pool_config(&self, base: &PoolConfig) -> PoolConfig {
        base.clone()
    }

    /// Idempotent bootstrap DDL, one statement per entry.
    fn schema(&self) -> &'static [&'static str];

    /// Insert the root row unless it already exists.
    ///
    /// Binds, in order: uid, gid, mode, type, ctime, atime, mtime.
    fn seed_root_sql(&self) -> &'static str;

    fn placeholders(&self) -> Placeholders {
        Placeholders::Question
    }

    fn allocation(&self) -> InodeAllocation {
        InodeAllocation::LastInsertId
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scheme() {
        assert_eq!(DialectKind::from_scheme("SQLite"), Some(DialectKind::Sqlite));
        assert_eq!(DialectKind::from_scheme("mariadb"), Some(DialectKind::MySql));
        assert_eq!(DialectKind::from_scheme("postgresql"), Some(DialectKind::Postgres));
        assert_eq!(DialectKind::from_scheme("mssql"), None);
    }

    #[test]
    fn test_dialects_agree_on_kind() {
        for kind in DialectKind::ALL {
            let dialect = kind.dialect();
            assert_eq!(dialect.kind(), kind);
            assert_eq!(DialectKind::from_scheme(kind.scheme()), Some(kind));
            assert!(!dialect.schema().is_empty());
            // One statement per entry; drivers reject batches.
            for stmt in dialect.schema() {
                assert!(!stmt.trim_end().trim_end_matches(';').contains(';'), "{stmt}");
            }
        }
    }

    #[test]
    fn test_available_lists_every_backend() {
        assert_eq!(DialectKind::available(), "sqlite, mysql, postgres");
    }
}
