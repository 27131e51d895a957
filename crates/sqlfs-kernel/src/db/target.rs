//! Connection target parsing.
//!
//! A target is written `backend://dsn`, e.g. `sqlite://fs.sql` or
//! `postgres://fs:secret@db/fs`. The scheme picks the dialect; the rest is
//! handed to the driver.

use std::fmt;
use std::str::FromStr;

use crate::db::dialect::DialectKind;
use crate::vfs::{VfsError, VfsResult};

/// A parsed `backend://dsn` connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    kind: DialectKind,
    dsn: String,
}

impl ConnectionTarget {
    pub fn new(kind: DialectKind, dsn: impl Into<String>) -> VfsResult<Self> {
        let dsn = dsn.into();
        if dsn.is_empty() {
            return Err(VfsError::config(format!("empty {} connection string", kind)));
        }
        if kind == DialectKind::Sqlite && dsn.starts_with(":memory:") {
            // Every pooled connection would see its own empty database.
            return Err(VfsError::config("in-memory sqlite databases cannot be mounted"));
        }
        Ok(Self { kind, dsn })
    }

    /// Parse a `backend://dsn` URI.
    pub fn parse(uri: &str) -> VfsResult<Self> {
        let (scheme, dsn) = uri.split_once("://").ok_or_else(|| {
            VfsError::config(format!(
                "connection target must look like backend://dsn (available backends: {})",
                DialectKind::available()
            ))
        })?;
        let kind = DialectKind::from_scheme(scheme).ok_or_else(|| {
            VfsError::config(format!(
                "unknown backend {scheme:?} (available backends: {})",
                DialectKind::available()
            ))
        })?;
        Self::new(kind, dsn)
    }

    pub fn kind(&self) -> DialectKind {
        self.kind
    }

    /// The part after `://`.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// URL handed to the sqlx `Any` driver.
    ///
    /// SQLite files are created on first connect.
    pub fn url(&self) -> String {
        match self.kind {
            DialectKind::Sqlite => {
                let sep = if self.dsn.contains('?') { '&' } else { '?' };
                if self.dsn.contains("mode=") {
                    format!("sqlite://{}", self.dsn)
                } else {
                    format!("sqlite://{}{sep}mode=rwc", self.dsn)
                }
            }
            kind => format!("{}://{}", kind.scheme(), self.dsn),
        }
    }

    /// The target with any password replaced by `***`, for logs.
    pub fn redacted(&self) -> String {
        let dsn = match self.dsn.rsplit_once('@') {
            Some((userinfo, host)) => match userinfo.split_once(':') {
                Some((user, _)) => format!("{user}:***@{host}"),
                None => self.dsn.clone(),
            },
            None => self.dsn.clone(),
        };
        format!("{}://{}", self.kind.scheme(), dsn)
    }
}

impl FromStr for ConnectionTarget {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schemes() {
        let t = ConnectionTarget::parse("sqlite://fs.sql").unwrap();
        assert_eq!(t.kind(), DialectKind::Sqlite);
        assert_eq!(t.dsn(), "fs.sql");

        let t = ConnectionTarget::parse("mariadb://fs:pw@localhost/fs").unwrap();
        assert_eq!(t.kind(), DialectKind::MySql);
        assert_eq!(t.url(), "mysql://fs:pw@localhost/fs");

        let t = ConnectionTarget::parse("postgresql://fs@localhost/fs").unwrap();
        assert_eq!(t.kind(), DialectKind::Postgres);
        assert_eq!(t.url(), "postgres://fs@localhost/fs");
    }

    #[test]
    fn test_sqlite_url_creates_file() {
        let t = ConnectionTarget::parse("sqlite:///tmp/fs.sql").unwrap();
        assert_eq!(t.url(), "sqlite:///tmp/fs.sql?mode=rwc");

        let t = ConnectionTarget::parse("sqlite://fs.sql?cache=shared").unwrap();
        assert_eq!(t.url(), "sqlite://fs.sql?cache=shared&mode=rwc");

        let t = ConnectionTarget::parse("sqlite://fs.sql?mode=ro").unwrap();
        assert_eq!(t.url(), "sqlite://fs.sql?mode=ro");
    }

    #[test]
    fn test_parse_errors() {
        let err = ConnectionTarget::parse("oracle://scott@db").unwrap_err();
        assert!(matches!(err, VfsError::Config(_)));
        assert!(err.to_string().contains("sqlite"));

        assert!(ConnectionTarget::parse("fs.sql").is_err());
        assert!(ConnectionTarget::parse("sqlite://").is_err());
        assert!(ConnectionTarget::parse("sqlite://:memory:").is_err());
    }

    #[test]
    fn test_redacted() {
        let t = ConnectionTarget::parse("mysql://fs:hunter2@db:3306/fs").unwrap();
        assert_eq!(t.redacted(), "mysql://fs:***@db:3306/fs");
        assert!(!t.to_string().contains("hunter2"));

        let t = ConnectionTarget::parse("postgres://fs@db/fs").unwrap();
        assert_eq!(t.redacted(), "postgres://fs@db/fs");
    }
}
