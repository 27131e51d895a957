//! Relational persistence.
//!
//! A [`Store`] owns the connection pool and the three stores that jointly
//! describe every inode:
//!
//! - [`InodeStore`] - attribute records (`metadata`)
//! - [`EdgeStore`] - parent→child edges (`parent`)
//! - [`ContentStore`] - file content (`filedata`)
//!
//! Store methods take a connection, usually a transaction from
//! [`Store::begin`], so composite operations commit or roll back as a unit.
//! Engine differences live behind [`Dialect`].

mod content;
mod dialect;
mod edge;
mod inode;
mod mysql;
mod postgres;
mod sql;
mod sqlite;
mod target;

pub use content::ContentStore;
pub use dialect::{Dialect, DialectKind, InodeAllocation, Placeholders};
pub use edge::EdgeStore;
pub use inode::InodeStore;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use sql::Sql;
pub use sqlite::Sqlite;
pub use target::ConnectionTarget;

use serde::{Deserialize, Serialize};
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::vfs::{nanos_since_epoch, FileAttr, FileType, Inode, Owner, VfsError, VfsResult, ROOT_INODE};

/// An open transaction. Dereferences to the connection store methods take.
pub type Transaction = sqlx::Transaction<'static, Any>;

/// Connection pool settings.
///
/// Dialects adjust these (see [`Dialect::pool_config`]); SQLite always gets a
/// single connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long an operation waits for a free connection. Long by default
    /// so that an exhausted pool queues callers.
    pub acquire_timeout_secs: u64,
    pub max_lifetime_secs: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 60 * 60,
            max_lifetime_secs: None,
        }
    }
}

/// Handle to an initialized (or to-be-initialized) relational namespace.
#[derive(Debug, Clone)]
pub struct Store {
    pool: AnyPool,
    dialect: &'static dyn Dialect,
    sql: Arc<Sql>,
    inodes: InodeStore,
    edges: EdgeStore,
    content: ContentStore,
}

impl Store {
    /// Open a pool to `target`. Does not touch the schema.
    pub async fn connect(target: &ConnectionTarget, pool: &PoolConfig) -> VfsResult<Self> {
        install_default_drivers();
        let dialect = target.kind().dialect();
        let cfg = dialect.pool_config(pool);

        info!(uri = %target, dialect = dialect.name(), max_connections = cfg.max_connections, "connecting");
        let pool = AnyPoolOptions::new()
            .max_connections(cfg.max_connections)
            .min_connections(cfg.min_connections)
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .max_lifetime(cfg.max_lifetime_secs.map(Duration::from_secs))
            .connect(&target.url())
            .await?;

        let sql = Arc::new(Sql::new(dialect));
        let inodes = InodeStore::new(sql.clone());
        let edges = EdgeStore::new(sql.clone());
        let content = ContentStore::new(sql.clone(), inodes.clone());
        Ok(Self {
            pool,
            dialect,
            sql,
            inodes,
            edges,
            content,
        })
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn inodes(&self) -> &InodeStore {
        &self.inodes
    }

    pub fn edges(&self) -> &EdgeStore {
        &self.edges
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Start a transaction.
    pub async fn begin(&self) -> VfsResult<Transaction> {
        Ok(self.pool.begin().await?)
    }

    /// Check out a plain connection, for single-statement reads.
    pub async fn acquire(&self) -> VfsResult<PoolConnection<Any>> {
        Ok(self.pool.acquire().await?)
    }

    /// Create the tables and indexes if missing and seed the root directory,
    /// owned by `owner`. Safe to run against an initialized store.
    pub async fn initialize(&self, owner: Owner) -> VfsResult<()> {
        let mut conn = self.acquire().await?;
        for stmt in self.dialect.schema() {
            debug!(stmt = %stmt.lines().next().unwrap_or_default(), "bootstrap");
            sqlx::query(stmt).execute(&mut *conn).await?;
        }

        let now = nanos_since_epoch(SystemTime::now());
        let kind = FileType::Directory;
        let result = sqlx::query(self.dialect.seed_root_sql())
            .bind(i64::from(owner.uid))
            .bind(i64::from(owner.gid))
            .bind(i64::from(kind.default_mode()))
            .bind(kind.dirent_type())
            .bind(now)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            info!(dialect = self.dialect.name(), "schema present, root already seeded");
        } else {
            info!(dialect = self.dialect.name(), uid = owner.uid, gid = owner.gid, "initialized");
        }
        Ok(())
    }

    /// Check that the store has the expected tables and a root directory.
    ///
    /// Connection failures are store errors; anything else wrong is an
    /// integrity error.
    pub async fn verify(&self) -> VfsResult<FileAttr> {
        let mut conn = self.acquire().await?;
        let root = self
            .inodes
            .find(&mut conn, ROOT_INODE)
            .await
            .map_err(|e| VfsError::integrity(format!("cannot read root entry: {e}")))?
            .ok_or_else(|| VfsError::integrity("root entry missing"))?;

        if !root.name.is_empty() {
            return Err(VfsError::integrity(format!("root entry is named {:?}", root.name)));
        }
        if !root.is_dir() {
            return Err(VfsError::integrity("root entry is not a directory"));
        }

        for (table, stmt) in [("parent", &self.sql.count_edges), ("filedata", &self.sql.count_content)] {
            sqlx::query(stmt)
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| VfsError::integrity(format!("table {table} unusable: {e}")))?;
        }

        info!(dialect = self.dialect.name(), "verified");
        Ok(root)
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Inode numbers are stored as signed 64-bit integers. Anything larger can
/// never have been allocated.
pub(crate) fn to_db_id(ino: Inode) -> VfsResult<i64> {
    i64::try_from(ino).map_err(|_| VfsError::not_found(format!("inode {ino}")))
}

pub(crate) fn from_db_id(id: i64) -> VfsResult<Inode> {
    Inode::try_from(id).map_err(|_| VfsError::integrity(format!("negative inode number {id}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ConnectionTarget, PoolConfig, Store};
    use crate::vfs::Owner;

    /// An initialized SQLite store in a temporary directory. Keep the
    /// directory alive for as long as the store.
    pub(crate) async fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("sqlite://{}", dir.path().join("fs.sql").display());
        let target = ConnectionTarget::parse(&uri).unwrap();
        let store = Store::connect(&target, &PoolConfig::default()).await.unwrap();
        store.initialize(Owner::new(1000, 1000)).await.unwrap();
        (dir, store)
    }
}
