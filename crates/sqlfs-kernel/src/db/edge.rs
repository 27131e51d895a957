//! Namespace edge store: `parent(pinode, inode)` rows forming the tree.

use sqlx::{AnyConnection, Row};
use std::sync::Arc;

use crate::db::{from_db_id, to_db_id, Sql};
use crate::vfs::{Inode, VfsError, VfsResult};

/// CRUD over parent→child edges.
#[derive(Debug, Clone)]
pub struct EdgeStore {
    sql: Arc<Sql>,
}

impl EdgeStore {
    pub(crate) fn new(sql: Arc<Sql>) -> Self {
        Self { sql }
    }

    /// Child inodes of `parent`, in no particular order.
    pub async fn children(&self, conn: &mut AnyConnection, parent: Inode) -> VfsResult<Vec<Inode>> {
        let rows = sqlx::query(&self.sql.children)
            .bind(to_db_id(parent)?)
            .fetch_all(&mut *conn)
            .await?;
        rows.iter()
            .map(|row| from_db_id(row.try_get("inode")?))
            .collect()
    }

    /// Resolve `name` among the children of `parent` with a single indexed
    /// query.
    pub async fn child_by_name(
        &self,
        conn: &mut AnyConnection,
        parent: Inode,
        name: &str,
    ) -> VfsResult<Option<Inode>> {
        let row = sqlx::query(&self.sql.child_by_name)
            .bind(to_db_id(parent)?)
            .bind(name.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => Ok(Some(from_db_id(row.try_get("inode")?)?)),
            None => Ok(None),
        }
    }

    /// Record `child` as an entry of `parent`.
    ///
    /// Fails with a store error if `child` already has a parent.
    pub async fn link(&self, conn: &mut AnyConnection, parent: Inode, child: Inode) -> VfsResult<()> {
        sqlx::query(&self.sql.link)
            .bind(to_db_id(parent)?)
            .bind(to_db_id(child)?)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn unlink(&self, conn: &mut AnyConnection, parent: Inode, child: Inode) -> VfsResult<()> {
        let result = sqlx::query(&self.sql.unlink)
            .bind(to_db_id(parent)?)
            .bind(to_db_id(child)?)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(VfsError::not_found(format!("inode {child} in inode {parent}")));
        }
        Ok(())
    }

    pub async fn child_count(&self, conn: &mut AnyConnection, parent: Inode) -> VfsResult<u64> {
        let row = sqlx::query(&self.sql.child_count)
            .bind(to_db_id(parent)?)
            .fetch_one(&mut *conn)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }
}
