//! Inode/attribute store: one `metadata` row per inode.

use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};
use std::sync::Arc;
use std::time::SystemTime;

use crate::db::dialect::InodeAllocation;
use crate::db::{from_db_id, to_db_id, Sql};
use crate::vfs::{
    nanos_since_epoch, system_time_from_nanos, FileAttr, FileType, Inode, Owner, VfsError,
    VfsResult,
};

/// CRUD over attribute records.
///
/// Every method runs on the connection it is given, so callers decide the
/// transaction boundary.
#[derive(Debug, Clone)]
pub struct InodeStore {
    sql: Arc<Sql>,
}

impl InodeStore {
    pub(crate) fn new(sql: Arc<Sql>) -> Self {
        Self { sql }
    }

    /// Fetch the attribute record for `ino`, if there is one.
    pub async fn find(&self, conn: &mut AnyConnection, ino: Inode) -> VfsResult<Option<FileAttr>> {
        let row = sqlx::query(&self.sql.get_inode)
            .bind(to_db_id(ino)?)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(attr_from_row).transpose()
    }

    /// Fetch the attribute record for `ino`.
    pub async fn get(&self, conn: &mut AnyConnection, ino: Inode) -> VfsResult<FileAttr> {
        self.find(conn, ino)
            .await?
            .ok_or_else(|| VfsError::not_found(format!("inode {ino}")))
    }

    pub async fn exists(&self, conn: &mut AnyConnection, ino: Inode) -> VfsResult<bool> {
        let row = sqlx::query(&self.sql.inode_exists)
            .bind(to_db_id(ino)?)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    /// Overwrite every column of the record for `attr.ino`.
    pub async fn set(&self, conn: &mut AnyConnection, attr: &FileAttr) -> VfsResult<()> {
        let result = sqlx::query(&self.sql.update_inode)
            .bind(i64::from(attr.uid))
            .bind(i64::from(attr.gid))
            .bind(i64::from(attr.mode))
            .bind(attr.kind.dirent_type())
            .bind(nanos_since_epoch(attr.ctime))
            .bind(nanos_since_epoch(attr.atime))
            .bind(nanos_since_epoch(attr.mtime))
            .bind(attr.name.clone())
            .bind(size_to_db(attr.size)?)
            .bind(to_db_id(attr.ino)?)
            .execute(&mut *conn)
            .await?;
        self.ensure_updated(conn, attr.ino, result.rows_affected()).await
    }

    /// Create a record with a fresh inode number, the default mode for
    /// `kind`, zero size and every timestamp set to `now`.
    pub async fn allocate(
        &self,
        conn: &mut AnyConnection,
        kind: FileType,
        name: &str,
        owner: Owner,
        now: SystemTime,
    ) -> VfsResult<FileAttr> {
        let now_ns = nanos_since_epoch(now);
        let query = sqlx::query(&self.sql.insert_inode)
            .bind(i64::from(owner.uid))
            .bind(i64::from(owner.gid))
            .bind(i64::from(kind.default_mode()))
            .bind(kind.dirent_type())
            .bind(now_ns)
            .bind(now_ns)
            .bind(now_ns)
            .bind(name.to_string());

        let id = match self.sql.allocation {
            InodeAllocation::LastInsertId => query
                .execute(&mut *conn)
                .await?
                .last_insert_id()
                .ok_or_else(|| VfsError::other("driver did not report the new inode number"))?,
            InodeAllocation::Returning => query.fetch_one(&mut *conn).await?.try_get("inode")?,
        };

        Ok(FileAttr::new(from_db_id(id)?, name, kind, owner, now))
    }

    pub async fn delete(&self, conn: &mut AnyConnection, ino: Inode) -> VfsResult<()> {
        sqlx::query(&self.sql.delete_inode)
            .bind(to_db_id(ino)?)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn touch_atime(&self, conn: &mut AnyConnection, ino: Inode, now: SystemTime) -> VfsResult<()> {
        let result = sqlx::query(&self.sql.touch_atime)
            .bind(nanos_since_epoch(now))
            .bind(to_db_id(ino)?)
            .execute(&mut *conn)
            .await?;
        self.ensure_updated(conn, ino, result.rows_affected()).await
    }

    /// Record a new content length and modification time.
    pub async fn set_size(
        &self,
        conn: &mut AnyConnection,
        ino: Inode,
        size: u64,
        now: SystemTime,
    ) -> VfsResult<()> {
        let result = sqlx::query(&self.sql.set_size)
            .bind(size_to_db(size)?)
            .bind(nanos_since_epoch(now))
            .bind(to_db_id(ino)?)
            .execute(&mut *conn)
            .await?;
        self.ensure_updated(conn, ino, result.rows_affected()).await
    }

    /// MySQL reports zero affected rows when an update leaves the row
    /// unchanged, so zero only means NotFound if the row is really gone.
    async fn ensure_updated(&self, conn: &mut AnyConnection, ino: Inode, rows: u64) -> VfsResult<()> {
        if rows == 0 && !self.exists(conn, ino).await? {
            return Err(VfsError::not_found(format!("inode {ino}")));
        }
        Ok(())
    }
}

fn attr_from_row(row: &AnyRow) -> VfsResult<FileAttr> {
    let ino = from_db_id(row.try_get("inode")?)?;
    let code: i64 = row.try_get("type")?;
    let kind = FileType::from_dirent_type(code)
        .ok_or_else(|| VfsError::integrity(format!("inode {ino}: unknown type code {code}")))?;
    let size: i64 = row.try_get("size")?;

    Ok(FileAttr {
        ino,
        name: row.try_get("name")?,
        kind,
        mode: u32_column(row, ino, "mode")?,
        uid: u32_column(row, ino, "uid")?,
        gid: u32_column(row, ino, "gid")?,
        size: u64::try_from(size)
            .map_err(|_| VfsError::integrity(format!("inode {ino}: negative size {size}")))?,
        ctime: system_time_from_nanos(row.try_get("ctime")?),
        atime: system_time_from_nanos(row.try_get("atime")?),
        mtime: system_time_from_nanos(row.try_get("mtime")?),
    })
}

fn u32_column(row: &AnyRow, ino: Inode, column: &str) -> VfsResult<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| VfsError::integrity(format!("inode {ino}: {column} {value} out of range")))
}

fn size_to_db(size: u64) -> VfsResult<i64> {
    i64::try_from(size).map_err(|_| VfsError::other(format!("size {size} out of range")))
}

#[cfg(test)]
mod tests {
    use crate::db::testing::temp_store;
    use crate::vfs::{FileType, Owner, ROOT_INODE};
    use std::time::{Duration, SystemTime};

    #[tokio::test]
    async fn test_allocate_and_get() {
        let (_dir, store) = temp_store().await;
        let mut tx = store.begin().await.unwrap();
        let now = SystemTime::now();

        let attr = store
            .inodes()
            .allocate(&mut tx, FileType::File, "a.txt", Owner::new(7, 8), now)
            .await
            .unwrap();
        assert!(attr.ino > ROOT_INODE);

        let stored = store.inodes().get(&mut tx, attr.ino).await.unwrap();
        assert_eq!(stored, attr);
        assert_eq!(stored.mode, 0o100644);
        assert_eq!(stored.mtime, now);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_inode_numbers_not_reused() {
        let (_dir, store) = temp_store().await;
        let inodes = store.inodes();
        let mut tx = store.begin().await.unwrap();
        let now = SystemTime::now();
        let owner = Owner::new(0, 0);

        let a = inodes.allocate(&mut tx, FileType::File, "a", owner, now).await.unwrap();
        inodes.delete(&mut tx, a.ino).await.unwrap();
        let b = inodes.allocate(&mut tx, FileType::File, "b", owner, now).await.unwrap();
        assert!(b.ino > a.ino);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_and_missing() {
        let (_dir, store) = temp_store().await;
        let inodes = store.inodes();
        let mut tx = store.begin().await.unwrap();
        let now = SystemTime::now();

        let mut attr = inodes
            .allocate(&mut tx, FileType::Directory, "d", Owner::new(1, 1), now)
            .await
            .unwrap();
        attr.uid = 42;
        attr.atime = now + Duration::from_secs(10);
        inodes.set(&mut tx, &attr).await.unwrap();
        // Unchanged values still count as an update.
        inodes.set(&mut tx, &attr).await.unwrap();
        assert_eq!(inodes.get(&mut tx, attr.ino).await.unwrap(), attr);

        inodes.delete(&mut tx, attr.ino).await.unwrap();
        assert!(inodes.find(&mut tx, attr.ino).await.unwrap().is_none());
        assert!(inodes.get(&mut tx, attr.ino).await.unwrap_err().is_not_found());
        assert!(inodes.set(&mut tx, &attr).await.unwrap_err().is_not_found());
        assert!(inodes.touch_atime(&mut tx, attr.ino, now).await.unwrap_err().is_not_found());
    }
}
