//! Content store: one `filedata` blob per file inode.

use sqlx::{AnyConnection, Row};
use std::sync::Arc;
use std::time::SystemTime;

use crate::db::inode::InodeStore;
use crate::db::{to_db_id, Sql};
use crate::vfs::{Inode, VfsError, VfsResult};

/// CRUD over file content.
///
/// Content and the declared size in `metadata` change together: [`write`]
/// updates both on the caller's connection.
///
/// [`write`]: ContentStore::write
#[derive(Debug, Clone)]
pub struct ContentStore {
    sql: Arc<Sql>,
    inodes: InodeStore,
}

impl ContentStore {
    pub(crate) fn new(sql: Arc<Sql>, inodes: InodeStore) -> Self {
        Self { sql, inodes }
    }

    /// Read the blob and record the access.
    pub async fn read(&self, conn: &mut AnyConnection, ino: Inode, now: SystemTime) -> VfsResult<Vec<u8>> {
        let data = self.load(conn, ino).await?;
        self.inodes.touch_atime(conn, ino, now).await?;
        Ok(data)
    }

    /// Read the blob without touching `atime`.
    pub async fn load(&self, conn: &mut AnyConnection, ino: Inode) -> VfsResult<Vec<u8>> {
        let row = sqlx::query(&self.sql.read_content)
            .bind(to_db_id(ino)?)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| VfsError::not_found(format!("content of inode {ino}")))?;
        Ok(row.try_get("data")?)
    }

    /// Create the empty blob for a new file.
    pub async fn insert_empty(&self, conn: &mut AnyConnection, ino: Inode) -> VfsResult<()> {
        sqlx::query(&self.sql.insert_content)
            .bind(to_db_id(ino)?)
            .bind(Vec::<u8>::new())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Replace the blob wholesale, then set the declared size to its length
    /// and `mtime` to `now`. Returns the new size.
    pub async fn write(
        &self,
        conn: &mut AnyConnection,
        ino: Inode,
        data: Vec<u8>,
        now: SystemTime,
    ) -> VfsResult<u64> {
        let size = data.len() as u64;
        let result = sqlx::query(&self.sql.write_content)
            .bind(data)
            .bind(to_db_id(ino)?)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 && !self.exists(conn, ino).await? {
            return Err(VfsError::not_found(format!("content of inode {ino}")));
        }
        self.inodes.set_size(conn, ino, size, now).await?;
        Ok(size)
    }

    pub async fn delete(&self, conn: &mut AnyConnection, ino: Inode) -> VfsResult<()> {
        sqlx::query(&self.sql.delete_content)
            .bind(to_db_id(ino)?)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn exists(&self, conn: &mut AnyConnection, ino: Inode) -> VfsResult<bool> {
        let row = sqlx::query(&self.sql.content_exists)
            .bind(to_db_id(ino)?)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::testing::temp_store;
    use crate::vfs::{FileType, Owner};
    use std::time::{Duration, SystemTime};

    #[tokio::test]
    async fn test_write_updates_size_and_mtime() {
        let (_dir, store) = temp_store().await;
        let (inodes, content) = (store.inodes(), store.content());
        let mut tx = store.begin().await.unwrap();
        let created = SystemTime::now();

        let f = inodes.allocate(&mut tx, FileType::File, "f", Owner::new(0, 0), created).await.unwrap();
        content.insert_empty(&mut tx, f.ino).await.unwrap();
        assert!(content.load(&mut tx, f.ino).await.unwrap().is_empty());

        let later = created + Duration::from_secs(5);
        let size = content.write(&mut tx, f.ino, b"Hello!".to_vec(), later).await.unwrap();
        assert_eq!(size, 6);
        // Same bytes again: still succeeds.
        content.write(&mut tx, f.ino, b"Hello!".to_vec(), later).await.unwrap();

        let attr = inodes.get(&mut tx, f.ino).await.unwrap();
        assert_eq!(attr.size, 6);
        assert_eq!(attr.mtime, later);
        assert_eq!(attr.atime, created);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_touches_atime() {
        let (_dir, store) = temp_store().await;
        let (inodes, content) = (store.inodes(), store.content());
        let mut tx = store.begin().await.unwrap();
        let created = SystemTime::now();

        let f = inodes.allocate(&mut tx, FileType::File, "f", Owner::new(0, 0), created).await.unwrap();
        content.insert_empty(&mut tx, f.ino).await.unwrap();
        content.write(&mut tx, f.ino, b"abc".to_vec(), created).await.unwrap();

        let later = created + Duration::from_secs(3);
        assert_eq!(content.read(&mut tx, f.ino, later).await.unwrap(), b"abc");
        assert_eq!(inodes.get(&mut tx, f.ino).await.unwrap().atime, later);
    }

    #[tokio::test]
    async fn test_missing_content() {
        let (_dir, store) = temp_store().await;
        let content = store.content();
        let mut tx = store.begin().await.unwrap();
        let now = SystemTime::now();

        assert!(content.load(&mut tx, 99).await.unwrap_err().is_not_found());
        assert!(content.write(&mut tx, 99, vec![1], now).await.unwrap_err().is_not_found());

        let d = store
            .inodes()
            .allocate(&mut tx, FileType::Directory, "d", Owner::new(0, 0), now)
            .await
            .unwrap();
        content.delete(&mut tx, d.ino).await.unwrap();
        assert!(content.read(&mut tx, d.ino, now).await.unwrap_err().is_not_found());
    }
}
