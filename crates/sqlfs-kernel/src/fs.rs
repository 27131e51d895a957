//! Filesystem operation adapter.
//!
//! [`SqlFs`] implements [`VfsOps`] over a [`Store`]. Each operation opens
//! one transaction, composes calls into the inode, edge and content stores,
//! and commits. An error drops the transaction, which rolls it back, so a
//! failed operation leaves nothing behind.

use async_trait::async_trait;
use std::time::SystemTime;

use crate::db::Store;
use crate::vfs::{
    check_file_size, overwrite_from, validate_name, DirEntry, FileAttr, FileType, Inode, Owner,
    SetAttr, VfsError, VfsOps, VfsResult, DEFAULT_MAX_FILE_SIZE, PERM_MASK, S_IFMT,
};

/// A namespace stored in relational tables.
///
/// Holds no state besides the store handle and the file size limit; clones
/// share the pool.
#[derive(Debug, Clone)]
pub struct SqlFs {
    store: Store,
    max_file_size: u64,
}

impl SqlFs {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Refuse truncates and writes that would grow a file past `limit`
    /// bytes with `FileTooLarge`.
    pub fn with_max_file_size(mut self, limit: u64) -> Self {
        self.max_file_size = limit;
        self
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

#[async_trait]
impl VfsOps for SqlFs {
    async fn lookup(&self, parent: Inode, name: &str) -> VfsResult<FileAttr> {
        tracing::debug!(parent, name, "lookup");
        let mut tx = self.store.begin().await?;
        // Names live on the attribute row, so an edge whose attributes are
        // gone never resolves here; readdir reports it.
        let child = self
            .store
            .edges()
            .child_by_name(&mut tx, parent, name)
            .await?
            .ok_or_else(|| VfsError::not_found(format!("{name} in inode {parent}")))?;

        let attr = self.store.inodes().get(&mut tx, child).await?;
        tx.commit().await?;
        Ok(attr)
    }

    async fn readdir(&self, ino: Inode) -> VfsResult<Vec<DirEntry>> {
        tracing::debug!(ino, "readdir");
        let mut tx = self.store.begin().await?;
        let dir = self.store.inodes().get(&mut tx, ino).await?;
        if !dir.is_dir() {
            return Err(VfsError::not_a_directory(format!("inode {ino}")));
        }

        let children = self.store.edges().children(&mut tx, ino).await?;
        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            match self.store.inodes().find(&mut tx, child).await {
                Ok(Some(attr)) => entries.push(DirEntry::new(attr.ino, attr.name, attr.kind)),
                Ok(None) => tracing::warn!(ino, child, "skipping entry without attributes"),
                Err(VfsError::Store(e)) => return Err(VfsError::Store(e)),
                Err(e) => tracing::warn!(ino, child, error = %e, "skipping unreadable entry"),
            }
        }
        tx.commit().await?;
        Ok(entries)
    }

    async fn create_entry(
        &self,
        parent: Inode,
        name: &str,
        kind: FileType,
        owner: Owner,
    ) -> VfsResult<FileAttr> {
        tracing::debug!(parent, name, ?kind, "create");
        validate_name(name)?;
        let mut tx = self.store.begin().await?;

        let dir = self.store.inodes().get(&mut tx, parent).await?;
        if !dir.is_dir() {
            return Err(VfsError::not_a_directory(format!("inode {parent}")));
        }
        if self.store.edges().child_by_name(&mut tx, parent, name).await?.is_some() {
            return Err(VfsError::already_exists(format!("{name} in inode {parent}")));
        }

        let attr = self
            .store
            .inodes()
            .allocate(&mut tx, kind, name, owner, SystemTime::now())
            .await?;
        if kind.is_file() {
            self.store.content().insert_empty(&mut tx, attr.ino).await?;
        }
        self.store.edges().link(&mut tx, parent, attr.ino).await?;
        tx.commit().await?;

        tracing::debug!(parent, name, ino = attr.ino, "created");
        Ok(attr)
    }

    async fn remove_entry(&self, parent: Inode, name: &str, kind: FileType) -> VfsResult<()> {
        tracing::debug!(parent, name, ?kind, "remove");
        let mut tx = self.store.begin().await?;
        let child = self
            .store
            .edges()
            .child_by_name(&mut tx, parent, name)
            .await?
            .ok_or_else(|| VfsError::not_found(format!("{name} in inode {parent}")))?;
        let attr = self.store.inodes().get(&mut tx, child).await?;

        match (kind, attr.kind) {
            (FileType::File, FileType::Directory) => return Err(VfsError::is_a_directory(name)),
            (FileType::Directory, FileType::File) => return Err(VfsError::not_a_directory(name)),
            _ => {}
        }
        if attr.is_dir() && self.store.edges().child_count(&mut tx, child).await? > 0 {
            return Err(VfsError::directory_not_empty(name));
        }

        self.store.inodes().delete(&mut tx, child).await?;
        if attr.is_file() {
            self.store.content().delete(&mut tx, child).await?;
        }
        self.store.edges().unlink(&mut tx, parent, child).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn getattr(&self, ino: Inode) -> VfsResult<FileAttr> {
        let mut conn = self.store.acquire().await?;
        self.store.inodes().get(&mut conn, ino).await
    }

    async fn setattr(&self, ino: Inode, set: SetAttr) -> VfsResult<FileAttr> {
        tracing::debug!(ino, ?set, "setattr");
        let mut tx = self.store.begin().await?;
        let now = SystemTime::now();
        let mut attr = self.store.inodes().get(&mut tx, ino).await?;
        if set.is_empty() {
            tx.commit().await?;
            return Ok(attr);
        }

        if let Some(size) = set.size {
            if attr.is_dir() {
                return Err(VfsError::is_a_directory(format!("inode {ino}")));
            }
            let len = check_file_size(size, self.max_file_size)?;
            let mut data = self.store.content().load(&mut tx, ino).await?;
            if data.len() != len {
                // Growth is zero-filled so the blob always matches the size.
                data.resize(len, 0);
                self.store.content().write(&mut tx, ino, data, now).await?;
                attr.mtime = now;
            }
            attr.size = size;
        }

        if let Some(uid) = set.uid {
            attr.uid = uid;
        }
        if let Some(gid) = set.gid {
            attr.gid = gid;
        }
        if let Some(perm) = set.perm {
            attr.mode = (attr.mode & S_IFMT) | (perm & PERM_MASK);
        }
        if let Some(atime) = set.atime {
            attr.atime = atime.resolve(now);
        }
        if let Some(mtime) = set.mtime {
            attr.mtime = mtime.resolve(now);
        }

        self.store.inodes().set(&mut tx, &attr).await?;
        tx.commit().await?;
        Ok(attr)
    }

    async fn read(&self, ino: Inode) -> VfsResult<Vec<u8>> {
        tracing::debug!(ino, "read");
        let mut tx = self.store.begin().await?;
        let attr = self.store.inodes().get(&mut tx, ino).await?;
        if attr.is_dir() {
            return Err(VfsError::is_a_directory(format!("inode {ino}")));
        }

        let mut data = self.store.content().read(&mut tx, ino, SystemTime::now()).await?;
        tx.commit().await?;

        if data.len() as u64 != attr.size {
            tracing::warn!(ino, stored = data.len(), declared = attr.size, "content length differs from size");
            data.truncate(usize::try_from(attr.size).unwrap_or(usize::MAX));
        }
        Ok(data)
    }

    async fn write(&self, ino: Inode, offset: u64, payload: &[u8]) -> VfsResult<u32> {
        tracing::debug!(ino, offset, len = payload.len(), "write");
        let written = u32::try_from(payload.len())
            .map_err(|_| VfsError::other(format!("write of {} bytes", payload.len())))?;
        let mut tx = self.store.begin().await?;
        let attr = self.store.inodes().get(&mut tx, ino).await?;
        if attr.is_dir() {
            return Err(VfsError::is_a_directory(format!("inode {ino}")));
        }

        let current = self.store.content().load(&mut tx, ino).await?;
        let content = overwrite_from(&current, offset, payload, self.max_file_size)?;
        self.store.content().write(&mut tx, ino, content, SystemTime::now()).await?;
        tx.commit().await?;
        Ok(written)
    }
}
