//! In-memory filesystem backend.
//!
//! Implements the same contract as [`crate::SqlFs`] without a database. The
//! conformance tests run identical scenarios against both and compare the
//! results. All data is ephemeral.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::SystemTime;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{check_file_size, overwrite_from, validate_name, VfsOps};
use crate::vfs::types::{
    DirEntry, FileAttr, FileType, Inode, Owner, SetAttr, DEFAULT_MAX_FILE_SIZE, PERM_MASK,
    ROOT_INODE, S_IFMT,
};

/// Node in the memory filesystem.
#[derive(Debug, Clone)]
struct Node {
    attr: FileAttr,
    /// Containing directory. `None` only for the root.
    parent: Option<Inode>,
    /// File content. `None` for directories.
    data: Option<Vec<u8>>,
}

#[derive(Debug)]
struct Inner {
    nodes: HashMap<Inode, Node>,
    next_ino: Inode,
}

impl Inner {
    fn node(&self, ino: Inode) -> VfsResult<&Node> {
        self.nodes
            .get(&ino)
            .ok_or_else(|| VfsError::not_found(format!("inode {ino}")))
    }

    fn node_mut(&mut self, ino: Inode) -> VfsResult<&mut Node> {
        self.nodes
            .get_mut(&ino)
            .ok_or_else(|| VfsError::not_found(format!("inode {ino}")))
    }

    fn children(&self, parent: Inode) -> impl Iterator<Item = &Node> {
        self.nodes
            .values()
            .filter(move |n| n.parent == Some(parent))
    }

    fn child_by_name(&self, parent: Inode, name: &str) -> Option<&Node> {
        self.children(parent).find(|n| n.attr.name == name)
    }

    fn directory(&self, ino: Inode) -> VfsResult<&Node> {
        let node = self.node(ino)?;
        if !node.attr.is_dir() {
            return Err(VfsError::not_a_directory(format!("inode {ino}")));
        }
        Ok(node)
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via internal `RwLock`; every operation holds the lock for its
/// whole duration, so each one is atomic.
#[derive(Debug)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
    max_file_size: u64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a filesystem holding only the root directory, owned by the
    /// current process.
    pub fn new() -> Self {
        Self::with_root_owner(Owner::current())
    }

    pub fn with_root_owner(owner: Owner) -> Self {
        let root = Node {
            attr: FileAttr::new(ROOT_INODE, "", FileType::Directory, owner, SystemTime::now()),
            parent: None,
            data: None,
        };
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_INODE, root);
        Self {
            inner: RwLock::new(Inner {
                nodes,
                next_ino: ROOT_INODE + 1,
            }),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Refuse truncates and writes that would grow a file past `limit` bytes.
    pub fn with_max_file_size(mut self, limit: u64) -> Self {
        self.max_file_size = limit;
        self
    }
}

#[async_trait]
impl VfsOps for MemoryBackend {
    async fn lookup(&self, parent: Inode, name: &str) -> VfsResult<FileAttr> {
        let inner = self.inner.read();
        inner
            .child_by_name(parent, name)
            .map(|n| n.attr.clone())
            .ok_or_else(|| VfsError::not_found(format!("{name} in inode {parent}")))
    }

    async fn readdir(&self, ino: Inode) -> VfsResult<Vec<DirEntry>> {
        let inner = self.inner.read();
        inner.directory(ino)?;
        Ok(inner
            .children(ino)
            .map(|n| DirEntry::new(n.attr.ino, n.attr.name.clone(), n.attr.kind))
            .collect())
    }

    async fn create_entry(
        &self,
        parent: Inode,
        name: &str,
        kind: FileType,
        owner: Owner,
    ) -> VfsResult<FileAttr> {
        validate_name(name)?;
        let mut inner = self.inner.write();
        inner.directory(parent)?;
        if inner.child_by_name(parent, name).is_some() {
            return Err(VfsError::already_exists(format!("{name} in inode {parent}")));
        }

        let ino = inner.next_ino;
        inner.next_ino += 1;
        let attr = FileAttr::new(ino, name, kind, owner, SystemTime::now());
        let node = Node {
            attr: attr.clone(),
            parent: Some(parent),
            data: kind.is_file().then(Vec::new),
        };
        inner.nodes.insert(ino, node);
        Ok(attr)
    }

    async fn remove_entry(&self, parent: Inode, name: &str, kind: FileType) -> VfsResult<()> {
        let mut inner = self.inner.write();
        let target = inner
            .child_by_name(parent, name)
            .map(|n| n.attr.clone())
            .ok_or_else(|| VfsError::not_found(format!("{name} in inode {parent}")))?;

        match (kind, target.kind) {
            (FileType::File, FileType::Directory) => {
                return Err(VfsError::is_a_directory(name));
            }
            (FileType::Directory, FileType::File) => {
                return Err(VfsError::not_a_directory(name));
            }
            _ => {}
        }
        if target.is_dir() && inner.children(target.ino).next().is_some() {
            return Err(VfsError::directory_not_empty(name));
        }

        inner.nodes.remove(&target.ino);
        Ok(())
    }

    async fn getattr(&self, ino: Inode) -> VfsResult<FileAttr> {
        Ok(self.inner.read().node(ino)?.attr.clone())
    }

    async fn setattr(&self, ino: Inode, set: SetAttr) -> VfsResult<FileAttr> {
        let mut inner = self.inner.write();
        let node = inner.node_mut(ino)?;
        let now = SystemTime::now();

        if let Some(size) = set.size {
            let data = node
                .data
                .as_mut()
                .ok_or_else(|| VfsError::is_a_directory(format!("inode {ino}")))?;
            let len = check_file_size(size, self.max_file_size)?;
            if len != data.len() {
                data.resize(len, 0);
                node.attr.mtime = now;
            }
            node.attr.size = size;
        }

        let attr = &mut node.attr;
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
        Ok(attr.clone())
    }

    async fn read(&self, ino: Inode) -> VfsResult<Vec<u8>> {
        let mut inner = self.inner.write();
        let node = inner.node_mut(ino)?;
        let data = node
            .data
            .clone()
            .ok_or_else(|| VfsError::is_a_directory(format!("inode {ino}")))?;
        node.attr.atime = SystemTime::now();
        Ok(data)
    }

    async fn write(&self, ino: Inode, offset: u64, payload: &[u8]) -> VfsResult<u32> {
        let written = u32::try_from(payload.len())
            .map_err(|_| VfsError::other(format!("write of {} bytes", payload.len())))?;
        let mut inner = self.inner.write();
        let node = inner.node_mut(ino)?;
        let data = node
            .data
            .as_mut()
            .ok_or_else(|| VfsError::is_a_directory(format!("inode {ino}")))?;

        *data = overwrite_from(data, offset, payload, self.max_file_size)?;
        node.attr.size = data.len() as u64;
        node.attr.mtime = SystemTime::now();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Owner {
        Owner::new(1000, 1000)
    }

    #[tokio::test]
    async fn test_root_exists() {
        let fs = MemoryBackend::with_root_owner(owner());
        let root = fs.getattr(ROOT_INODE).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(root.name, "");
        assert!(fs.readdir(ROOT_INODE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let fs = MemoryBackend::new();
        let file = fs.create(ROOT_INODE, "test.txt", owner()).await.unwrap();
        assert_eq!(file.mode, 0o100644);
        fs.write(file.ino, 0, b"hello world").await.unwrap();

        let data = fs.read(file.ino).await.unwrap();
        assert_eq!(data, b"hello world");
        assert_eq!(fs.getattr(file.ino).await.unwrap().size, 11);
    }

    #[tokio::test]
    async fn test_partial_read() {
        let fs = MemoryBackend::new();
        let file = fs.create(ROOT_INODE, "test.txt", owner()).await.unwrap();
        fs.write(file.ino, 0, b"hello world").await.unwrap();

        let data = fs.read_range(file.ino, 6, 5).await.unwrap();
        assert_eq!(data, b"world");
        assert!(fs.read_range(file.ino, 100, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_discards_tail() {
        let fs = MemoryBackend::new();
        let file = fs.create(ROOT_INODE, "f", owner()).await.unwrap();
        fs.write(file.ino, 0, b"abcdef").await.unwrap();
        fs.write(file.ino, 2, b"X").await.unwrap();
        assert_eq!(fs.read(file.ino).await.unwrap(), b"abX");
    }

    #[tokio::test]
    async fn test_mkdir_and_readdir() {
        let fs = MemoryBackend::new();
        let sub = fs.mkdir(ROOT_INODE, "subdir", owner()).await.unwrap();
        fs.create(sub.ino, "file.txt", owner()).await.unwrap();
        fs.create(ROOT_INODE, "root.txt", owner()).await.unwrap();

        let entries = fs.readdir(ROOT_INODE).await.unwrap();
        let mut names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["root.txt", "subdir"]);

        let entries = fs.readdir(sub.ino).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, FileType::File);
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let fs = MemoryBackend::new();
        fs.create(ROOT_INODE, "a", owner()).await.unwrap();
        let err = fs.mkdir(ROOT_INODE, "a", owner()).await.unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_rmdir_not_empty() {
        let fs = MemoryBackend::new();
        let d = fs.mkdir(ROOT_INODE, "d", owner()).await.unwrap();
        fs.create(d.ino, "f", owner()).await.unwrap();

        let err = fs.rmdir(ROOT_INODE, "d").await.unwrap_err();
        assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));

        fs.unlink(d.ino, "f").await.unwrap();
        fs.rmdir(ROOT_INODE, "d").await.unwrap();
        assert!(fs.lookup(ROOT_INODE, "d").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_remove_kind_mismatch() {
        let fs = MemoryBackend::new();
        fs.mkdir(ROOT_INODE, "d", owner()).await.unwrap();
        fs.create(ROOT_INODE, "f", owner()).await.unwrap();
        assert!(matches!(
            fs.unlink(ROOT_INODE, "d").await.unwrap_err(),
            VfsError::IsADirectory(_)
        ));
        assert!(matches!(
            fs.rmdir(ROOT_INODE, "f").await.unwrap_err(),
            VfsError::NotADirectory(_)
        ));
    }

    #[tokio::test]
    async fn test_truncate() {
        let fs = MemoryBackend::new();
        let file = fs.create(ROOT_INODE, "f", owner()).await.unwrap();
        fs.write(file.ino, 0, b"hello world").await.unwrap();

        let attr = fs.truncate(file.ino, 5).await.unwrap();
        assert_eq!(attr.size, 5);
        assert_eq!(fs.read(file.ino).await.unwrap(), b"hello");

        let attr = fs.truncate(file.ino, 8).await.unwrap();
        assert_eq!(attr.size, 8);
        assert_eq!(fs.read(file.ino).await.unwrap(), b"hello\0\0\0");
    }

    #[tokio::test]
    async fn test_size_limit() {
        let fs = MemoryBackend::new().with_max_file_size(8);
        let file = fs.create(ROOT_INODE, "f", owner()).await.unwrap();
        fs.write(file.ino, 0, b"hi").await.unwrap();

        assert!(matches!(
            fs.truncate(file.ino, i64::MAX as u64).await.unwrap_err(),
            VfsError::FileTooLarge(_)
        ));
        assert!(matches!(
            fs.write(file.ino, 1 << 62, b"x").await.unwrap_err(),
            VfsError::FileTooLarge(_)
        ));
        assert!(matches!(
            fs.write(file.ino, 4, b"01234").await.unwrap_err(),
            VfsError::FileTooLarge(_)
        ));
        assert_eq!(fs.read(file.ino).await.unwrap(), b"hi");
        assert_eq!(fs.truncate(file.ino, 8).await.unwrap().size, 8);
    }

    #[tokio::test]
    async fn test_setattr_keeps_type_bits() {
        let fs = MemoryBackend::new();
        let d = fs.mkdir(ROOT_INODE, "d", owner()).await.unwrap();
        let attr = fs.setattr(d.ino, SetAttr::new().with_perm(0o700)).await.unwrap();
        assert_eq!(attr.mode, 0o040700);
        assert!(matches!(
            fs.truncate(d.ino, 0).await.unwrap_err(),
            VfsError::IsADirectory(_)
        ));
    }
}
