//! VFS operations trait.
//!
//! This trait defines the composite operations a filesystem transport needs.
//! Every mutating operation is atomic: it is either fully applied or not at
//! all.

use async_trait::async_trait;

use super::types::{
    DirEntry, FileAttr, FileType, Inode, Owner, SetAttr, MAX_FILE_SIZE, MAX_NAME_LEN,
};
use super::{VfsError, VfsResult};

/// Core VFS operations trait.
///
/// Implementations must be safe to call concurrently; they keep no state
/// between calls other than what lives in the backing store.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Namespace
    // ========================================================================

    /// Resolve `name` under `parent`.
    async fn lookup(&self, parent: Inode, name: &str) -> VfsResult<FileAttr>;

    /// Read directory entries.
    ///
    /// Returns all entries in the directory (no pagination, no `.`/`..`).
    /// Ordering is unspecified.
    async fn readdir(&self, ino: Inode) -> VfsResult<Vec<DirEntry>>;

    /// Create a file or directory named `name` under `parent`.
    ///
    /// Returns the attributes of the new entry.
    async fn create_entry(
        &self,
        parent: Inode,
        name: &str,
        kind: FileType,
        owner: Owner,
    ) -> VfsResult<FileAttr>;

    /// Remove the entry `name` under `parent`.
    ///
    /// `kind` is what the caller expects to remove; directories must be
    /// empty.
    async fn remove_entry(&self, parent: Inode, name: &str, kind: FileType) -> VfsResult<()>;

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Get file attributes.
    async fn getattr(&self, ino: Inode) -> VfsResult<FileAttr>;

    /// Set file attributes.
    async fn setattr(&self, ino: Inode, set: SetAttr) -> VfsResult<FileAttr>;

    // ========================================================================
    // Content
    // ========================================================================

    /// Read the whole file.
    async fn read(&self, ino: Inode) -> VfsResult<Vec<u8>>;

    /// Write data to a file.
    ///
    /// The file becomes `content[..offset] ++ data`; anything after
    /// `offset + data.len()` is discarded. A gap past the old end is
    /// zero-filled. Returns the number of bytes written.
    async fn write(&self, ino: Inode, offset: u64, data: &[u8]) -> VfsResult<u32>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check that `ino` exists and return its attributes.
    async fn open(&self, ino: Inode) -> VfsResult<FileAttr> {
        self.getattr(ino).await
    }

    /// Create a new empty file.
    async fn create(&self, parent: Inode, name: &str, owner: Owner) -> VfsResult<FileAttr> {
        self.create_entry(parent, name, FileType::File, owner).await
    }

    /// Create a new directory.
    async fn mkdir(&self, parent: Inode, name: &str, owner: Owner) -> VfsResult<FileAttr> {
        self.create_entry(parent, name, FileType::Directory, owner).await
    }

    /// Remove a file.
    async fn unlink(&self, parent: Inode, name: &str) -> VfsResult<()> {
        self.remove_entry(parent, name, FileType::File).await
    }

    /// Remove an empty directory.
    async fn rmdir(&self, parent: Inode, name: &str) -> VfsResult<()> {
        self.remove_entry(parent, name, FileType::Directory).await
    }

    /// Truncate or extend a file to `size` bytes.
    async fn truncate(&self, ino: Inode, size: u64) -> VfsResult<FileAttr> {
        self.setattr(ino, SetAttr::new().with_size(size)).await
    }

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes if EOF is reached.
    async fn read_range(&self, ino: Inode, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let data = self.read(ino).await?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(size as usize).min(data.len());
        Ok(data[start..end].to_vec())
    }
}

/// Check that `name` can be used as a single path component.
pub fn validate_name(name: &str) -> VfsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(VfsError::invalid_name(name));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(VfsError::invalid_name(format!(
            "name is {} bytes, limit is {MAX_NAME_LEN}",
            name.len()
        )));
    }
    Ok(())
}

/// Check a requested file length against `limit` (never more than
/// [`MAX_FILE_SIZE`]) before any buffer of that size exists.
pub fn check_file_size(size: u64, limit: u64) -> VfsResult<usize> {
    let limit = limit.min(MAX_FILE_SIZE);
    if size > limit {
        return Err(VfsError::file_too_large(format!("{size} bytes, limit is {limit}")));
    }
    usize::try_from(size).map_err(|_| VfsError::file_too_large(format!("{size} bytes")))
}

/// New content for a write of `data` at `offset`: `current[..offset]`,
/// zero-filled up to `offset` if `current` is shorter, then `data`.
///
/// Fails with `FileTooLarge` if the result would exceed `limit`.
pub fn overwrite_from(current: &[u8], offset: u64, data: &[u8], limit: u64) -> VfsResult<Vec<u8>> {
    let end = offset
        .checked_add(data.len() as u64)
        .ok_or_else(|| VfsError::file_too_large(format!("write at offset {offset}")))?;
    let len = check_file_size(end, limit)?;
    let offset = len - data.len();
    let keep = offset.min(current.len());
    let mut content = Vec::with_capacity(len);
    content.extend_from_slice(&current[..keep]);
    content.resize(offset, 0);
    content.extend_from_slice(data);
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 1 << 20;

    #[test]
    fn test_overwrite_from() {
        assert_eq!(overwrite_from(b"Hello!", 6, b"Hello!", LIMIT).unwrap(), b"Hello!Hello!");
        // Bytes past the written range are dropped.
        assert_eq!(overwrite_from(b"abcdef", 2, b"X", LIMIT).unwrap(), b"abX");
        assert_eq!(overwrite_from(b"ab", 4, b"c", LIMIT).unwrap(), b"ab\0\0c");
        assert_eq!(overwrite_from(b"", 0, b"", LIMIT).unwrap(), b"");
    }

    #[test]
    fn test_overwrite_from_rejects_huge_offsets() {
        assert_eq!(overwrite_from(b"", LIMIT - 1, b"x", LIMIT).unwrap().len(), LIMIT as usize);
        for offset in [LIMIT, 1 << 62, u64::MAX] {
            let err = overwrite_from(b"abc", offset, b"x", LIMIT).unwrap_err();
            assert!(matches!(err, VfsError::FileTooLarge(_)), "{offset}: {err}");
        }
        // The column ceiling applies even with a larger configured limit.
        let err = overwrite_from(b"", MAX_FILE_SIZE, b"x", u64::MAX).unwrap_err();
        assert!(matches!(err, VfsError::FileTooLarge(_)));
    }

    #[test]
    fn test_check_file_size() {
        assert_eq!(check_file_size(0, LIMIT).unwrap(), 0);
        assert_eq!(check_file_size(LIMIT, LIMIT).unwrap(), LIMIT as usize);
        assert!(matches!(
            check_file_size(LIMIT + 1, LIMIT).unwrap_err(),
            VfsError::FileTooLarge(_)
        ));
        assert!(matches!(
            check_file_size(i64::MAX as u64 + 1, u64::MAX).unwrap_err(),
            VfsError::FileTooLarge(_)
        ));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("file.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
