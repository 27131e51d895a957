//! Virtual Filesystem abstraction.
//!
//! This module provides an inode-based VFS designed to sit behind a
//! filesystem transport (FUSE). Key components:
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`MemoryBackend`] - In-memory implementation of the same contract
//! - [`crate::SqlFs`] - Relational implementation (see [`crate::db`])
//!
//! ## Design Decisions
//!
//! - **Inode-based**: the transport resolves names with `lookup` and then
//!   addresses everything by inode number. Inode 1 is the root.
//! - **Whole-file content**: `read` returns the full content and `write`
//!   replaces everything from `offset` onwards. Range reads are sliced by
//!   [`VfsOps::read_range`].
//! - **No caching**: every call goes to the backing store.

pub mod backends;
mod error;
mod ops;
mod types;

pub use backends::MemoryBackend;
pub use error::{VfsError, VfsResult};
pub use ops::{check_file_size, overwrite_from, validate_name, VfsOps};
pub use types::{
    nanos_since_epoch, system_time_from_nanos, DirEntry, FileAttr, FileType, Inode, Owner,
    SetAttr, SetTime, DEFAULT_DIR_PERM, DEFAULT_FILE_PERM, DEFAULT_MAX_FILE_SIZE, MAX_FILE_SIZE,
    MAX_NAME_LEN, PERM_MASK, ROOT_INODE, S_IFDIR, S_IFMT, S_IFREG,
};
