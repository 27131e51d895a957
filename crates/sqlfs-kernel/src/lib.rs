//! # sqlfs-kernel
//!
//! A hierarchical file namespace whose authoritative state lives in
//! relational tables.
//!
//! - [`vfs`] - the inode-based operation contract ([`VfsOps`]) a filesystem
//!   transport drives, plus an in-memory reference backend
//! - [`db`] - connection management, schema bootstrap, the inode, edge and
//!   content stores, and one [`db::Dialect`] per engine (SQLite, MySQL,
//!   PostgreSQL)
//! - [`fs`] - [`SqlFs`], which implements [`VfsOps`] on top of a [`Store`],
//!   one transaction per operation

pub mod db;
pub mod fs;
pub mod vfs;

pub use db::{ConnectionTarget, DialectKind, PoolConfig, Store};
pub use fs::SqlFs;
pub use vfs::{
    backends::MemoryBackend, DirEntry, FileAttr, FileType, Inode, Owner, SetAttr, SetTime,
    VfsError, VfsOps, VfsResult, DEFAULT_MAX_FILE_SIZE, ROOT_INODE,
};
