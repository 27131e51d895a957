//! VFS backends.
//!
//! Backends implement [`VfsOps`](super::VfsOps) for different storage types.
//! The relational backend lives in [`crate::fs`]; this module holds the
//! in-memory reference used by tests.

mod memory;

pub use memory::MemoryBackend;
