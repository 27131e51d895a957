//! Core VFS types.
//!
//! These are the shapes a filesystem transport consumes: attributes keyed by
//! inode number, directory entries, and the partial change applied by
//! setattr.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Inode number.
pub type Inode = u64;

/// The namespace root. Always present, always named `""`.
pub const ROOT_INODE: Inode = 1;

/// File type bits of `st_mode`.
pub const S_IFMT: u32 = 0o170000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100000;
/// Permission bits of `st_mode` (including setuid/setgid/sticky).
pub const PERM_MASK: u32 = 0o7777;

pub const DEFAULT_DIR_PERM: u32 = 0o755;
pub const DEFAULT_FILE_PERM: u32 = 0o644;

/// Longest entry name accepted by `create_entry`.
pub const MAX_NAME_LEN: usize = 255;

/// Hard ceiling on file size: the `size` column is a signed 64-bit integer.
pub const MAX_FILE_SIZE: u64 = i64::MAX as u64;

/// Default file size limit. Content is read and rewritten whole, so a file
/// must fit in memory.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Dirent type code (`DT_REG` / `DT_DIR`), as persisted in the `type` column.
    pub fn dirent_type(&self) -> i64 {
        match self {
            FileType::File => 8,
            FileType::Directory => 4,
        }
    }

    /// Inverse of [`FileType::dirent_type`].
    pub fn from_dirent_type(code: i64) -> Option<Self> {
        match code {
            8 => Some(FileType::File),
            4 => Some(FileType::Directory),
            _ => None,
        }
    }

    /// `S_IFREG` or `S_IFDIR`.
    pub fn type_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
        }
    }

    /// Permission bits given to newly created entries of this kind.
    pub fn default_perm(&self) -> u32 {
        match self {
            FileType::File => DEFAULT_FILE_PERM,
            FileType::Directory => DEFAULT_DIR_PERM,
        }
    }

    /// Full `st_mode` for a newly created entry of this kind.
    pub fn default_mode(&self) -> u32 {
        self.type_bits() | self.default_perm()
    }
}

/// Owning user and group of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Real uid/gid of the running process.
    pub fn current() -> Self {
        Self {
            uid: rustix::process::getuid().as_raw(),
            gid: rustix::process::getgid().as_raw(),
        }
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Inode number.
    pub ino: Inode,
    /// Entry name (not a path). Empty for the root.
    pub name: String,
    /// File type.
    pub kind: FileType,
    /// Full `st_mode`: type bits and permission bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Size in bytes. Always equals the stored content length for files.
    pub size: u64,
    /// Creation time.
    pub ctime: SystemTime,
    /// Last access time.
    pub atime: SystemTime,
    /// Last modification time.
    pub mtime: SystemTime,
}

impl FileAttr {
    /// Attributes for a freshly allocated entry: default mode, zero size and
    /// all three timestamps set to `now`.
    pub fn new(ino: Inode, name: impl Into<String>, kind: FileType, owner: Owner, now: SystemTime) -> Self {
        Self {
            ino,
            name: name.into(),
            kind,
            mode: kind.default_mode(),
            uid: owner.uid,
            gid: owner.gid,
            size: 0,
            ctime: now,
            atime: now,
            mtime: now,
        }
    }

    /// Permission bits only.
    pub fn perm(&self) -> u32 {
        self.mode & PERM_MASK
    }

    /// Link count reported to the transport.
    pub fn nlink(&self) -> u32 {
        if self.is_dir() { 2 } else { 1 }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub ino: Inode,
    /// Entry name (not full path).
    pub name: String,
    pub kind: FileType,
}

impl DirEntry {
    pub fn new(ino: Inode, name: impl Into<String>, kind: FileType) -> Self {
        Self {
            ino,
            name: name.into(),
            kind,
        }
    }
}

/// A timestamp change requested by setattr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetTime {
    /// Use the current time.
    Now,
    /// Use an explicit time.
    At(SystemTime),
}

impl SetTime {
    pub fn resolve(self, now: SystemTime) -> SystemTime {
        match self {
            SetTime::Now => now,
            SetTime::At(t) => t,
        }
    }
}

/// Attributes to set (for setattr operation).
///
/// A field is applied only when it is `Some`; everything else is left as it
/// is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAttr {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// New permission bits. Type bits are never changed.
    pub perm: Option<u32>,
    pub atime: Option<SetTime>,
    pub mtime: Option<SetTime>,
    /// New size; content is truncated or zero-extended to match.
    pub size: Option<u64>,
}

impl SetAttr {
    /// Create a new empty SetAttr.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set permissions.
    pub fn with_perm(mut self, perm: u32) -> Self {
        self.perm = Some(perm);
        self
    }

    /// Set owner and group.
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.uid = Some(owner.uid);
        self.gid = Some(owner.gid);
        self
    }

    /// Set the access time.
    pub fn with_atime(mut self, atime: SetTime) -> Self {
        self.atime = Some(atime);
        self
    }

    /// Set the modification time.
    pub fn with_mtime(mut self, mtime: SetTime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// True when no field is marked present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Nanoseconds since the Unix epoch, as stored in the timestamp columns.
///
/// Saturates at the `i64` range.
pub fn nanos_since_epoch(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos()).map(|n| -n).unwrap_or(i64::MIN),
    }
}

/// Inverse of [`nanos_since_epoch`].
pub fn system_time_from_nanos(nanos: i64) -> SystemTime {
    if nanos >= 0 {
        UNIX_EPOCH + Duration::from_nanos(nanos as u64)
    } else {
        UNIX_EPOCH - Duration::from_nanos(nanos.unsigned_abs())
    }
}
