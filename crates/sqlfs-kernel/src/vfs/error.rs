//! VFS error types.

use rustix::io::Errno;
use std::io;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Inode or named child not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name already taken in the parent directory.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Entry name is empty, contains `/`, or is too long.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Requested size or write end is past the file size limit.
    #[error("file too large: {0}")]
    FileTooLarge(String),

    /// Argument the transport passed is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store does not have the expected schema or root entry.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Connection target or pool settings are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Connection, query, or transaction failure in the relational store.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(what: impl Into<String>) -> Self {
        Self::NotADirectory(what.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(what: impl Into<String>) -> Self {
        Self::IsADirectory(what.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(what: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(what.into())
    }

    /// Create an InvalidName error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    /// Create a FileTooLarge error.
    pub fn file_too_large(what: impl Into<String>) -> Self {
        Self::FileTooLarge(what.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    /// Create an Integrity error.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// POSIX error number for the transport.
    ///
    /// Store, integrity and configuration failures all collapse to `EIO` so
    /// engine-specific detail never reaches the caller.
    pub fn errno(&self) -> i32 {
        let errno = match self {
            Self::NotFound(_) => Errno::NOENT,
            Self::AlreadyExists(_) => Errno::EXIST,
            Self::NotADirectory(_) => Errno::NOTDIR,
            Self::IsADirectory(_) => Errno::ISDIR,
            Self::DirectoryNotEmpty(_) => Errno::NOTEMPTY,
            Self::InvalidName(_) | Self::InvalidArgument(_) => Errno::INVAL,
            Self::FileTooLarge(_) => Errno::FBIG,
            Self::Io(e) => return e.raw_os_error().unwrap_or(Errno::IO.raw_os_error()),
            Self::Integrity(_) | Self::Config(_) | Self::Store(_) | Self::Other(_) => Errno::IO,
        };
        errno.raw_os_error()
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            VfsError::InvalidName(msg) | VfsError::InvalidArgument(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            VfsError::FileTooLarge(msg) => io::Error::new(io::ErrorKind::FileTooLarge, msg),
            VfsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(VfsError::not_found("x").errno(), Errno::NOENT.raw_os_error());
        assert_eq!(
            VfsError::directory_not_empty("d").errno(),
            Errno::NOTEMPTY.raw_os_error()
        );
        assert_eq!(VfsError::already_exists("a").errno(), Errno::EXIST.raw_os_error());
        assert_eq!(VfsError::integrity("root").errno(), Errno::IO.raw_os_error());
        assert_eq!(VfsError::file_too_large("f").errno(), Errno::FBIG.raw_os_error());
        assert_eq!(
            VfsError::invalid_argument("offset").errno(),
            Errno::INVAL.raw_os_error()
        );
        assert_eq!(
            VfsError::Store(sqlx::Error::PoolTimedOut).errno(),
            Errno::IO.raw_os_error()
        );
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = VfsError::directory_not_empty("d").into();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);

        let err: io::Error = VfsError::integrity("no root").into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
