//! VFS error types.
//!
//! Every failure carries a POSIX-style [`ErrorCode`]; callers branch on
//! [`VfsError::code`], never on the message text.

use std::io;

use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use sekisou_glob::GlobError;

/// POSIX error vocabulary exposed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[allow(clippy::upper_case_acronyms)]
pub enum ErrorCode {
    ENOENT,
    EEXIST,
    ENOTDIR,
    EISDIR,
    ENOTEMPTY,
    EINVAL,
    EPERM,
    ELOOP,
    EIO,
}

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("ENOENT: no such file or directory: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("EEXIST: file already exists: {0}")]
    AlreadyExists(String),

    /// Expected a directory.
    #[error("ENOTDIR: not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("EISDIR: is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("ENOTEMPTY: directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Invalid argument (not a symlink, rename into self, bad filter).
    #[error("EINVAL: invalid argument: {path}: {reason}")]
    InvalidArgument { path: String, reason: String },

    /// Operation not permitted (removing `/`, hard-linking a directory).
    #[error("EPERM: operation not permitted: {0}")]
    PermissionDenied(String),

    /// Too many levels of symbolic links.
    #[error("ELOOP: too many symbolic links: {0}")]
    TooManySymlinks(String),

    /// Glob pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] GlobError),

    /// I/O error from a tier backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Store image error.
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// The POSIX code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            VfsError::NotFound(_) => ErrorCode::ENOENT,
            VfsError::AlreadyExists(_) => ErrorCode::EEXIST,
            VfsError::NotADirectory(_) => ErrorCode::ENOTDIR,
            VfsError::IsADirectory(_) => ErrorCode::EISDIR,
            VfsError::DirectoryNotEmpty(_) => ErrorCode::ENOTEMPTY,
            VfsError::InvalidArgument { .. } | VfsError::Pattern(_) => ErrorCode::EINVAL,
            VfsError::PermissionDenied(_) => ErrorCode::EPERM,
            VfsError::TooManySymlinks(_) => ErrorCode::ELOOP,
            VfsError::Io(e) if e.kind() == io::ErrorKind::NotFound => ErrorCode::ENOENT,
            VfsError::Io(_) | VfsError::Db(_) => ErrorCode::EIO,
        }
    }

    /// The offending path, when the error is about one.
    pub fn path(&self) -> Option<&str> {
        match self {
            VfsError::NotFound(p)
            | VfsError::AlreadyExists(p)
            | VfsError::NotADirectory(p)
            | VfsError::IsADirectory(p)
            | VfsError::DirectoryNotEmpty(p)
            | VfsError::PermissionDenied(p)
            | VfsError::TooManySymlinks(p) => Some(p),
            VfsError::InvalidArgument { path, .. } => Some(path),
            VfsError::Pattern(_) | VfsError::Io(_) | VfsError::Db(_) => None,
        }
    }

    /// Shorthand for `self.code() == ErrorCode::ENOENT`.
    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::ENOENT
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        let kind = match e.code() {
            ErrorCode::ENOENT => io::ErrorKind::NotFound,
            ErrorCode::EEXIST => io::ErrorKind::AlreadyExists,
            ErrorCode::ENOTDIR => io::ErrorKind::NotADirectory,
            ErrorCode::EISDIR => io::ErrorKind::IsADirectory,
            ErrorCode::ENOTEMPTY => io::ErrorKind::DirectoryNotEmpty,
            ErrorCode::EINVAL => io::ErrorKind::InvalidInput,
            ErrorCode::EPERM => io::ErrorKind::PermissionDenied,
            ErrorCode::ELOOP | ErrorCode::EIO => io::ErrorKind::Other,
        };
        match e {
            VfsError::Io(inner) => inner,
            other => io::Error::new(kind, other.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
