//! Core VFS types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use strum::{AsRefStr, Display, EnumString};

/// File type bits, as in `st_mode`.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFLNK: u32 = 0o120000;

/// File type enumeration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileType {
    /// Regular file.
    #[strum(to_string = "file", serialize = "f")]
    File,
    /// Directory.
    #[strum(to_string = "directory", serialize = "dir", serialize = "d")]
    Directory,
    /// Symbolic link.
    #[strum(to_string = "symlink", serialize = "l")]
    Symlink,
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

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }

    /// The `S_IF*` bits for this type.
    pub fn mode_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
            FileType::Symlink => S_IFLNK,
        }
    }
}

/// Storage tier, fastest first.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    #[default]
    Hot,
    Warm,
    Cold,
}

impl Tier {
    /// True if `self` is faster than `other`.
    pub fn is_faster_than(&self, other: Tier) -> bool {
        *self < other
    }
}

/// Where a file's payload lives, as recorded in the hot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub tier: Tier,
    pub size: u64,
}

/// POSIX-style stat record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Inode number.
    pub ino: u64,
    /// Type bits | permission bits.
    pub mode: u32,
    /// Number of hard links.
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    /// Size in bytes.
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub birthtime: SystemTime,
    /// File type.
    pub kind: FileType,
}

impl Stats {
    /// Permission bits only.
    pub fn perm(&self) -> u32 {
        self.mode & !S_IFMT
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name. For recursive listings, relative to the listed directory.
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Options for `mkdir`.
#[derive(Debug, Clone, Copy)]
pub struct MkdirOptions {
    /// Create missing ancestors; an existing directory is not an error.
    pub recursive: bool,
    /// Permission bits for created directories.
    pub mode: u32,
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            mode: 0o755,
        }
    }
}

impl MkdirOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Options for `rmdir`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmdirOptions {
    /// Delete children first instead of failing with ENOTEMPTY.
    pub recursive: bool,
}

/// Options for `rm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmOptions {
    pub recursive: bool,
    /// Missing paths are not an error.
    pub force: bool,
}

/// Options for `readdir`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadDirOptions {
    /// Flatten the whole subtree; names carry `a/b` style prefixes.
    pub recursive: bool,
}
