//! Virtual filesystem.
//!
//! A POSIX-like file tree stored as inode metadata plus payload blobs.
//! Key components:
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`MemoryFs`] - The inode + blob store
//! - [`Inode`] / [`Blob`] - Persisted records
//!
//! ## Design Decisions
//!
//! - **Paths in, inodes inside**: callers speak absolute virtual paths;
//!   the store keeps a path index over inode numbers.
//! - **Shared blobs**: hard links point at the same blob; the blob's
//!   refcount is the link count.
//! - **Placement lives here**: files whose payload moved to a slower tier
//!   keep their inode (with the tier recorded) and drop their blob.

pub mod backends;
mod error;
mod inode;
mod ops;
pub mod path;
mod types;

pub use backends::MemoryFs;
pub use error::{ErrorCode, VfsError, VfsResult};
pub use inode::{Blob, BlobId, Inode, ROOT_INO, checksum};
pub use ops::VfsOps;
pub use types::{
    DirEntry, FileType, MkdirOptions, Placement, ReadDirOptions, RmOptions, RmdirOptions, S_IFDIR,
    S_IFLNK, S_IFMT, S_IFREG, Stats, Tier,
};
