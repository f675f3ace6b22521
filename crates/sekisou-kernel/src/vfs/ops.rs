//! VFS operations trait.
//!
//! The full POSIX-like call set. Paths are virtual absolute strings; they
//! are normalized by the implementation, so `a/b`, `/a/b/` and `/a/./b`
//! name the same entry.

use async_trait::async_trait;
use std::time::SystemTime;

use super::VfsResult;
use super::types::{DirEntry, MkdirOptions, ReadDirOptions, RmOptions, RmdirOptions, Stats};

/// Core VFS operations trait.
///
/// Searches ([`crate::search`]) take any `VfsOps` by reference, so a store
/// handle is threaded through every traversal instead of living in a global.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Read a whole file. Follows symlinks.
    async fn read(&self, path: &str) -> VfsResult<Vec<u8>>;

    /// List a directory. Follows symlinks.
    async fn readdir(&self, path: &str, options: ReadDirOptions) -> VfsResult<Vec<DirEntry>>;

    /// Stat, following symlinks.
    async fn stat(&self, path: &str) -> VfsResult<Stats>;

    /// Stat the entry itself, not what it points at.
    async fn lstat(&self, path: &str) -> VfsResult<Stats>;

    /// Read a symlink's stored target text.
    async fn readlink(&self, path: &str) -> VfsResult<String>;

    /// Resolve every symlink along `path`. Missing tails are kept verbatim.
    async fn realpath(&self, path: &str) -> VfsResult<String>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create or replace a file's content. The parent must exist.
    async fn write(&self, path: &str, data: &[u8]) -> VfsResult<()>;

    /// Remove a file or symlink.
    async fn unlink(&self, path: &str) -> VfsResult<()>;

    /// Move an entry (and its subtree) to a new path.
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Create a directory.
    async fn mkdir(&self, path: &str, options: MkdirOptions) -> VfsResult<()>;

    /// Remove a directory.
    async fn rmdir(&self, path: &str, options: RmdirOptions) -> VfsResult<()>;

    /// Resize a file, zero-filling on growth.
    async fn truncate(&self, path: &str, len: u64) -> VfsResult<()>;

    /// Create a symlink at `path` whose target text is `target`.
    async fn symlink(&self, target: &str, path: &str) -> VfsResult<()>;

    /// Create a hard link `new` sharing `existing`'s payload.
    async fn link(&self, existing: &str, new: &str) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()>;

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()>;

    /// Set access and modification times.
    async fn utimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists (without following a final symlink).
    async fn exists(&self, path: &str) -> bool {
        self.lstat(path).await.is_ok()
    }

    /// Copy a file. The destination gets its own payload.
    async fn copy_file(&self, src: &str, dst: &str) -> VfsResult<()> {
        let data = self.read(src).await?;
        self.write(dst, &data).await
    }

    /// Remove a file or directory tree.
    ///
    /// `force` swallows ENOENT; directories go through `rmdir`.
    async fn rm(&self, path: &str, options: RmOptions) -> VfsResult<()> {
        let stats = match self.lstat(path).await {
            Ok(stats) => stats,
            Err(e) if e.is_not_found() && options.force => return Ok(()),
            Err(e) => return Err(e),
        };
        if stats.is_dir() {
            self.rmdir(
                path,
                RmdirOptions {
                    recursive: options.recursive,
                },
            )
            .await
        } else {
            self.unlink(path).await
        }
    }
}
