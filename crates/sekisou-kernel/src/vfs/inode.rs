//! Inode and blob records.
//!
//! An inode holds metadata; a blob holds payload bytes. A blob is created
//! for exactly one inode and gains extra owners only through hard links,
//! tracked by `refs`.

use std::time::SystemTime;

use uuid::Uuid;

use super::types::{FileType, Stats, Tier};

/// Blob identifier.
pub type BlobId = Uuid;

/// Inode number of `/`.
pub const ROOT_INO: u64 = 1;

/// Filesystem entry metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub ino: u64,
    /// Normalized absolute path, unique across the store.
    pub path: String,
    /// Final path component (empty for `/`).
    pub name: String,
    /// Parent inode number. The parent owns this entry's lifetime.
    pub parent: Option<u64>,
    pub kind: FileType,
    /// Permission bits (no type bits).
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    /// Payload, for hot files.
    pub blob: Option<BlobId>,
    /// Target text, for symlinks.
    pub link_target: Option<String>,
    /// Tier holding the payload.
    pub tier: Tier,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub birthtime: SystemTime,
    pub nlink: u32,
}

impl Inode {
    fn new(ino: u64, path: String, parent: Option<u64>, kind: FileType, mode: u32) -> Self {
        let now = SystemTime::now();
        let name = super::path::file_name(&path).to_string();
        Self {
            ino,
            path,
            name,
            parent,
            kind,
            mode,
            uid: 0,
            gid: 0,
            size: 0,
            blob: None,
            link_target: None,
            tier: Tier::Hot,
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
            nlink: if kind.is_dir() { 2 } else { 1 },
        }
    }

    /// The root directory.
    pub fn root() -> Self {
        Self::new(ROOT_INO, "/".to_string(), None, FileType::Directory, 0o755)
    }

    pub fn directory(ino: u64, path: String, parent: u64, mode: u32) -> Self {
        Self::new(ino, path, Some(parent), FileType::Directory, mode)
    }

    pub fn file(ino: u64, path: String, parent: u64, mode: u32) -> Self {
        Self::new(ino, path, Some(parent), FileType::File, mode)
    }

    pub fn symlink(ino: u64, path: String, parent: u64, target: &str) -> Self {
        let mut inode = Self::new(ino, path, Some(parent), FileType::Symlink, 0o777);
        inode.size = target.len() as u64;
        inode.link_target = Some(target.to_string());
        inode
    }

    /// Bump ctime (metadata change).
    pub fn touch_meta(&mut self) {
        self.ctime = SystemTime::now();
    }

    /// Bump mtime and ctime (content change).
    pub fn touch_content(&mut self) {
        let now = SystemTime::now();
        self.mtime = now;
        self.ctime = now;
    }

    /// POSIX-style stat record.
    pub fn stats(&self) -> Stats {
        Stats {
            ino: self.ino,
            mode: self.kind.mode_bits() | self.mode,
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
            size: self.size,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            birthtime: self.birthtime,
            kind: self.kind,
        }
    }
}

/// Stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub id: BlobId,
    pub data: Vec<u8>,
    pub size: u64,
    /// BLAKE3 hex digest of `data`.
    pub checksum: Option<String>,
    pub tier: Tier,
    /// Inodes sharing this blob.
    pub refs: u32,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        let mut blob = Self {
            id: Uuid::new_v4(),
            data: Vec::new(),
            size: 0,
            checksum: None,
            tier: Tier::Hot,
            refs: 1,
        };
        blob.set_data(data);
        blob
    }

    /// Replace the payload and refresh size and checksum.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.size = data.len() as u64;
        self.checksum = Some(checksum(&data));
        self.data = data;
    }

    /// Resize in place, zero-filling on growth.
    pub fn resize(&mut self, len: u64) {
        let mut data = std::mem::take(&mut self.data);
        data.resize(len as usize, 0);
        self.set_data(data);
    }
}

/// BLAKE3 hex digest.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_inode() {
        let root = Inode::root();
        assert_eq!(root.path, "/");
        assert_eq!(root.name, "");
        assert!(root.parent.is_none());
        assert_eq!(root.nlink, 2);
        assert_eq!(root.stats().mode, 0o040755);
    }

    #[test]
    fn test_symlink_inode_size() {
        let link = Inode::symlink(7, "/link".into(), ROOT_INO, "README.md");
        assert_eq!(link.size, 9);
        assert_eq!(link.name, "link");
        assert_eq!(link.stats().mode & 0o170000, 0o120000);
    }

    #[test]
    fn test_blob_checksum_tracks_data() {
        let mut blob = Blob::new(b"hello".to_vec());
        assert_eq!(blob.size, 5);
        let before = blob.checksum.clone();
        blob.resize(2);
        assert_eq!(blob.data, b"he");
        assert_ne!(blob.checksum, before);
        assert_eq!(blob.checksum, Some(checksum(b"he")));
    }
}
