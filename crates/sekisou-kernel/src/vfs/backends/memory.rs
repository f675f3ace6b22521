//! In-memory inode + blob store.
//!
//! The canonical store behind every sekisou filesystem. Metadata lives in an
//! inode table indexed by path; payloads live in a blob table. Files placed
//! on a colder tier keep their inode here with no blob.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::SystemTime;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::inode::{Blob, BlobId, Inode, ROOT_INO};
use crate::vfs::ops::VfsOps;
use crate::vfs::path;
use crate::vfs::types::{
    DirEntry, FileType, MkdirOptions, Placement, ReadDirOptions, RmdirOptions, Stats, Tier,
};

/// Symlink hops before giving up with ELOOP.
const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug)]
struct Tables {
    inodes: HashMap<u64, Inode>,
    paths: BTreeMap<String, u64>,
    blobs: HashMap<BlobId, Blob>,
    next_ino: u64,
}

impl Tables {
    fn new() -> Self {
        let mut tables = Self {
            inodes: HashMap::new(),
            paths: BTreeMap::new(),
            blobs: HashMap::new(),
            next_ino: ROOT_INO + 1,
        };
        tables.insert(Inode::root());
        tables
    }

    fn lookup(&self, path: &str) -> Option<&Inode> {
        self.paths.get(path).and_then(|ino| self.inodes.get(ino))
    }

    fn alloc_ino(&mut self) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        ino
    }

    fn insert(&mut self, inode: Inode) {
        self.paths.insert(inode.path.clone(), inode.ino);
        self.inodes.insert(inode.ino, inode);
    }

    /// Drop an inode and its claim on its blob.
    fn remove(&mut self, ino: u64) {
        if let Some(inode) = self.inodes.remove(&ino) {
            self.paths.remove(&inode.path);
            self.release_blob(inode.blob);
        }
    }

    /// Strict descendants of `dir`, in path order.
    fn descendants(&self, dir: &str) -> Vec<(String, u64)> {
        let prefix = path::child_prefix(dir);
        self.paths
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| p.as_str() != dir)
            .map(|(p, ino)| (p.clone(), *ino))
            .collect()
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = path::child_prefix(dir);
        self.paths
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .any(|(p, _)| p.as_str() != dir)
    }

    // ========================================================================
    // Path resolution
    // ========================================================================

    /// Resolve every symlink along `path`, component by component.
    ///
    /// Relative targets resolve against the symlink's parent, absolute ones
    /// from `/`. Once a component is missing the rest is appended verbatim.
    fn resolve(&self, raw: &str) -> VfsResult<String> {
        let normalized = path::normalize(raw);
        let mut pending: VecDeque<String> = normalized
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let mut resolved = String::from("/");
        let mut hops = 0usize;

        while let Some(component) = pending.pop_front() {
            match component.as_str() {
                "" | "." => continue,
                ".." => {
                    resolved = path::parent(&resolved).unwrap_or("/").to_string();
                    continue;
                }
                _ => {}
            }

            let candidate = path::join(&resolved, &component);
            match self.lookup(&candidate) {
                Some(inode) if inode.kind.is_symlink() => {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(VfsError::TooManySymlinks(normalized));
                    }
                    let target = inode.link_target.as_deref().unwrap_or("");
                    if target.starts_with('/') {
                        resolved = "/".to_string();
                    }
                    for (i, part) in target.split('/').filter(|c| !c.is_empty()).enumerate() {
                        pending.insert(i, part.to_string());
                    }
                }
                Some(_) => resolved = candidate,
                None => {
                    resolved = candidate;
                    for rest in pending.drain(..) {
                        resolved = path::join(&resolved, &rest);
                    }
                }
            }
        }

        Ok(resolved)
    }

    /// Resolve the parent, keep the final component as-is.
    fn locate(&self, raw: &str) -> VfsResult<String> {
        let normalized = path::normalize(raw);
        match path::parent(&normalized) {
            None => Ok(normalized),
            Some(parent) => Ok(path::join(
                &self.resolve(parent)?,
                path::file_name(&normalized),
            )),
        }
    }

    fn find(&self, raw: &str, follow: bool) -> VfsResult<&Inode> {
        let real = if follow {
            self.resolve(raw)?
        } else {
            self.locate(raw)?
        };
        self.lookup(&real)
            .ok_or_else(|| VfsError::not_found(path::normalize(raw)))
    }

    /// Inode number of `target`'s parent, which must be an existing directory.
    fn require_parent_dir(&self, target: &str) -> VfsResult<u64> {
        let Some(parent) = path::parent(target) else {
            return Err(VfsError::already_exists(target));
        };
        match self.lookup(parent) {
            None => Err(VfsError::not_found(target)),
            Some(inode) if !inode.kind.is_dir() => Err(VfsError::not_a_directory(parent)),
            Some(inode) => Ok(inode.ino),
        }
    }

    // ========================================================================
    // Blobs
    // ========================================================================

    /// Give up one reference; free the blob when none remain.
    fn release_blob(&mut self, blob: Option<BlobId>) {
        let Some(id) = blob else { return };
        let remaining = match self.blobs.get_mut(&id) {
            Some(b) => {
                b.refs = b.refs.saturating_sub(1);
                b.refs
            }
            None => return,
        };
        if remaining == 0 {
            self.blobs.remove(&id);
            tracing::trace!(blob = %id, "blob freed");
        } else {
            self.sync_nlink(id);
        }
    }

    /// Blob owned by `ino`, created empty if the file has none yet.
    fn ensure_blob(&mut self, ino: u64) -> BlobId {
        let existing = self.inodes.get(&ino).and_then(|i| i.blob);
        if let Some(id) = existing.filter(|id| self.blobs.contains_key(id)) {
            return id;
        }
        let blob = Blob::new(Vec::new());
        let id = blob.id;
        self.blobs.insert(id, blob);
        if let Some(inode) = self.inodes.get_mut(&ino) {
            inode.blob = Some(id);
        }
        id
    }

    /// Detach `ino` from its blob without touching anything else.
    fn detach_blob(&mut self, ino: u64) {
        let blob = self.inodes.get_mut(&ino).and_then(|i| i.blob.take());
        self.release_blob(blob);
        if let Some(inode) = self.inodes.get_mut(&ino) {
            inode.nlink = 1;
        }
    }

    fn set_content(&mut self, ino: u64, data: Vec<u8>) {
        let id = self.ensure_blob(ino);
        if let Some(blob) = self.blobs.get_mut(&id) {
            blob.set_data(data);
            blob.tier = Tier::Hot;
        }
        self.sync_content(id);
    }

    fn resize_content(&mut self, ino: u64, len: u64) {
        let id = self.ensure_blob(ino);
        if let Some(blob) = self.blobs.get_mut(&id) {
            blob.resize(len);
        }
        self.sync_content(id);
    }

    /// Push blob size to every inode sharing it and bump their times.
    fn sync_content(&mut self, id: BlobId) {
        let Some(size) = self.blobs.get(&id).map(|b| b.size) else {
            return;
        };
        for inode in self.inodes.values_mut().filter(|i| i.blob == Some(id)) {
            inode.size = size;
            inode.tier = Tier::Hot;
            inode.touch_content();
        }
    }

    /// Hard links share a blob, so their link count is its refcount.
    fn sync_nlink(&mut self, id: BlobId) {
        let Some(refs) = self.blobs.get(&id).map(|b| b.refs) else {
            return;
        };
        for inode in self.inodes.values_mut().filter(|i| i.blob == Some(id)) {
            inode.nlink = refs;
            inode.touch_meta();
        }
    }

    fn inode_mut(&mut self, ino: u64) -> VfsResult<&mut Inode> {
        self.inodes
            .get_mut(&ino)
            .ok_or_else(|| VfsError::not_found(format!("inode {ino}")))
    }
}

/// In-memory filesystem store.
///
/// Thread-safe via an internal `RwLock`; mutations are serialized per
/// instance. All data is lost when dropped unless saved with
/// [`MemoryFs::save_to`].
#[derive(Debug)]
pub struct MemoryFs {
    tables: RwLock<Tables>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create a store holding only `/`.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
        }
    }

    /// Rebuild a store from persisted records. `/` is recreated if missing.
    pub fn from_parts(inodes: Vec<Inode>, blobs: Vec<Blob>) -> VfsResult<Self> {
        let mut tables = Tables {
            inodes: HashMap::new(),
            paths: BTreeMap::new(),
            blobs: blobs.into_iter().map(|b| (b.id, b)).collect(),
            next_ino: ROOT_INO + 1,
        };
        for inode in inodes {
            if inode.path == "/" && !inode.kind.is_dir() {
                return Err(VfsError::invalid("/", "root is not a directory"));
            }
            tables.next_ino = tables.next_ino.max(inode.ino + 1);
            tables.insert(inode);
        }
        if tables.lookup("/").is_none() {
            tables.insert(Inode::root());
        }
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Copy out every inode and blob.
    pub fn snapshot(&self) -> (Vec<Inode>, Vec<Blob>) {
        let t = self.tables.read();
        let inodes = t
            .paths
            .values()
            .filter_map(|ino| t.inodes.get(ino).cloned())
            .collect();
        let blobs = t.blobs.values().cloned().collect();
        (inodes, blobs)
    }

    /// Number of live inodes, `/` included.
    pub fn inode_count(&self) -> usize {
        self.tables.read().inodes.len()
    }

    /// Number of live blobs.
    pub fn blob_count(&self) -> usize {
        self.tables.read().blobs.len()
    }

    /// Blob id backing a file, if it has one.
    pub fn blob_id(&self, path: &str) -> VfsResult<Option<BlobId>> {
        Ok(self.tables.read().find(path, true)?.blob)
    }

    // ========================================================================
    // Tier placement
    // ========================================================================

    /// Recorded tier and size for a file.
    pub fn placement(&self, path: &str) -> VfsResult<Placement> {
        let t = self.tables.read();
        let inode = t.find(path, true)?;
        if inode.kind.is_dir() {
            return Err(VfsError::is_a_directory(inode.path.clone()));
        }
        Ok(Placement {
            tier: inode.tier,
            size: inode.size,
        })
    }

    /// Real path of `path` with only its parent resolved, so a symlink at
    /// the final component names the link itself.
    pub fn locate(&self, path: &str) -> VfsResult<String> {
        self.tables.read().locate(path)
    }

    /// Record that a file's payload lives elsewhere. The file inode is
    /// created if needed and its hot blob (if any) is released.
    pub fn record_placement(&self, path: &str, placement: Placement) -> VfsResult<()> {
        let mut t = self.tables.write();
        let target = t.resolve(path)?;
        let ino = match t.lookup(&target) {
            Some(inode) if inode.kind.is_dir() => {
                return Err(VfsError::is_a_directory(target));
            }
            Some(inode) => inode.ino,
            None => {
                let parent = t.require_parent_dir(&target)?;
                let ino = t.alloc_ino();
                t.insert(Inode::file(ino, target, parent, 0o644));
                ino
            }
        };
        t.detach_blob(ino);
        let inode = t.inode_mut(ino)?;
        inode.tier = placement.tier;
        inode.size = placement.size;
        inode.touch_content();
        Ok(())
    }
}

#[async_trait]
impl VfsOps for MemoryFs {
    async fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let mut t = self.tables.write();
        let inode = t.find(path, true)?;
        if inode.kind.is_dir() {
            return Err(VfsError::is_a_directory(inode.path.clone()));
        }
        let ino = inode.ino;
        let data = inode
            .blob
            .and_then(|id| t.blobs.get(&id))
            .map(|b| b.data.clone())
            .unwrap_or_default();
        t.inode_mut(ino)?.atime = SystemTime::now();
        Ok(data)
    }

    async fn readdir(&self, path: &str, options: ReadDirOptions) -> VfsResult<Vec<DirEntry>> {
        let t = self.tables.read();
        let dir = t.find(path, true)?;
        if !dir.kind.is_dir() {
            return Err(VfsError::not_a_directory(dir.path.clone()));
        }

        let prefix = path::child_prefix(&dir.path);
        let entries = t
            .paths
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| p.as_str() != dir.path)
            .filter_map(|(p, ino)| {
                let rel = &p[prefix.len()..];
                if !options.recursive && rel.contains('/') {
                    return None;
                }
                t.inodes.get(ino).map(|i| DirEntry::new(rel, i.kind))
            })
            .collect();
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> VfsResult<Stats> {
        Ok(self.tables.read().find(path, true)?.stats())
    }

    async fn lstat(&self, path: &str) -> VfsResult<Stats> {
        Ok(self.tables.read().find(path, false)?.stats())
    }

    async fn readlink(&self, path: &str) -> VfsResult<String> {
        let t = self.tables.read();
        let inode = t.find(path, false)?;
        match (&inode.kind, &inode.link_target) {
            (FileType::Symlink, Some(target)) => Ok(target.clone()),
            _ => Err(VfsError::invalid(inode.path.clone(), "not a symbolic link")),
        }
    }

    async fn realpath(&self, path: &str) -> VfsResult<String> {
        self.tables.read().resolve(path)
    }

    #[tracing::instrument(level = "debug", skip(self, data), fields(len = data.len()))]
    async fn write(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        let mut t = self.tables.write();
        let target = t.resolve(path)?;
        match t.lookup(&target).map(|i| (i.ino, i.kind)) {
            Some((_, FileType::Directory)) => Err(VfsError::is_a_directory(target)),
            Some((ino, _)) => {
                t.set_content(ino, data.to_vec());
                Ok(())
            }
            None => {
                let parent = t.require_parent_dir(&target)?;
                let ino = t.alloc_ino();
                t.insert(Inode::file(ino, target, parent, 0o644));
                t.set_content(ino, data.to_vec());
                Ok(())
            }
        }
    }

    async fn unlink(&self, path: &str) -> VfsResult<()> {
        let mut t = self.tables.write();
        let inode = t.find(path, false)?;
        if inode.kind.is_dir() {
            return Err(VfsError::is_a_directory(inode.path.clone()));
        }
        let ino = inode.ino;
        t.remove(ino);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let mut t = self.tables.write();
        let src = t.find(from, false)?;
        if src.ino == ROOT_INO {
            return Err(VfsError::permission_denied("/"));
        }
        let (src_ino, src_path, src_is_dir) = (src.ino, src.path.clone(), src.kind.is_dir());

        let dst_path = t.locate(to)?;
        if dst_path == src_path {
            return Ok(());
        }
        if path::is_descendant(&src_path, &dst_path) {
            return Err(VfsError::invalid(
                dst_path,
                "cannot move a directory into itself",
            ));
        }
        let parent_ino = t.require_parent_dir(&dst_path)?;

        if let Some(existing) = t.lookup(&dst_path) {
            let existing_ino = existing.ino;
            match (src_is_dir, existing.kind.is_dir()) {
                (true, true) if t.has_children(&dst_path) => {
                    return Err(VfsError::directory_not_empty(dst_path));
                }
                (true, false) => return Err(VfsError::not_a_directory(dst_path)),
                (false, true) => return Err(VfsError::is_a_directory(dst_path)),
                _ => t.remove(existing_ino),
            }
        }

        for (old, ino) in t.descendants(&src_path) {
            let moved = format!("{dst_path}{}", &old[src_path.len()..]);
            t.paths.remove(&old);
            t.paths.insert(moved.clone(), ino);
            t.inode_mut(ino)?.path = moved;
        }

        t.paths.remove(&src_path);
        t.paths.insert(dst_path.clone(), src_ino);
        let inode = t.inode_mut(src_ino)?;
        inode.name = path::file_name(&dst_path).to_string();
        inode.path = dst_path;
        inode.parent = Some(parent_ino);
        inode.touch_meta();
        Ok(())
    }

    async fn mkdir(&self, path: &str, options: MkdirOptions) -> VfsResult<()> {
        let mut t = self.tables.write();

        if !options.recursive {
            let target = t.locate(path)?;
            if t.lookup(&target).is_some() {
                return Err(VfsError::already_exists(target));
            }
            let parent = t.require_parent_dir(&target)?;
            let ino = t.alloc_ino();
            t.insert(Inode::directory(ino, target, parent, options.mode));
            return Ok(());
        }

        let target = t.resolve(path)?;
        let mut parent = ROOT_INO;
        for prefix in path::ancestors_inclusive(&target).into_iter().skip(1) {
            match t.lookup(&prefix) {
                Some(inode) if inode.kind.is_dir() => parent = inode.ino,
                Some(_) if prefix == target => return Err(VfsError::already_exists(prefix)),
                Some(_) => return Err(VfsError::not_a_directory(prefix)),
                None => {
                    let ino = t.alloc_ino();
                    t.insert(Inode::directory(ino, prefix, parent, options.mode));
                    parent = ino;
                }
            }
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn rmdir(&self, path: &str, options: RmdirOptions) -> VfsResult<()> {
        let mut t = self.tables.write();
        let dir = t.find(path, false)?;
        if dir.ino == ROOT_INO {
            return Err(VfsError::permission_denied("/"));
        }
        if !dir.kind.is_dir() {
            return Err(VfsError::not_a_directory(dir.path.clone()));
        }
        let (ino, dir_path) = (dir.ino, dir.path.clone());

        let descendants = t.descendants(&dir_path);
        if !descendants.is_empty() && !options.recursive {
            return Err(VfsError::directory_not_empty(dir_path));
        }
        // Deepest first.
        for (_, child) in descendants.into_iter().rev() {
            t.remove(child);
        }
        t.remove(ino);
        Ok(())
    }

    async fn truncate(&self, path: &str, len: u64) -> VfsResult<()> {
        let mut t = self.tables.write();
        let inode = t.find(path, true)?;
        if inode.kind.is_dir() {
            return Err(VfsError::is_a_directory(inode.path.clone()));
        }
        if inode.tier != Tier::Hot {
            // Resizing an empty hot blob would lose the real payload.
            return Err(VfsError::permission_denied(inode.path.clone()));
        }
        let ino = inode.ino;
        t.resize_content(ino, len);
        Ok(())
    }

    async fn symlink(&self, target: &str, path: &str) -> VfsResult<()> {
        let mut t = self.tables.write();
        let dst = t.locate(path)?;
        if target.is_empty() {
            return Err(VfsError::not_found(dst));
        }
        if t.lookup(&dst).is_some() {
            return Err(VfsError::already_exists(dst));
        }
        let parent = t.require_parent_dir(&dst)?;
        let ino = t.alloc_ino();
        t.insert(Inode::symlink(ino, dst, parent, target));
        Ok(())
    }

    async fn link(&self, existing: &str, new: &str) -> VfsResult<()> {
        let mut t = self.tables.write();
        let src = t.find(existing, true)?;
        if src.kind.is_dir() {
            return Err(VfsError::permission_denied(src.path.clone()));
        }
        if src.tier != Tier::Hot {
            // The payload is not ours to share.
            return Err(VfsError::permission_denied(src.path.clone()));
        }
        let src_ino = src.ino;

        let dst = t.locate(new)?;
        if t.lookup(&dst).is_some() {
            return Err(VfsError::already_exists(dst));
        }
        let parent = t.require_parent_dir(&dst)?;

        let blob_id = t.ensure_blob(src_ino);
        if let Some(blob) = t.blobs.get_mut(&blob_id) {
            blob.refs += 1;
        }

        let mut inode = t.inode_mut(src_ino)?.clone();
        inode.ino = t.alloc_ino();
        inode.name = path::file_name(&dst).to_string();
        inode.path = dst;
        inode.parent = Some(parent);
        t.insert(inode);
        t.sync_nlink(blob_id);
        Ok(())
    }

    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        let mut t = self.tables.write();
        let ino = t.find(path, true)?.ino;
        let inode = t.inode_mut(ino)?;
        inode.mode = mode & 0o7777;
        inode.touch_meta();
        Ok(())
    }

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        let mut t = self.tables.write();
        let ino = t.find(path, true)?.ino;
        let inode = t.inode_mut(ino)?;
        inode.uid = uid;
        inode.gid = gid;
        inode.touch_meta();
        Ok(())
    }

    async fn utimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        let mut t = self.tables.write();
        let ino = t.find(path, true)?.ino;
        let inode = t.inode_mut(ino)?;
        inode.atime = atime;
        inode.mtime = mtime;
        inode.touch_meta();
        Ok(())
    }
}
