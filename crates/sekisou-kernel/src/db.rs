//! SQLite image of the hot store.
//!
//! One table of inodes (unique path) and one table of blobs. Saving
//! replaces the whole image in a single transaction.

use rusqlite::types::Type;
use rusqlite::{Connection, Result as SqliteResult, params};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::vfs::{Blob, Inode, MemoryFs, VfsResult};

const SCHEMA: &str = r#"
-- Filesystem entries; times are nanoseconds since the Unix epoch
CREATE TABLE IF NOT EXISTS inodes (
    ino INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    parent INTEGER,
    kind TEXT NOT NULL,
    mode INTEGER NOT NULL,
    uid INTEGER NOT NULL DEFAULT 0,
    gid INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL DEFAULT 0,
    blob_id TEXT,
    link_target TEXT,
    tier TEXT NOT NULL DEFAULT 'hot',
    atime INTEGER NOT NULL,
    mtime INTEGER NOT NULL,
    ctime INTEGER NOT NULL,
    birthtime INTEGER NOT NULL,
    nlink INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_inodes_parent ON inodes(parent);

-- Payloads, shared by hard links
CREATE TABLE IF NOT EXISTS blobs (
    id TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    size INTEGER NOT NULL,
    checksum TEXT,
    tier TEXT NOT NULL DEFAULT 'hot',
    refs INTEGER NOT NULL DEFAULT 1
);
"#;

/// Database handle for store images.
pub struct FsDb {
    conn: Connection,
}

fn to_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i64,
        Err(e) => -(e.duration().as_nanos() as i64),
    }
}

fn from_nanos(nanos: i64) -> SystemTime {
    let offset = Duration::from_nanos(nanos.unsigned_abs());
    if nanos >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

/// Parse a text column, reporting failures as a conversion error.
fn parse_column<T>(idx: usize, text: &str) -> SqliteResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl FsDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Replace the stored image.
    pub fn save(&mut self, inodes: &[Inode], blobs: &[Blob]) -> SqliteResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM inodes", [])?;
        tx.execute("DELETE FROM blobs", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO inodes (ino, path, name, parent, kind, mode, uid, gid, size,
                    blob_id, link_target, tier, atime, mtime, ctime, birthtime, nlink)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            )?;
            for inode in inodes {
                stmt.execute(params![
                    inode.ino as i64,
                    inode.path,
                    inode.name,
                    inode.parent.map(|p| p as i64),
                    inode.kind.as_ref(),
                    inode.mode,
                    inode.uid,
                    inode.gid,
                    inode.size as i64,
                    inode.blob.map(|b| b.to_string()),
                    inode.link_target,
                    inode.tier.as_ref(),
                    to_nanos(inode.atime),
                    to_nanos(inode.mtime),
                    to_nanos(inode.ctime),
                    to_nanos(inode.birthtime),
                    inode.nlink,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO blobs (id, data, size, checksum, tier, refs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for blob in blobs {
                stmt.execute(params![
                    blob.id.to_string(),
                    blob.data,
                    blob.size as i64,
                    blob.checksum,
                    blob.tier.as_ref(),
                    blob.refs,
                ])?;
            }
        }

        tx.commit()
    }

    /// Load every inode, ordered by path.
    pub fn load_inodes(&self) -> SqliteResult<Vec<Inode>> {
        let mut stmt = self.conn.prepare(
            "SELECT ino, path, name, parent, kind, mode, uid, gid, size, blob_id,
                    link_target, tier, atime, mtime, ctime, birthtime, nlink
             FROM inodes ORDER BY path",
        )?;

        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(4)?;
            let blob: Option<String> = row.get(9)?;
            let tier: String = row.get(11)?;
            Ok(Inode {
                ino: row.get::<_, i64>(0)? as u64,
                path: row.get(1)?,
                name: row.get(2)?,
                parent: row.get::<_, Option<i64>>(3)?.map(|p| p as u64),
                kind: parse_column(4, &kind)?,
                mode: row.get(5)?,
                uid: row.get(6)?,
                gid: row.get(7)?,
                size: row.get::<_, i64>(8)? as u64,
                blob: blob.map(|b| parse_column(9, &b)).transpose()?,
                link_target: row.get(10)?,
                tier: parse_column(11, &tier)?,
                atime: from_nanos(row.get(12)?),
                mtime: from_nanos(row.get(13)?),
                ctime: from_nanos(row.get(14)?),
                birthtime: from_nanos(row.get(15)?),
                nlink: row.get(16)?,
            })
        })?;

        rows.collect()
    }

    /// Load every blob.
    pub fn load_blobs(&self) -> SqliteResult<Vec<Blob>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, data, size, checksum, tier, refs FROM blobs")?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let tier: String = row.get(4)?;
            Ok(Blob {
                id: parse_column(0, &id)?,
                data: row.get(1)?,
                size: row.get::<_, i64>(2)? as u64,
                checksum: row.get(3)?,
                tier: parse_column(4, &tier)?,
                refs: row.get(5)?,
            })
        })?;

        rows.collect()
    }

    /// Number of stored inodes.
    pub fn inode_count(&self) -> SqliteResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM inodes", [], |row| row.get(0))
    }
}

impl MemoryFs {
    /// Write this store's full image to `db`.
    pub fn save_to(&self, db: &mut FsDb) -> VfsResult<()> {
        let (inodes, blobs) = self.snapshot();
        db.save(&inodes, &blobs)?;
        tracing::debug!(inodes = inodes.len(), blobs = blobs.len(), "store image saved");
        Ok(())
    }

    /// Rebuild a store from an image. An empty image yields a store with
    /// only `/`.
    pub fn load_from(db: &FsDb) -> VfsResult<Self> {
        let inodes = db.load_inodes()?;
        let blobs = db.load_blobs()?;
        tracing::debug!(inodes = inodes.len(), blobs = blobs.len(), "store image loaded");
        MemoryFs::from_parts(inodes, blobs)
    }
}
