//! # sekisou-kernel
//!
//! Virtual filesystem core for sekisou.
//!
//! The store is a tree of inodes with payloads held in blobs. On top of it:
//! - `search` walks the tree with glob patterns or find-style filters
//! - `tier` places payloads on hot, warm and cold stores by size
//! - `db` persists the hot store as a SQLite image
//! - `config` reads `sekisou.toml`
//! - `size` parses byte sizes like `512K` for both of the above

pub mod config;
pub mod db;
pub mod search;
pub mod size;
pub mod tier;
pub mod vfs;

pub use config::{Config, ConfigError, StoreConfig, TiersConfig};
pub use db::FsDb;
pub use search::{FindOptions, FindResult, GlobOptions, find, glob};
pub use size::parse_size;
pub use tier::{
    LocalTier, MemoryTier, PromotionPolicy, ReconcileReport, TierBackend, TierConfig, TieredFs,
};
pub use vfs::{
    DirEntry, ErrorCode, FileType, MemoryFs, MkdirOptions, ReadDirOptions, RmOptions,
    RmdirOptions, Stats, Tier, VfsError, VfsOps, VfsResult,
};
