//! Hot/warm/cold payload tiering.
//!
//! - [`TieredFs`] - places payloads by size over a hot [`MemoryFs`] store
//! - [`TierBackend`] - raw payload storage for the warm and cold tiers
//! - [`MigrationJournal`] - progress of in-flight payload moves
//!
//! The hot store always holds the metadata, including which tier a file's
//! payload lives on; backends hold bytes only.
//!
//! [`MemoryFs`]: crate::vfs::MemoryFs

mod backend;
mod config;
mod journal;
mod manager;

pub use backend::{LocalTier, MemoryTier, TierBackend};
pub use config::{DEFAULT_HOT_MAX_SIZE, DEFAULT_WARM_MAX_SIZE, PromotionPolicy, TierConfig};
pub use journal::{Migration, MigrationJournal, MigrationState};
pub use manager::{ReconcileReport, TieredFs};
