//! Migration journal.
//!
//! Moving a payload between tiers takes three steps (copy the payload,
//! update the hot store's metadata, drop the old copy) that cannot be made
//! atomic together. Each migration records how far it got so
//! [`TieredFs::reconcile`](super::TieredFs::reconcile) can finish or undo
//! it after a failure.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use strum::Display;

use crate::vfs::Tier;

/// Progress of one migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MigrationState {
    /// Nothing durable yet; the destination may hold a partial copy.
    Pending,
    /// The destination holds the full payload; metadata still names the source.
    PayloadCopied,
    /// Metadata names the destination; the source copy may still exist.
    MetadataUpdated,
    Done,
}

/// One payload move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    pub id: u64,
    /// Real (symlink-free) path, which is also the payload key.
    pub path: String,
    pub from: Tier,
    pub to: Tier,
    pub size: u64,
    pub state: MigrationState,
}

/// In-flight migrations. Finished ones are dropped.
#[derive(Debug, Default)]
pub struct MigrationJournal {
    next_id: AtomicU64,
    entries: DashMap<u64, Migration>,
}

impl MigrationJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new migration in the `Pending` state.
    pub fn begin(&self, path: &str, from: Tier, to: Tier, size: u64) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.insert(
            id,
            Migration {
                id,
                path: path.to_string(),
                from,
                to,
                size,
                state: MigrationState::Pending,
            },
        );
        tracing::debug!(id, path, %from, %to, "migration begun");
        id
    }

    /// Move a migration forward. `Done` removes it.
    pub fn advance(&self, id: u64, state: MigrationState) {
        if state == MigrationState::Done {
            self.entries.remove(&id);
            tracing::debug!(id, "migration done");
            return;
        }
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.state = state;
            tracing::trace!(id, %state, "migration advanced");
        }
    }

    pub fn get(&self, id: u64) -> Option<Migration> {
        self.entries.get(&id).map(|e| e.value().clone())
    }

    /// Unfinished migrations, oldest first.
    pub fn pending(&self) -> Vec<Migration> {
        let mut pending: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        pending.sort_by_key(|m| m.id);
        pending
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
