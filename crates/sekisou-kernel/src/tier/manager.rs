//! Size-based payload placement over a hot store plus optional warm and
//! cold backends.

use std::sync::Arc;

use serde::Serialize;

use super::backend::TierBackend;
use super::config::{PromotionPolicy, TierConfig};
use super::journal::{Migration, MigrationJournal, MigrationState};
use crate::vfs::{
    MemoryFs, Placement, ReadDirOptions, RmOptions, Tier, VfsError, VfsOps, VfsResult, path,
};

/// Outcome of [`TieredFs::reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Migrations completed from where they stopped.
    pub rolled_forward: usize,
    /// Migrations undone, leaving the payload on its source tier.
    pub rolled_back: usize,
}

/// Tiered filesystem facade.
///
/// Metadata always lives in the hot [`MemoryFs`]; payloads land on the
/// tier chosen by size. A missing warm or cold backend is never an error:
/// placement degrades to the nearest configured tier.
#[derive(Debug)]
pub struct TieredFs {
    store: Arc<MemoryFs>,
    warm: Option<Arc<dyn TierBackend>>,
    cold: Option<Arc<dyn TierBackend>>,
    config: TierConfig,
    journal: MigrationJournal,
}

impl TieredFs {
    pub fn new(store: Arc<MemoryFs>, config: TierConfig) -> Self {
        Self {
            store,
            warm: None,
            cold: None,
            config,
            journal: MigrationJournal::new(),
        }
    }

    pub fn with_warm(mut self, backend: Arc<dyn TierBackend>) -> Self {
        self.warm = Some(backend);
        self
    }

    pub fn with_cold(mut self, backend: Arc<dyn TierBackend>) -> Self {
        self.cold = Some(backend);
        self
    }

    /// The hot store.
    pub fn store(&self) -> &Arc<MemoryFs> {
        &self.store
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    fn backend(&self, tier: Tier) -> Option<&Arc<dyn TierBackend>> {
        match tier {
            Tier::Hot => None,
            Tier::Warm => self.warm.as_ref(),
            Tier::Cold => self.cold.as_ref(),
        }
    }

    fn is_configured(&self, tier: Tier) -> bool {
        tier == Tier::Hot || self.backend(tier).is_some()
    }

    /// `tier` if configured, else the nearest configured one, preferring
    /// slower tiers before falling back to hot.
    fn nearest_configured(&self, tier: Tier) -> Tier {
        let candidates: &[Tier] = match tier {
            Tier::Hot => &[Tier::Hot],
            Tier::Warm => &[Tier::Warm, Tier::Cold, Tier::Hot],
            Tier::Cold => &[Tier::Cold, Tier::Warm, Tier::Hot],
        };
        candidates
            .iter()
            .copied()
            .find(|t| self.is_configured(*t))
            .unwrap_or(Tier::Hot)
    }

    /// Pick a tier for a payload of `size` bytes.
    pub fn select_tier(&self, size: u64) -> Tier {
        if size <= self.config.hot_max_size {
            Tier::Hot
        } else if self.warm.is_some() && size <= self.config.warm_max_size {
            Tier::Warm
        } else if self.cold.is_some() {
            Tier::Cold
        } else if self.warm.is_some() {
            Tier::Warm
        } else {
            Tier::Hot
        }
    }

    /// Recorded placement of a file.
    pub fn placement(&self, path: &str) -> VfsResult<Placement> {
        self.store.placement(path)
    }

    // ========================================================================
    // Payload I/O
    // ========================================================================

    async fn load_payload(&self, key: &str, tier: Tier) -> VfsResult<Vec<u8>> {
        match self.backend(tier) {
            Some(backend) => backend.get(key).await,
            None => {
                if tier != Tier::Hot {
                    tracing::warn!(path = key, %tier, "tier not configured, reading hot store");
                }
                self.store.read(key).await
            }
        }
    }

    async fn drop_payload(&self, key: &str, tier: Tier) -> VfsResult<()> {
        match self.backend(tier) {
            Some(backend) => backend.delete(key).await,
            None => Ok(()),
        }
    }

    /// Write a file, placing its payload by size. Returns the chosen tier.
    #[tracing::instrument(level = "debug", skip(self, data), fields(len = data.len()))]
    pub async fn write_file(&self, path: &str, data: &[u8]) -> VfsResult<Tier> {
        let key = self.store.realpath(path).await?;
        let previous = match self.store.placement(&key) {
            Ok(placement) => Some(placement.tier),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let tier = self.select_tier(data.len() as u64);

        match self.backend(tier) {
            None => self.store.write(&key, data).await?,
            Some(backend) => {
                backend.put(&key, data).await?;
                let placement = Placement {
                    tier,
                    size: data.len() as u64,
                };
                if let Err(e) = self.store.record_placement(&key, placement) {
                    // Nothing references the copy we just made.
                    backend.delete(&key).await?;
                    return Err(e);
                }
            }
        }

        if let Some(old) = previous.filter(|old| *old != tier) {
            self.drop_payload(&key, old).await?;
        }
        tracing::debug!(path = %key, %tier, "payload placed");
        Ok(tier)
    }

    /// Read a file from its recorded tier, promoting per policy.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        let key = self.store.realpath(path).await?;
        let placement = self.store.placement(&key)?;
        let data = self.load_payload(&key, placement.tier).await?;

        if placement.tier != Tier::Hot && self.is_configured(placement.tier) {
            let target = match self.config.promotion_policy {
                PromotionPolicy::None => None,
                PromotionPolicy::OnAccess => Some(self.select_tier(placement.size)),
                PromotionPolicy::Aggressive => Some(Tier::Hot),
            };
            if let Some(target) = target.filter(|t| t.is_faster_than(placement.tier)) {
                if let Err(e) = self.migrate(&key, placement.tier, target, &data).await {
                    tracing::warn!(path = %key, error = %e, "promotion failed");
                }
            }
        }
        Ok(data)
    }

    /// Move a file's payload to a slower tier. Returns where it ended up.
    ///
    /// An unconfigured target falls back to the nearest configured tier; a
    /// target no slower than the current tier leaves the file alone.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn demote(&self, path: &str, to: Tier) -> VfsResult<Tier> {
        let key = self.store.realpath(path).await?;
        let current = self.store.placement(&key)?.tier;
        let target = self.nearest_configured(to);
        if !current.is_faster_than(target) {
            return Ok(current);
        }
        let data = self.load_payload(&key, current).await?;
        self.migrate(&key, current, target, &data).await?;
        Ok(target)
    }

    /// Move a file's payload to a faster tier. Returns where it ended up.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn promote(&self, path: &str, to: Tier) -> VfsResult<Tier> {
        let key = self.store.realpath(path).await?;
        let current = self.store.placement(&key)?.tier;
        if !self.is_configured(to) || !to.is_faster_than(current) {
            return Ok(current);
        }
        let data = self.load_payload(&key, current).await?;
        self.migrate(&key, current, to, &data).await?;
        Ok(to)
    }

    /// Journaled three-step move: copy, repoint metadata, drop the source.
    async fn migrate(&self, key: &str, from: Tier, to: Tier, data: &[u8]) -> VfsResult<()> {
        let size = data.len() as u64;
        let id = self.journal.begin(key, from, to, size);

        match self.backend(to) {
            // The hot store holds payload and metadata together.
            None => {
                self.store.write(key, data).await?;
                self.journal.advance(id, MigrationState::PayloadCopied);
            }
            Some(backend) => {
                backend.put(key, data).await?;
                self.journal.advance(id, MigrationState::PayloadCopied);
                self.store.record_placement(key, Placement { tier: to, size })?;
            }
        }
        self.journal.advance(id, MigrationState::MetadataUpdated);

        self.drop_payload(key, from).await?;
        self.journal.advance(id, MigrationState::Done);
        tracing::info!(path = key, %from, %to, size, "payload migrated");
        Ok(())
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Migrations that have not reached `Done`.
    pub fn pending_migrations(&self) -> Vec<Migration> {
        self.journal.pending()
    }

    /// Finish or undo every interrupted migration.
    ///
    /// A migration whose payload reached the destination is completed;
    /// one that did not is rolled back. If the file changed tier since,
    /// the migration's destination copy is discarded instead.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn reconcile(&self) -> VfsResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for migration in self.journal.pending() {
            let Migration {
                id,
                path: key,
                from,
                to,
                size,
                state,
            } = migration;

            let current = match self.store.placement(&key) {
                Ok(placement) => Some(placement.tier),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };

            match (state, current) {
                // File is gone: drop whatever copies the move left behind.
                (_, None) => {
                    self.drop_payload(&key, to).await?;
                    self.drop_payload(&key, from).await?;
                    report.rolled_back += 1;
                }
                // Metadata already names the destination; only the source copy is stale.
                (_, Some(tier)) if tier == to => {
                    self.drop_payload(&key, from).await?;
                    report.rolled_forward += 1;
                }
                (MigrationState::PayloadCopied, Some(tier)) if tier == from => {
                    self.store.record_placement(&key, Placement { tier: to, size })?;
                    self.drop_payload(&key, from).await?;
                    report.rolled_forward += 1;
                }
                (_, Some(_)) => {
                    self.drop_payload(&key, to).await?;
                    report.rolled_back += 1;
                }
            }
            self.journal.advance(id, MigrationState::Done);
        }

        if report != ReconcileReport::default() {
            tracing::info!(
                forward = report.rolled_forward,
                back = report.rolled_back,
                "reconciled migrations"
            );
        }
        Ok(report)
    }

    // ========================================================================
    // Namespace operations that must carry payloads along
    // ========================================================================

    /// Remove a file or tree, dropping off-hot payloads with it.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn remove(&self, path: &str, options: RmOptions) -> VfsResult<()> {
        let keys = match self.offhot_files(path).await {
            Ok(keys) => keys,
            Err(e) if e.is_not_found() && options.force => return Ok(()),
            Err(e) => return Err(e),
        };
        self.store.rm(path, options).await?;
        for (key, tier) in keys {
            self.drop_payload(&key, tier).await?;
        }
        Ok(())
    }

    /// Rename a file or tree, re-keying off-hot payloads. A file replaced
    /// at `to` loses its off-hot payload.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let src = self.store.locate(from)?;
        let dst = self.store.locate(to)?;
        let keys = self.offhot_files(from).await?;
        let replaced: Vec<(String, Tier)> = match self.offhot_files(to).await {
            Ok(found) => found
                .into_iter()
                .filter(|(key, _)| !keys.iter().any(|(moved, _)| moved == key))
                .collect(),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        self.store.rename(from, to).await?;
        if src == dst {
            return Ok(());
        }

        // Before re-keying: a moved payload may land on the same key.
        for (key, tier) in replaced {
            self.drop_payload(&key, tier).await?;
        }
        for (old_key, tier) in keys {
            let Some(backend) = self.backend(tier) else {
                continue;
            };
            let suffix = path::strip_base(&src, &old_key).unwrap_or("");
            let new_key = path::join(&dst, suffix);
            if new_key == old_key {
                continue;
            }
            let data = backend.get(&old_key).await?;
            backend.put(&new_key, &data).await?;
            backend.delete(&old_key).await?;
        }
        Ok(())
    }

    /// Resize a file to `len` bytes, zero-extending, and place the result
    /// by its new size. Returns the tier it ended up on.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn truncate(&self, path: &str, len: u64) -> VfsResult<Tier> {
        let key = self.store.realpath(path).await?;
        let placement = self.store.placement(&key)?;
        if placement.tier == Tier::Hot && self.select_tier(len) == Tier::Hot {
            self.store.truncate(&key, len).await?;
            return Ok(Tier::Hot);
        }

        let len = usize::try_from(len)
            .map_err(|_| VfsError::invalid(key.clone(), "length out of range"))?;
        let mut data = self.load_payload(&key, placement.tier).await?;
        data.resize(len, 0);
        self.write_file(&key, &data).await
    }

    /// Real paths and tiers of files under `path` whose payload is not hot.
    /// A symlink at `path` itself is not followed.
    async fn offhot_files(&self, path: &str) -> VfsResult<Vec<(String, Tier)>> {
        let stats = self.store.lstat(path).await?;
        if stats.is_symlink() {
            return Ok(Vec::new());
        }
        let root = self.store.realpath(path).await?;
        let candidates = if stats.is_dir() {
            self.store
                .readdir(&root, ReadDirOptions { recursive: true })
                .await?
                .into_iter()
                .filter(|entry| entry.kind.is_file())
                .map(|entry| path::join(&root, &entry.name))
                .collect()
        } else {
            vec![root]
        };

        let mut keys = Vec::new();
        for key in candidates {
            match self.store.placement(&key) {
                Ok(p) if p.tier != Tier::Hot => keys.push((key, p.tier)),
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(keys)
    }
}
