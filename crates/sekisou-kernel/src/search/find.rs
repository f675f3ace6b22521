//! find(1)-style queries.

use std::collections::HashSet;
use std::time::SystemTime;

use sekisou_glob::{MatchOptions, Pattern};
use serde::Serialize;

use super::filters::{NameFilter, SizeFilter, TimeFilter};
use crate::vfs::{FileType, ReadDirOptions, Stats, VfsError, VfsOps, VfsResult, path};

/// One find hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindResult {
    pub path: String,
    pub kind: FileType,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Query options. Filters are AND-combined.
///
/// String filters are parsed by the builder methods, so a bad filter fails
/// here rather than during the walk:
///
/// ```
/// use sekisou_kernel::search::FindOptions;
///
/// let opts = FindOptions::new("/src").name("*.rs").unwrap().size("+1K").unwrap();
/// assert!(FindOptions::new("/").size("lots").is_err());
/// # let _ = opts;
/// ```
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub start: String,
    pub name: Option<NameFilter>,
    pub kind: Option<FileType>,
    pub size: Option<SizeFilter>,
    pub mtime: Option<TimeFilter>,
    pub ctime: Option<TimeFilter>,
    pub atime: Option<TimeFilter>,
    /// Only zero-byte files and childless directories.
    pub empty: bool,
    /// The start path is depth 0.
    pub mindepth: Option<usize>,
    pub maxdepth: Option<usize>,
    /// Excluded (with their subtrees) below the start path.
    pub prune: Vec<Pattern>,
    /// Classify symlinks by target and descend into linked directories.
    pub follow_symlinks: bool,
    pub nocase: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self::new("/")
    }
}

impl FindOptions {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            name: None,
            kind: None,
            size: None,
            mtime: None,
            ctime: None,
            atime: None,
            empty: false,
            mindepth: None,
            maxdepth: None,
            prune: Vec::new(),
            follow_symlinks: false,
            nocase: false,
        }
    }

    /// Case-insensitive name and prune matching. Set before adding them.
    pub fn nocase(mut self, nocase: bool) -> Self {
        self.nocase = nocase;
        self
    }

    /// Basename glob.
    pub fn name(mut self, pattern: &str) -> VfsResult<Self> {
        self.name = Some(NameFilter::glob(pattern, self.nocase)?);
        Ok(self)
    }

    /// Basename regex.
    pub fn name_regex(mut self, pattern: &str) -> VfsResult<Self> {
        self.name = Some(NameFilter::regex(pattern, self.nocase)?);
        Ok(self)
    }

    pub fn kind(mut self, kind: FileType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn size(mut self, spec: &str) -> VfsResult<Self> {
        self.size = Some(SizeFilter::parse(spec)?);
        Ok(self)
    }

    pub fn mtime(mut self, spec: &str) -> VfsResult<Self> {
        self.mtime = Some(TimeFilter::parse(spec)?);
        Ok(self)
    }

    pub fn ctime(mut self, spec: &str) -> VfsResult<Self> {
        self.ctime = Some(TimeFilter::parse(spec)?);
        Ok(self)
    }

    pub fn atime(mut self, spec: &str) -> VfsResult<Self> {
        self.atime = Some(TimeFilter::parse(spec)?);
        Ok(self)
    }

    pub fn empty(mut self, empty: bool) -> Self {
        self.empty = empty;
        self
    }

    pub fn mindepth(mut self, depth: usize) -> Self {
        self.mindepth = Some(depth);
        self
    }

    pub fn maxdepth(mut self, depth: usize) -> Self {
        self.maxdepth = Some(depth);
        self
    }

    /// Prune entries whose name (or path relative to the start, for
    /// patterns containing `/`) matches. Plain names match literally.
    pub fn prune(mut self, pattern: &str) -> VfsResult<Self> {
        let options = MatchOptions::default().dot(true).nocase(self.nocase);
        self.prune.push(Pattern::with_options(pattern, options)?);
        Ok(self)
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    fn is_pruned(&self, name: &str, rel: &str) -> bool {
        self.prune.iter().any(|p| {
            if p.as_str().contains('/') {
                p.matches(rel)
            } else {
                p.matches(name)
            }
        })
    }

    fn accepts(&self, name: &str, stats: &Stats, is_empty: bool, now: SystemTime) -> bool {
        if let Some(kind) = self.kind {
            if stats.kind != kind {
                return false;
            }
        }
        if let Some(filter) = &self.name {
            if !filter.matches(name) {
                return false;
            }
        }
        if let Some(size) = &self.size {
            if !size.matches(stats.size) {
                return false;
            }
        }
        let times = [
            (&self.mtime, stats.mtime),
            (&self.ctime, stats.ctime),
            (&self.atime, stats.atime),
        ];
        for (filter, time) in times {
            if let Some(filter) = filter {
                if !filter.matches(time, now) {
                    return false;
                }
            }
        }
        !self.empty || is_empty
    }
}

/// Stat an entry. When following, a dangling or looping link reports as
/// the link itself.
async fn entry_stats<F: VfsOps + ?Sized>(fs: &F, path: &str, follow: bool) -> VfsResult<Stats> {
    if !follow {
        return fs.lstat(path).await;
    }
    match fs.stat(path).await {
        Ok(stats) => Ok(stats),
        Err(e) if e.is_not_found() || matches!(e, VfsError::TooManySymlinks(_)) => {
            fs.lstat(path).await
        }
        Err(e) => Err(e),
    }
}

/// Run a query.
///
/// A missing start path, or `mindepth > maxdepth`, yields no results.
/// Results are sorted by path.
#[tracing::instrument(level = "debug", skip(fs, options), fields(start = %options.start))]
pub async fn find<F: VfsOps + ?Sized>(fs: &F, options: &FindOptions) -> VfsResult<Vec<FindResult>> {
    let start = path::normalize(&options.start);
    let mindepth = options.mindepth.unwrap_or(0);
    let maxdepth = options.maxdepth.unwrap_or(usize::MAX);
    if mindepth > maxdepth {
        return Ok(Vec::new());
    }
    let follow = options.follow_symlinks;
    let now = SystemTime::now();

    let mut stack = vec![(start.clone(), 0usize)];
    let mut visited: HashSet<String> = HashSet::new();
    let mut results = Vec::new();

    while let Some((current, depth)) = stack.pop() {
        let stats = match entry_stats(fs, &current, follow).await {
            Ok(stats) => stats,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };

        let key = if follow && stats.is_dir() {
            fs.realpath(&current).await?
        } else {
            current.clone()
        };
        if !visited.insert(key) {
            tracing::trace!(path = %current, "already visited");
            continue;
        }

        let name = path::file_name(&current);
        if depth > 0 {
            let rel = path::strip_base(&start, &current).unwrap_or(&current);
            if options.is_pruned(name, rel) {
                continue;
            }
        }

        let children = if stats.is_dir() && (depth < maxdepth || options.empty) {
            match fs.readdir(&current, ReadDirOptions::default()).await {
                Ok(entries) => entries,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };

        let is_empty = if stats.is_dir() {
            children.is_empty()
        } else {
            stats.is_file() && stats.size == 0
        };

        if depth >= mindepth && options.accepts(name, &stats, is_empty, now) {
            results.push(FindResult {
                path: current.clone(),
                kind: stats.kind,
                size: stats.size,
                mtime: stats.mtime,
            });
        }

        if depth < maxdepth {
            for child in children.into_iter().rev() {
                stack.push((path::join(&current, &child.name), depth + 1));
            }
        }
    }

    results.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(count = results.len(), "find complete");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{MemoryFs, MkdirOptions};
    use std::time::Duration;

    async fn tree() -> MemoryFs {
        let fs = MemoryFs::new();
        for dir in ["/proj/src/util", "/proj/target/debug", "/proj/.git", "/proj/empty"] {
            fs.mkdir(dir, MkdirOptions::recursive()).await.unwrap();
        }
        fs.write("/proj/src/main.rs", b"fn main() {}").await.unwrap();
        fs.write("/proj/src/util/mod.rs", b"").await.unwrap();
        fs.write("/proj/target/debug/app", &vec![0u8; 2048]).await.unwrap();
        fs.write("/proj/.git/HEAD", b"ref: refs/heads/main").await.unwrap();
        fs.write("/proj/README.md", b"# proj").await.unwrap();
        fs
    }

    fn paths(results: &[FindResult]) -> Vec<&str> {
        results.iter().map(|r| r.path.as_str()).collect()
    }

    #[tokio::test]
    async fn test_find_everything_sorted() {
        let fs = tree().await;
        let results = find(&fs, &FindOptions::new("/proj")).await.unwrap();
        let found = paths(&results);
        assert_eq!(found.first(), Some(&"/proj"));
        assert!(found.contains(&"/proj/.git/HEAD"));
        assert!(found.contains(&"/proj/src/util/mod.rs"));
        let mut sorted = found.clone();
        sorted.sort();
        assert_eq!(found, sorted);
    }

    #[tokio::test]
    async fn test_find_missing_start_is_empty() {
        let fs = tree().await;
        assert!(find(&fs, &FindOptions::new("/nope")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_name_and_kind() {
        let fs = tree().await;
        let opts = FindOptions::new("/proj").name("*.rs").unwrap();
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj/src/main.rs", "/proj/src/util/mod.rs"]);

        let opts = FindOptions::new("/proj").kind(FileType::Directory).maxdepth(1);
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(
            paths(&results),
            vec!["/proj", "/proj/.git", "/proj/empty", "/proj/src", "/proj/target"]
        );
    }

    #[tokio::test]
    async fn test_find_name_regex() {
        let fs = tree().await;
        let opts = FindOptions::new("/proj").name_regex(r"^[A-Z]+(\.md)?$").unwrap();
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj/.git/HEAD", "/proj/README.md"]);
    }

    #[tokio::test]
    async fn test_find_depth_bounds() {
        let fs = tree().await;
        let results = find(&fs, &FindOptions::new("/proj").maxdepth(0)).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj"]);

        let results = find(&fs, &FindOptions::new("/proj/README.md").maxdepth(0))
            .await
            .unwrap();
        assert_eq!(paths(&results), vec!["/proj/README.md"]);

        let opts = FindOptions::new("/proj").mindepth(3).maxdepth(1);
        assert!(find(&fs, &opts).await.unwrap().is_empty());

        let opts = FindOptions::new("/proj").mindepth(3);
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj/src/util/mod.rs", "/proj/target/debug/app"]);
    }

    #[tokio::test]
    async fn test_find_size_filter() {
        let fs = tree().await;
        let opts = FindOptions::new("/proj").size("+1K").unwrap();
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj/target/debug/app"]);
        assert_eq!(results[0].size, 2048);
    }

    #[tokio::test]
    async fn test_find_empty() {
        let fs = tree().await;
        let opts = FindOptions::new("/proj").empty(true);
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj/empty", "/proj/src/util/mod.rs"]);

        // Emptiness is checked even at the depth limit.
        let opts = FindOptions::new("/proj").empty(true).maxdepth(1);
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj/empty"]);
    }

    #[tokio::test]
    async fn test_find_prune() {
        let fs = tree().await;
        let opts = FindOptions::new("/proj")
            .prune("target")
            .unwrap()
            .prune(".git")
            .unwrap();
        let results = find(&fs, &opts).await.unwrap();
        let found = paths(&results);
        assert!(!found.iter().any(|p| p.contains("target")));
        assert!(!found.iter().any(|p| p.contains(".git")));
        assert!(found.contains(&"/proj/src/main.rs"));

        // The start path is never pruned.
        let opts = FindOptions::new("/proj/target").prune("target").unwrap();
        assert!(!find(&fs, &opts).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_prune_glob_and_path() {
        let fs = tree().await;
        let opts = FindOptions::new("/proj").prune("src/util").unwrap().name("*.rs").unwrap();
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj/src/main.rs"]);

        assert!(FindOptions::new("/").prune("").is_err());
    }

    #[tokio::test]
    async fn test_find_mtime() {
        let fs = tree().await;
        let old = SystemTime::now() - Duration::from_secs(60 * 24 * 3600);
        fs.utimes("/proj/README.md", old, old).await.unwrap();

        let opts = FindOptions::new("/proj").mtime("+30d").unwrap();
        let results = find(&fs, &opts).await.unwrap();
        assert_eq!(paths(&results), vec!["/proj/README.md"]);

        let opts = FindOptions::new("/proj").mtime("-1d").unwrap().kind(FileType::File);
        let results = find(&fs, &opts).await.unwrap();
        assert!(!paths(&results).contains(&"/proj/README.md"));
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_find_follow_symlinks_without_looping() {
        let fs = tree().await;
        fs.symlink("/proj/src", "/proj/link").await.unwrap();
        fs.symlink("..", "/proj/src/up").await.unwrap();

        let plain = find(&fs, &FindOptions::new("/proj").name("*.rs").unwrap())
            .await
            .unwrap();
        assert_eq!(plain.len(), 2);

        let opts = FindOptions::new("/proj").follow_symlinks(true).kind(FileType::Directory);
        let results = find(&fs, &opts).await.unwrap();
        // /proj/src is reached once, either directly or through the link.
        let src_like = paths(&results)
            .into_iter()
            .filter(|p| *p == "/proj/src" || *p == "/proj/link")
            .count();
        assert_eq!(src_like, 1);

        let link = find(&fs, &FindOptions::new("/proj/link").maxdepth(0)).await.unwrap();
        assert_eq!(link[0].kind, FileType::Symlink);
    }
}
