//! Multi-pattern glob discovery over a store.

use std::collections::BTreeSet;

use sekisou_glob::{GlobError, MatchOptions, Pattern, targets_dotfiles};

use crate::vfs::{FileType, ReadDirOptions, VfsError, VfsOps, VfsResult, path};

/// Walk options.
#[derive(Debug, Clone)]
pub struct GlobOptions {
    /// Base directory; results are relative to it unless `absolute`.
    pub cwd: String,
    /// Let wildcards match dotfiles.
    pub dot: bool,
    pub nocase: bool,
    /// Maximum entry depth below `cwd` (`a` is 1, `a/b` is 2).
    pub deep: Option<usize>,
    /// Files and non-directory symlinks only. Ignored when
    /// `only_directories` is set.
    pub only_files: bool,
    pub only_directories: bool,
    pub absolute: bool,
    /// Exclusion patterns, always compiled with `dot`. A directory that
    /// matches is not descended.
    pub ignore: Vec<String>,
    /// Append `/` to directory results.
    pub mark_directories: bool,
}

impl Default for GlobOptions {
    fn default() -> Self {
        Self {
            cwd: "/".to_string(),
            dot: false,
            nocase: false,
            deep: None,
            only_files: true,
            only_directories: false,
            absolute: false,
            ignore: Vec::new(),
            mark_directories: false,
        }
    }
}

impl GlobOptions {
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn dot(mut self, dot: bool) -> Self {
        self.dot = dot;
        self
    }

    pub fn nocase(mut self, nocase: bool) -> Self {
        self.nocase = nocase;
        self
    }

    pub fn deep(mut self, deep: usize) -> Self {
        self.deep = Some(deep);
        self
    }

    pub fn only_files(mut self, only: bool) -> Self {
        self.only_files = only;
        self
    }

    pub fn only_directories(mut self, only: bool) -> Self {
        self.only_directories = only;
        self
    }

    pub fn absolute(mut self, absolute: bool) -> Self {
        self.absolute = absolute;
        self
    }

    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    pub fn mark_directories(mut self, mark: bool) -> Self {
        self.mark_directories = mark;
        self
    }
}

/// Compiled include/exclude sets.
struct Matchers {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    /// Some include pattern names dotfiles, so dot entries are walked.
    wants_dotfiles: bool,
}

impl Matchers {
    /// A pattern with an odd number of leading `!` becomes an exclusion.
    /// With only exclusions, `**` is implied.
    fn compile<S: AsRef<str>>(patterns: &[S], options: &GlobOptions) -> VfsResult<Self> {
        let ignore_opts = MatchOptions::default().dot(true).nocase(options.nocase);
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut wants_dotfiles = false;
        let mut any_negated = false;

        for raw in patterns {
            let raw = raw.as_ref();
            let body = raw.trim_start_matches('!');
            if body.is_empty() {
                return Err(GlobError::EmptyPattern.into());
            }
            if (raw.len() - body.len()) % 2 == 1 {
                any_negated = true;
                exclude.push(Pattern::with_options(body, ignore_opts)?);
                continue;
            }
            let targets_dot = targets_dotfiles(body);
            wants_dotfiles |= targets_dot;
            let opts = MatchOptions::default()
                .dot(options.dot || targets_dot)
                .nocase(options.nocase);
            include.push(Pattern::with_options(body, opts)?);
        }

        if include.is_empty() && any_negated {
            include.push(Pattern::with_options(
                "**",
                MatchOptions::default().dot(options.dot).nocase(options.nocase),
            )?);
        }
        for raw in &options.ignore {
            exclude.push(Pattern::with_options(raw, ignore_opts)?);
        }

        Ok(Self {
            include,
            exclude,
            wants_dotfiles,
        })
    }

    fn excluded(&self, rel: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(rel))
    }

    fn included(&self, rel: &str) -> bool {
        self.include.iter().any(|p| p.matches(rel)) && !self.excluded(rel)
    }
}

/// Find every entry under `options.cwd` matched by any of `patterns`.
///
/// Results are sorted and deduplicated. Fails with ENOENT if `cwd` is
/// missing and with an empty-pattern error if any pattern is empty.
#[tracing::instrument(level = "debug", skip(fs, patterns, options), fields(cwd = %options.cwd))]
pub async fn glob<F, S>(fs: &F, patterns: &[S], options: &GlobOptions) -> VfsResult<Vec<String>>
where
    F: VfsOps + ?Sized,
    S: AsRef<str>,
{
    let matchers = Matchers::compile(patterns, options)?;
    let cwd = path::normalize(&options.cwd);
    let root = fs.stat(&cwd).await?;
    if !root.is_dir() {
        return Err(VfsError::not_a_directory(cwd));
    }
    if matchers.include.is_empty() {
        return Ok(Vec::new());
    }

    let walk_dots = options.dot || matchers.wants_dotfiles;
    let max_depth = options.deep.unwrap_or(usize::MAX);
    let mut found = BTreeSet::new();
    // (directory path, its path relative to cwd, its depth)
    let mut stack = vec![(cwd.clone(), String::new(), 0usize)];

    while let Some((dir, rel_dir, depth)) = stack.pop() {
        let entries = match fs.readdir(&dir, ReadDirOptions::default()).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };

        for entry in entries {
            if entry.name.starts_with('.') && !walk_dots {
                continue;
            }
            let entry_path = path::join(&dir, &entry.name);
            let rel = if rel_dir.is_empty() {
                entry.name.clone()
            } else {
                format!("{rel_dir}/{}", entry.name)
            };
            let entry_depth = depth + 1;

            let is_dir = match entry.kind {
                FileType::Directory => true,
                FileType::Symlink => fs
                    .stat(&entry_path)
                    .await
                    .map(|st| st.is_dir())
                    .unwrap_or(false),
                FileType::File => false,
            };

            let wanted_kind = if options.only_directories {
                is_dir
            } else if options.only_files {
                !is_dir
            } else {
                true
            };

            if wanted_kind && matchers.included(&rel) {
                let mut out = if options.absolute {
                    entry_path.clone()
                } else {
                    rel.clone()
                };
                if options.mark_directories && is_dir {
                    out.push('/');
                }
                found.insert(out);
            }

            // Symlinked directories are reported but not walked.
            if entry.kind.is_dir() && entry_depth < max_depth && !matchers.excluded(&rel) {
                stack.push((entry_path, rel, entry_depth));
            }
        }
    }

    tracing::debug!(count = found.len(), "glob complete");
    Ok(found.into_iter().collect())
}
