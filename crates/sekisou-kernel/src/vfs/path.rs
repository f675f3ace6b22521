//! Virtual path helpers.
//!
//! Store paths are POSIX strings, always absolute and normalized: a leading
//! `/`, no `.`/`..`/empty components, no trailing slash (except `/` itself).

/// Normalize a path. Relative paths are taken relative to `/`; `..` never
/// climbs above the root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Parent of a normalized path; `None` for `/`.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => Some("/"),
    }
}

/// Final component of a normalized path; empty for `/`.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join `rel` onto `dir`. An absolute `rel` replaces `dir`.
pub fn join(dir: &str, rel: &str) -> String {
    if rel.starts_with('/') {
        normalize(rel)
    } else {
        normalize(&format!("{dir}/{rel}"))
    }
}

/// `path` relative to `base`, or `None` when it is not underneath it.
/// Both must be normalized. `base` itself yields `Some("")`.
pub fn strip_base<'a>(base: &str, path: &'a str) -> Option<&'a str> {
    if base == "/" {
        return path.strip_prefix('/');
    }
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

/// True if `path` lies strictly below `ancestor`.
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    matches!(strip_base(ancestor, path), Some(rest) if !rest.is_empty())
}

/// Prefix shared by all strict descendants of `dir` (`/a` → `/a/`).
pub fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{dir}/")
    }
}

/// Number of components (`/` → 0, `/a/b` → 2).
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|c| !c.is_empty()).count()
}

/// `/`, then each ancestor down to `path` itself.
pub fn ancestors_inclusive(path: &str) -> Vec<String> {
    let mut out = vec!["/".to_string()];
    let mut current = String::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        current.push('/');
        current.push_str(component);
        out.push(current.clone());
    }
    out
}
