//! Compiled glob patterns.

use regex::{Regex, RegexBuilder};

use crate::error::{GlobError, GlobResult};
use crate::translate::{Fragment, translate_segment};

/// Matching options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Let wildcards match segments that start with `.`.
    pub dot: bool,
    /// Case-insensitive matching.
    pub nocase: bool,
}

impl MatchOptions {
    pub fn dot(mut self, dot: bool) -> Self {
        self.dot = dot;
        self
    }

    pub fn nocase(mut self, nocase: bool) -> Self {
        self.nocase = nocase;
        self
    }
}

/// A compiled glob pattern. Immutable; cheap to clone.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    negated: bool,
    options: MatchOptions,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// No globstar: one anchored regex over the whole path.
    Whole { regex: Regex, dot_guards: Vec<bool> },
    /// Globstar present: per-segment matching with backtracking.
    Segments(Vec<Segment>),
}

#[derive(Debug, Clone)]
enum Segment {
    Globstar,
    Part { regex: Regex, dot_guard: bool },
}

impl Pattern {
    /// Compile with default options.
    pub fn new(pattern: &str) -> GlobResult<Self> {
        Self::with_options(pattern, MatchOptions::default())
    }

    /// Compile with explicit options.
    pub fn with_options(pattern: &str, options: MatchOptions) -> GlobResult<Self> {
        if pattern.is_empty() {
            return Err(GlobError::EmptyPattern);
        }

        let mut negated = false;
        let mut body = pattern;
        while let Some(rest) = body.strip_prefix('!') {
            negated = !negated;
            body = rest;
        }

        // `split` keeps the trailing empty segment of `src/`.
        let segments: Vec<&str> = body.split('/').collect();
        let fragments: Vec<Fragment> = segments
            .iter()
            .map(|s| translate_segment(s, options.dot))
            .collect();

        let matcher = if segments.contains(&"**") {
            let parts = segments
                .iter()
                .zip(fragments)
                .map(|(seg, frag)| {
                    if *seg == "**" {
                        Ok(Segment::Globstar)
                    } else {
                        Ok(Segment::Part {
                            regex: build_regex(pattern, &frag.source, options.nocase)?,
                            dot_guard: frag.dot_guard,
                        })
                    }
                })
                .collect::<GlobResult<Vec<_>>>()?;
            Matcher::Segments(parts)
        } else {
            let source = fragments
                .iter()
                .map(|f| f.source.as_str())
                .collect::<Vec<_>>()
                .join("/");
            Matcher::Whole {
                regex: build_regex(pattern, &source, options.nocase)?,
                dot_guards: fragments.iter().map(|f| f.dot_guard).collect(),
            }
        };

        Ok(Self {
            source: pattern.to_string(),
            negated,
            options,
            matcher,
        })
    }

    /// The pattern text as given, including any leading `!`.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn has_globstar(&self) -> bool {
        matches!(self.matcher, Matcher::Segments(_))
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// Test a path. The empty path never matches, negated or not.
    pub fn matches(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        self.matches_positive(path) != self.negated
    }

    fn matches_positive(&self, path: &str) -> bool {
        match &self.matcher {
            Matcher::Whole { regex, dot_guards } => {
                regex.is_match(path)
                    && path
                        .split('/')
                        .zip(dot_guards)
                        .all(|(part, guarded)| !guarded || !part.starts_with('.'))
            }
            Matcher::Segments(segments) => {
                let parts: Vec<&str> = path.split('/').collect();
                let mut memo = vec![None; (segments.len() + 1) * (parts.len() + 1)];
                self.match_from(segments, &parts, 0, 0, &mut memo)
            }
        }
    }

    /// Backtracking search over `(segment index, path index)`, memoized so
    /// that stacked globstars stay polynomial.
    fn match_from(
        &self,
        segments: &[Segment],
        parts: &[&str],
        pi: usize,
        si: usize,
        memo: &mut [Option<bool>],
    ) -> bool {
        let key = pi * (parts.len() + 1) + si;
        if let Some(hit) = memo[key] {
            return hit;
        }

        let result = match segments.get(pi) {
            None => si == parts.len(),
            Some(Segment::Globstar) => {
                self.match_from(segments, parts, pi + 1, si, memo)
                    || (si < parts.len()
                        && self.globstar_accepts(parts[si])
                        && self.match_from(segments, parts, pi, si + 1, memo))
            }
            Some(Segment::Part { regex, dot_guard }) => {
                si < parts.len()
                    && !(*dot_guard && parts[si].starts_with('.'))
                    && regex.is_match(parts[si])
                    && self.match_from(segments, parts, pi + 1, si + 1, memo)
            }
        };

        memo[key] = Some(result);
        result
    }

    fn globstar_accepts(&self, part: &str) -> bool {
        if part == "." || part == ".." {
            return false;
        }
        self.options.dot || !part.starts_with('.')
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn build_regex(pattern: &str, source: &str, nocase: bool) -> GlobResult<Regex> {
    RegexBuilder::new(&format!("^(?:{source})$"))
        .case_insensitive(nocase)
        .build()
        .map_err(|e| GlobError::invalid(pattern, e))
}

/// Compile a pattern.
pub fn compile(pattern: &str, options: MatchOptions) -> GlobResult<Pattern> {
    Pattern::with_options(pattern, options)
}

/// One-shot match. Prefer [`matcher`] when testing many paths.
pub fn is_match(pattern: &str, path: &str, options: MatchOptions) -> GlobResult<bool> {
    Ok(compile(pattern, options)?.matches(path))
}

/// Compile once, return a reusable predicate.
pub fn matcher(
    pattern: &str,
    options: MatchOptions,
) -> GlobResult<impl Fn(&str) -> bool + Clone + Send + Sync + use<>> {
    let compiled = compile(pattern, options)?;
    Ok(move |path: &str| compiled.matches(path))
}

/// True if the pattern names dotfiles explicitly: it starts with `.` or has
/// a segment starting with `.`. Leading negation is ignored.
pub fn targets_dotfiles(pattern: &str) -> bool {
    let body = pattern.trim_start_matches('!');
    body.starts_with('.') || body.contains("/.")
}

/// Escape glob metacharacters so `text` matches only itself.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        let special = matches!(c, '*' | '?' | '[' | ']' | '{' | '}' | '\\') || (c == '!' && i == 0);
        if special {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, path: &str) -> bool {
        is_match(pattern, path, MatchOptions::default()).unwrap()
    }

    fn m_dot(pattern: &str, path: &str) -> bool {
        is_match(pattern, path, MatchOptions::default().dot(true)).unwrap()
    }

    #[test]
    fn test_empty_pattern_fails() {
        assert_eq!(Pattern::new("").unwrap_err(), GlobError::EmptyPattern);
        assert!(is_match("", "a", MatchOptions::default()).is_err());
        assert!(matcher("", MatchOptions::default()).is_err());
    }

    #[test]
    fn test_empty_path_never_matches() {
        for pattern in ["*", "**", "!a", "**/x", "a/b", "/"] {
            assert!(!m(pattern, ""), "{pattern} matched empty path");
        }
    }

    #[test]
    fn test_root_pattern() {
        assert!(m("/", "/"));
        assert!(!m("/", "/a"));
        assert!(!m("/", "a"));
    }

    #[test]
    fn test_literal_and_wildcards() {
        assert!(m("src/main.rs", "src/main.rs"));
        assert!(!m("src/main.rs", "src/main.rsx"));
        assert!(m("*.rs", "lib.rs"));
        assert!(!m("*.rs", "src/lib.rs"));
        assert!(m("src/*.rs", "src/lib.rs"));
        assert!(m("file?.txt", "file1.txt"));
        assert!(!m("file?.txt", "file10.txt"));
        assert!(!m("a?b", "a/b"));
    }

    #[test]
    fn test_dot_guard() {
        assert!(!m("*", ".hidden"));
        assert!(!m("*.ts", ".ts"));
        assert!(m(".*", ".hidden"));
        assert!(m_dot("*", ".hidden"));
        assert!(!m("?bashrc", ".bashrc"));
        assert!(!m("src/*", "src/.env"));
        assert!(m("src/.*", "src/.env"));
    }

    #[test]
    fn test_character_classes() {
        assert!(m("[abc].txt", "a.txt"));
        assert!(!m("[abc].txt", "d.txt"));
        assert!(m("[!abc].txt", "d.txt"));
        assert!(!m("[!abc].txt", "a.txt"));
        assert!(m("[^abc].txt", "z.txt"));
        assert!(m("file[0-9]", "file7"));
        assert!(!m("file[0-9]", "filex"));
        assert!(m("x[-a]", "x-"));
        assert!(m("x[a-]", "x-"));
        assert!(m("x[.]y", "x.y"));
        assert!(!m("x[.]y", "xay"));
        assert!(!m("a[!b]c", "a/c"));
    }

    #[test]
    fn test_braces() {
        assert!(m("*.{ts,tsx}", "index.ts"));
        assert!(m("*.{ts,tsx}", "App.tsx"));
        assert!(!m("*.{ts,tsx}", "index.js"));
        assert!(m("file{,.bak}", "file"));
        assert!(m("file{,.bak}", "file.bak"));
        assert!(m("{a,{b,c}}x", "cx"));
        // Branches that spell out a dot match dotfiles.
        assert!(m("{.env,config}", ".env"));
    }

    #[test]
    fn test_escapes() {
        assert!(m("\\*.txt", "*.txt"));
        assert!(!m("\\*.txt", "a.txt"));
        assert!(m(&escape("out[v1]"), "out[v1]"));
        assert!(!m(&escape("out[v1]"), "outv"));
    }

    #[test]
    fn test_negation() {
        assert!(m("!*.js", "main.rs"));
        assert!(!m("!*.js", "main.js"));
        assert!(m("!!*.js", "main.js"));
        assert!(Pattern::new("!x").unwrap().is_negated());
        assert!(!Pattern::new("!!x").unwrap().is_negated());
        // `!` in the middle is literal.
        assert!(m("a!b", "a!b"));
        assert!(!m("a!b", "ab"));
    }

    #[test]
    fn test_globstar() {
        assert!(m("**/x", "x"));
        assert!(m("**/x", "a/x"));
        assert!(m("**/x", "a/b/c/x"));
        assert!(!m("**/x", "a/b/xy"));
        assert!(m("a/**/b", "a/b"));
        assert!(m("a/**/b", "a/x/y/b"));
        assert!(!m("a/**/b", "a/x/y/c"));
        assert!(m("src/**", "src/a/b.rs"));
        assert!(Pattern::new("a/**/b").unwrap().has_globstar());
        assert!(!Pattern::new("a/*/b").unwrap().has_globstar());
    }

    #[test]
    fn test_globstar_skips_dot_segments() {
        assert!(!m("**/x", ".git/x"));
        assert!(!m("**/x", "a/.cache/x"));
        assert!(m_dot("**/x", ".git/x"));
        assert!(m("**/.cache/x", "a/.cache/x"));
    }

    #[test]
    fn test_typescript_scenario() {
        let p = "src/**/*.{ts,tsx}";
        assert!(m(p, "src/components/Button.tsx"));
        assert!(m(p, "src/index.ts"));
        assert!(!m(p, "test/foo.ts"));
        assert!(!m(p, "src/index.js"));
    }

    #[test]
    fn test_trailing_slash_segment() {
        assert!(m("src/", "src/"));
        assert!(!m("src/", "src"));
    }

    #[test]
    fn test_nocase() {
        let opts = MatchOptions::default().nocase(true);
        assert!(is_match("*.RS", "main.rs", opts).unwrap());
        assert!(is_match("**/README.md", "docs/readme.MD", opts).unwrap());
        assert!(!m("*.RS", "main.rs"));
    }

    #[test]
    fn test_adversarial_globstars_terminate() {
        let pattern = "**/**/**/**/**/**/**/**/**/**/z";
        let path = vec!["a"; 64].join("/");
        assert!(!m(pattern, &path));
        assert!(m(pattern, &format!("{path}/z")));
    }

    #[test]
    fn test_matcher_reuse() {
        let is_rust = matcher("**/*.rs", MatchOptions::default()).unwrap();
        assert!(is_rust("src/lib.rs"));
        assert!(is_rust("main.rs"));
        assert!(!is_rust("Cargo.toml"));
    }

    #[test]
    fn test_targets_dotfiles() {
        assert!(targets_dotfiles(".github/**"));
        assert!(targets_dotfiles("src/.env"));
        assert!(targets_dotfiles("!.git"));
        assert!(!targets_dotfiles("**/*.rs"));
    }
}
