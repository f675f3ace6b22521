//! # sekisou-glob
//!
//! Shell-style glob patterns compiled into matchers.
//!
//! Supported syntax:
//!
//! - `*` and `?` within a path segment
//! - `[abc]`, `[a-z]`, `[!abc]` / `[^abc]` character classes
//! - `{a,b,...}` alternation (an empty branch is allowed)
//! - `**` as a whole segment: zero or more path segments
//! - leading `!` to negate (repeat to cancel)
//! - `\` to escape the next character
//!
//! Wildcards do not match a leading `.` unless [`MatchOptions::dot`] is set
//! or the segment spells the dot out.
//!
//! Patterns without `**` compile to one anchored regex. Patterns with `**`
//! keep their segments and match with a memoized backtracking search.
//!
//! ```
//! use sekisou_glob::{MatchOptions, Pattern};
//!
//! let p = Pattern::with_options("src/**/*.{ts,tsx}", MatchOptions::default()).unwrap();
//! assert!(p.matches("src/components/Button.tsx"));
//! assert!(!p.matches("src/index.js"));
//! ```

mod error;
mod pattern;
mod translate;

pub use error::{GlobError, GlobResult};
pub use pattern::{MatchOptions, Pattern, compile, escape, is_match, matcher, targets_dotfiles};
