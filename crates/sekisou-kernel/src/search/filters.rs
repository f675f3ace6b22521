//! Typed find filters.
//!
//! Filter strings are parsed once, when options are built. A malformed
//! filter is an `EINVAL` error, never a filter that silently matches
//! nothing.

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use regex::{Regex, RegexBuilder};
use sekisou_glob::{MatchOptions, Pattern};

use crate::size::parse_size;
use crate::vfs::{VfsError, VfsResult};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// How a numeric filter compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Leading `+`.
    Greater,
    /// Leading `-`.
    Less,
    /// No prefix.
    Exact,
}

impl Comparison {
    fn split(spec: &str) -> (Self, &str) {
        if let Some(rest) = spec.strip_prefix('+') {
            (Comparison::Greater, rest)
        } else if let Some(rest) = spec.strip_prefix('-') {
            (Comparison::Less, rest)
        } else {
            (Comparison::Exact, spec)
        }
    }
}

fn parse_number(spec: &str, digits: &str) -> VfsResult<f64> {
    match digits.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(VfsError::invalid(spec, "expected a non-negative number")),
    }
}

/// `+1M`, `-100K`, `500B`, `1.5KiB`, `42`. Units are powers of 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFilter {
    pub cmp: Comparison,
    pub bytes: u64,
}

impl SizeFilter {
    pub fn parse(spec: &str) -> VfsResult<Self> {
        let (cmp, rest) = Comparison::split(spec.trim());
        let bytes = parse_size(rest).map_err(|reason| VfsError::invalid(spec, reason))?;
        Ok(Self { cmp, bytes })
    }

    pub fn matches(&self, size: u64) -> bool {
        match self.cmp {
            Comparison::Greater => size > self.bytes,
            Comparison::Less => size < self.bytes,
            Comparison::Exact => size == self.bytes,
        }
    }
}

impl FromStr for SizeFilter {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `-7d`, `+30d`, `2h`. Units: `m` minutes, `h` hours, `d` days (default),
/// `w` weeks, `M` 30-day months.
///
/// `+` matches times older than now minus the age, `-` newer ones; a bare
/// age matches within one day of that threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFilter {
    pub cmp: Comparison,
    pub age: Duration,
}

impl TimeFilter {
    pub fn parse(spec: &str) -> VfsResult<Self> {
        let trimmed = spec.trim();
        let (cmp, rest) = Comparison::split(trimmed);
        let (digits, unit) = match rest.char_indices().last() {
            Some((idx, c)) if c.is_ascii_alphabetic() => {
                let unit = match c {
                    'm' => MINUTE,
                    'h' => HOUR,
                    'd' => DAY,
                    'w' => 7 * DAY,
                    'M' => 30 * DAY,
                    _ => return Err(VfsError::invalid(spec, "unknown time unit")),
                };
                (&rest[..idx], unit)
            }
            _ => (rest, DAY),
        };
        if digits.is_empty() {
            return Err(VfsError::invalid(spec, "missing age"));
        }
        let secs = parse_number(spec, digits)? * unit as f64;
        let age = Duration::try_from_secs_f64(secs)
            .map_err(|_| VfsError::invalid(spec, "age out of range"))?;
        Ok(Self { cmp, age })
    }

    /// Test `time` against the threshold `now - age`.
    pub fn matches(&self, time: SystemTime, now: SystemTime) -> bool {
        let threshold = now.checked_sub(self.age).unwrap_or(SystemTime::UNIX_EPOCH);
        match self.cmp {
            Comparison::Greater => time < threshold,
            Comparison::Less => time > threshold,
            Comparison::Exact => {
                let distance = time
                    .duration_since(threshold)
                    .or_else(|_| threshold.duration_since(time))
                    .unwrap_or_default();
                distance < Duration::from_secs(DAY)
            }
        }
    }
}

impl FromStr for TimeFilter {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Basename test: a glob or a regex.
#[derive(Debug, Clone)]
pub enum NameFilter {
    Glob(Pattern),
    Regex(Regex),
}

impl NameFilter {
    /// Glob over the basename. Wildcards match dotfiles, as in find(1).
    pub fn glob(pattern: &str, nocase: bool) -> VfsResult<Self> {
        let options = MatchOptions::default().dot(true).nocase(nocase);
        Ok(NameFilter::Glob(Pattern::with_options(pattern, options)?))
    }

    /// Unanchored regex over the basename.
    pub fn regex(pattern: &str, nocase: bool) -> VfsResult<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(nocase)
            .build()
            .map(NameFilter::Regex)
            .map_err(|e| VfsError::invalid(pattern, e.to_string()))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::Glob(p) => p.matches(name),
            NameFilter::Regex(re) => re.is_match(name),
        }
    }
}
