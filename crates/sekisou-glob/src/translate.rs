//! Segment-level glob → regex translation.
//!
//! A pattern is split on `/` before it gets here, so every fragment produced
//! by this module matches exactly one path segment and never a separator.

/// Regex source for one pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fragment {
    /// Unanchored regex source.
    pub source: String,
    /// The matched path segment must not start with `.`.
    pub dot_guard: bool,
}

/// Translate a single `/`-free pattern segment.
///
/// With `dot == false`, a segment that opens with a wildcard (`*`, `?` or a
/// character class) refuses path segments starting with `.`. The regex crate
/// has no lookahead, so the guard is reported alongside the source and
/// checked by the caller.
pub(crate) fn translate_segment(segment: &str, dot: bool) -> Fragment {
    let dot_guard = !dot && matches!(segment.chars().next(), Some('*' | '?' | '['));
    Fragment {
        source: translate_chars(&segment.chars().collect::<Vec<_>>()),
        dot_guard,
    }
}

fn translate_chars(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                // Trailing backslash is a literal backslash.
                let c = chars.get(i + 1).copied().unwrap_or('\\');
                push_literal(&mut out, c);
                i += 2;
            }
            '*' => {
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => match parse_class(chars, i) {
                Some((class, next)) => {
                    out.push_str(&class);
                    i = next;
                }
                None => {
                    push_literal(&mut out, '[');
                    i += 1;
                }
            },
            '{' => match parse_braces(chars, i) {
                Some((branches, next)) => {
                    out.push_str("(?:");
                    for (n, branch) in branches.iter().enumerate() {
                        if n > 0 {
                            out.push('|');
                        }
                        // Branches spell out their own dots, so no guard.
                        out.push_str(&translate_chars(branch));
                    }
                    out.push(')');
                    i = next;
                }
                None => {
                    push_literal(&mut out, '{');
                    i += 1;
                }
            },
            c => {
                push_literal(&mut out, c);
                i += 1;
            }
        }
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Parse `[...]` starting at `start`. Returns the regex class and the index
/// after the closing bracket, or `None` when the class is unterminated.
fn parse_class(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!' | '^'));
    if negated {
        i += 1;
    }

    let mut body = String::new();
    // A `]` right after the opener is literal.
    if chars.get(i) == Some(&']') {
        body.push_str("\\]");
        i += 1;
    }

    loop {
        let c = *chars.get(i)?;
        match c {
            ']' => break,
            '\\' => {
                let escaped = *chars.get(i + 1)?;
                push_class_char(&mut body, escaped);
                i += 2;
            }
            '-' => {
                // Hyphens at either edge are literal, anywhere else a range.
                if body.is_empty() || chars.get(i + 1) == Some(&']') {
                    body.push_str("\\-");
                } else {
                    body.push('-');
                }
                i += 1;
            }
            c => {
                push_class_char(&mut body, c);
                i += 1;
            }
        }
    }

    // Segments never contain `/`, so only a negated class must exclude it.
    let class = if negated {
        format!("[^/{body}]")
    } else {
        format!("[{body}]")
    };
    Some((class, i + 1))
}

fn push_class_char(body: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~' | '-') {
        body.push('\\');
    }
    body.push(c);
}

/// Parse `{a,b,...}` starting at `start`. Returns the branches and the index
/// after the closing brace. A brace group without a top-level comma is not
/// an alternation and yields `None`.
fn parse_braces(chars: &[char], start: usize) -> Option<(Vec<Vec<char>>, usize)> {
    let mut depth = 0usize;
    let mut branches = Vec::new();
    let mut current = Vec::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                current.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    current.push(next);
                }
                i += 2;
                continue;
            }
            '{' => depth += 1,
            '}' if depth == 0 => {
                branches.push(current);
                if branches.len() < 2 {
                    return None;
                }
                return Some((branches, i + 1));
            }
            '}' => depth -= 1,
            ',' if depth == 0 => {
                branches.push(std::mem::take(&mut current));
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }

    None
}
