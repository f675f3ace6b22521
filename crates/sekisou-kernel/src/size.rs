//! Byte sizes with a unit suffix, as written in config files and find
//! filters.

const KIB: u64 = 1024;

/// Parse `1024`, `512K`, `1.5M`, `2GB`, `4KiB`, `7B`. Units are powers of
/// 1024 and case-insensitive. Fractions round to the nearest byte.
///
/// The error is a reason, without the input echoed back.
pub fn parse_size(text: &str) -> Result<u64, String> {
    let upper = text.trim().to_ascii_uppercase();
    let body = upper
        .strip_suffix("IB")
        .or_else(|| upper.strip_suffix('B'))
        .unwrap_or(&upper);
    let (digits, multiplier) = match body.chars().last() {
        Some('K') => (&body[..body.len() - 1], KIB),
        Some('M') => (&body[..body.len() - 1], KIB * KIB),
        Some('G') => (&body[..body.len() - 1], KIB * KIB * KIB),
        // `IB` is only a suffix of a unit.
        _ if upper.ends_with("IB") => return Err("unknown size unit".to_string()),
        Some(c) if c.is_ascii_alphabetic() => return Err("unknown size unit".to_string()),
        _ => (body, 1),
    };

    if digits.is_empty() {
        return Err("missing size".to_string());
    }
    if !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err("expected a non-negative number".to_string());
    }

    if let Ok(whole) = digits.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| "size out of range".to_string());
    }
    let value = digits
        .parse::<f64>()
        .map_err(|_| "expected a non-negative number".to_string())?;
    let bytes = (value * multiplier as f64).round();
    if bytes.is_finite() && bytes < u64::MAX as f64 {
        Ok(bytes as u64)
    } else {
        Err("size out of range".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("512K").unwrap(), 512 * 1024);
        assert_eq!(parse_size("1k").unwrap(), 1024);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("100mb").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_size("4KiB").unwrap(), 4096);
        assert_eq!(parse_size("2GiB").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("7B").unwrap(), 7);
        assert_eq!(parse_size(" 12 ").unwrap(), 12);
    }

    #[test]
    fn test_parse_size_fractions() {
        assert_eq!(parse_size("1.5K").unwrap(), 1536);
        assert_eq!(parse_size("0.5M").unwrap(), 512 * 1024);
        assert_eq!(parse_size(".25k").unwrap(), 256);
        assert_eq!(parse_size("2.6").unwrap(), 3);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        let bad_sizes = [
            "", "B", "M", "KiB", "iB", "1X", "1XiB", "abc", "-1K", "+1K", "1e3", "inf", "1..2",
        ];
        for bad in bad_sizes {
            assert!(parse_size(bad).is_err(), "{bad:?}");
        }
        assert_eq!(parse_size("99999999999G").unwrap_err(), "size out of range");
        assert_eq!(parse_size("99999999999.5G").unwrap_err(), "size out of range");
    }
}
