//! Local government code formats.
//!
//! Business records carry 6-digit codes (5 digits plus a check digit) or the
//! bare 5-digit form; boundary geometry uses the 5-digit form, sometimes
//! serialized as a number that lost its leading zero.

/// Length of the geometry-native municipality code.
pub const CANONICAL_CODE_LEN: usize = 5;

/// Drops trailing characters beyond the canonical length; shorter or
/// canonical codes pass through unchanged. Idempotent.
pub fn normalize_code(code: &str) -> String {
    let code = code.trim();
    if code.chars().count() > CANONICAL_CODE_LEN {
        code.chars().take(CANONICAL_CODE_LEN).collect()
    } else {
        code.to_string()
    }
}

/// Canonical key for a geometry-side code: digits only, left-padded with
/// zeros to the canonical length, then normalized. `None` for non-numeric
/// or empty input.
pub fn canonical_geometry_code(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(normalize_code(&format!(
        "{raw:0>width$}",
        width = CANONICAL_CODE_LEN
    )))
}

#[cfg(test)]
mod tests {
    use super::{canonical_geometry_code, normalize_code};

    #[test]
    fn normalize_drops_check_digit_only() {
        assert_eq!(normalize_code("131130"), "13113");
        assert_eq!(normalize_code("13113"), "13113");
        assert_eq!(normalize_code("1311"), "1311");
        assert_eq!(normalize_code(" 011002 "), "01100");
    }

    #[test]
    fn normalize_is_idempotent() {
        for code in ["131130", "13113", "011002", "47", "", "1234567"] {
            let once = normalize_code(code);
            assert_eq!(normalize_code(&once), once);
        }
    }

    #[test]
    fn geometry_codes_are_zero_padded() {
        assert_eq!(canonical_geometry_code("1101").as_deref(), Some("01101"));
        assert_eq!(canonical_geometry_code("13104").as_deref(), Some("13104"));
        assert_eq!(canonical_geometry_code("131130").as_deref(), Some("13113"));
        assert_eq!(canonical_geometry_code("所属未定"), None);
        assert_eq!(canonical_geometry_code(""), None);
    }
}
