//! Truthy coercion for checkbox values.

const TRUTHY: [&str; 6] = ["1", "true", "yes", "y", "on", "t"];

/// Map a raw value to a checkbox state.
///
/// Total: anything outside the truthy set (after trimming, case-insensitive)
/// is `false`, including the empty string.
pub fn coerce_truthy(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    TRUTHY.contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_set_is_case_insensitive() {
        for value in ["1", "true", "TRUE", "Yes", "YES", "y", "On", "t", " yes "] {
            assert!(coerce_truthy(value), "{value:?} should be truthy");
        }
    }

    #[test]
    fn everything_else_is_false() {
        for value in ["0", "", "no", "false", "off", "n", "2", "checked", "yess"] {
            assert!(!coerce_truthy(value), "{value:?} should be falsy");
        }
    }

    #[test]
    fn coercion_agrees_across_spellings() {
        assert_eq!(coerce_truthy("YES"), coerce_truthy("yes"));
        assert_eq!(coerce_truthy("yes"), coerce_truthy("1"));
        assert_eq!(coerce_truthy("0"), coerce_truthy(""));
        assert_eq!(coerce_truthy(""), coerce_truthy("no"));
    }
}
