//! Version reference normalization and cache key encoding.

use std::fmt::Write as _;

/// Reference used when a download request names no version.
pub const MAINLINE_REF: &str = "main";

/// Marker every published version tag starts with.
pub const VERSION_PREFIX: char = 'v';

/// Normalizes the `ref` a client asked for into a tag name.
///
/// A missing or empty reference means [`MAINLINE_REF`]. Any other reference
/// gets a leading `v` unless it already starts with one; a `v` appearing
/// later in the string does not count.
///
/// # Examples
///
/// ```
/// use monoreg_core::normalize_ref;
///
/// assert_eq!(normalize_ref(None), "main");
/// assert_eq!(normalize_ref(Some("")), "main");
/// assert_eq!(normalize_ref(Some("1.0.0")), "v1.0.0");
/// assert_eq!(normalize_ref(Some("v1.0.0")), "v1.0.0");
/// ```
#[must_use]
pub fn normalize_ref(reference: Option<&str>) -> String {
    match reference {
        None | Some("") => MAINLINE_REF.to_string(),
        Some(r) if r.starts_with(VERSION_PREFIX) => r.to_string(),
        Some(r) => format!("{VERSION_PREFIX}{r}"),
    }
}

/// Encodes a tag or module name as a single, safe path component.
///
/// ASCII alphanumerics, `-`, `_` and any `.` that is not the first byte are
/// kept; every other byte becomes `%XX` (upper-case hex). The encoding is
/// injective, so distinct names never share a cache file, and the result can
/// never be `.`, `..` or contain a separator.
///
/// # Examples
///
/// ```
/// use monoreg_core::sanitize_key;
///
/// assert_eq!(sanitize_key("v1.0.0"), "v1.0.0");
/// assert_eq!(sanitize_key("release/1.0"), "release%2F1.0");
/// assert_eq!(sanitize_key(".."), "%2E.");
/// ```
#[must_use]
pub fn sanitize_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, byte) in name.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || (byte == b'.' && i > 0);
        if keep {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_keeps_embedded_marker_literal() {
        assert_eq!(normalize_ref(Some("1.0.0-rev")), "v1.0.0-rev");
        assert_eq!(normalize_ref(Some("release-v2")), "vrelease-v2");
        assert_eq!(normalize_ref(Some("main")), "vmain");
    }

    #[test]
    fn test_sanitize_distinguishes_dot_and_dash() {
        assert_ne!(sanitize_key("v1.0"), sanitize_key("v1-0"));
        assert_eq!(sanitize_key("v1-0"), "v1-0");
    }

    #[test]
    fn test_sanitize_escapes_percent_and_empty() {
        assert_eq!(sanitize_key("50%"), "50%25");
        assert_eq!(sanitize_key(""), "");
        assert_eq!(sanitize_key(".github"), "%2Egithub");
    }

    #[test]
    fn test_sanitize_non_ascii() {
        assert_eq!(sanitize_key("ü"), "%C3%BC");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_injective(a in ".{0,12}", b in ".{0,12}") {
            if a != b {
                prop_assert_ne!(sanitize_key(&a), sanitize_key(&b));
            }
        }

        #[test]
        fn prop_sanitize_is_one_component(name in ".{1,16}") {
            let key = sanitize_key(&name);
            prop_assert!(!key.contains('/'));
            prop_assert!(!key.contains('\\'));
            prop_assert!(!key.starts_with('.'));
        }
    }
}
