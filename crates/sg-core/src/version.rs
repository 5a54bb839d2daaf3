//! Version token extraction
//!
//! A version token is one to three dot-terminated groups of one or two digits
//! followed by a final group of one or two digits (`1.8`, `3.6.4`,
//! `1.7.1.0`). Matching is leftmost-first with greedy groups, so `jquery-1.11.3`
//! yields `1.11.3` and `123.4.5` yields `23.4.5`.

/// Placeholder substituted for the version inside molds and target paths.
pub const VERSION_PLACEHOLDER: &str = "{version}";

const MAX_GROUPS: usize = 3;

/// Find the first version token in `s`, returning its byte range.
pub fn find_version(s: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    (0..bytes.len()).find_map(|start| match_at(bytes, start, 0).map(|end| (start, end)))
}

/// Extract the first version token in `s`.
pub fn extract_version(s: &str) -> Option<&str> {
    find_version(s).map(|(start, end)| &s[start..end])
}

/// Replace the first version token in `s` with the placeholder.
///
/// Returns the normalized pattern and the version that was removed. Without a
/// version token the input is returned unchanged.
pub fn templatize(s: &str) -> (String, Option<&str>) {
    match find_version(s) {
        Some((start, end)) => {
            let mut pattern = String::with_capacity(s.len() + VERSION_PLACEHOLDER.len());
            pattern.push_str(&s[..start]);
            pattern.push_str(VERSION_PLACEHOLDER);
            pattern.push_str(&s[end..]);
            (pattern, Some(&s[start..end]))
        }
        None => (s.to_string(), None),
    }
}

/// Substitute `version` into the first placeholder of `template`.
pub fn substitute(template: &str, version: &str) -> String {
    template.replacen(VERSION_PLACEHOLDER, version, 1)
}

#[inline]
fn digits_at(bytes: &[u8], pos: usize, count: usize) -> bool {
    pos + count <= bytes.len() && bytes[pos..pos + count].iter().all(u8::is_ascii_digit)
}

/// Backtracking matcher: more groups first, then wider digit runs first.
fn match_at(bytes: &[u8], pos: usize, groups: usize) -> Option<usize> {
    if groups < MAX_GROUPS {
        for width in [2, 1] {
            if digits_at(bytes, pos, width) && bytes.get(pos + width) == Some(&b'.') {
                if let Some(end) = match_at(bytes, pos + width + 1, groups + 1) {
                    return Some(end);
                }
            }
        }
    }

    if groups > 0 {
        for width in [2, 1] {
            if digits_at(bytes, pos, width) {
                return Some(pos + width);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_versions() {
        assert_eq!(extract_version("jquery/3.6.4/jquery.min.js"), Some("3.6.4"));
        assert_eq!(extract_version("jquery/1.8/jquery.min.js"), Some("1.8"));
        assert_eq!(extract_version("prototype/1.7.1.0/prototype.js"), Some("1.7.1.0"));
        assert_eq!(extract_version("jquery-1.11.3.min.js"), Some("1.11.3"));
    }

    #[test]
    fn test_extract_requires_a_dot() {
        assert_eq!(extract_version("jquery/1/jquery.min.js"), None);
        assert_eq!(extract_version("jquery-latest.js"), None);
    }

    #[test]
    fn test_extract_is_leftmost_and_bounded() {
        assert_eq!(extract_version("123.4.5"), Some("23.4.5"));
        assert_eq!(extract_version("1.2.3.4.5"), Some("1.2.3.4"));
        assert_eq!(extract_version("v2.1.4/x/3.0.0"), Some("2.1.4"));
    }

    #[test]
    fn test_extract_backtracks_into_shorter_groups() {
        // "12.x" cannot continue, the final group then takes "12" only after "1."
        assert_eq!(extract_version("1.12.x"), Some("1.12"));
        assert_eq!(extract_version("3.6.4.min"), Some("3.6.4"));
    }

    #[test]
    fn test_templatize() {
        let (pattern, version) = templatize("jquery/3.6.4/jquery.min.js");
        assert_eq!(pattern, "jquery/{version}/jquery.min.js");
        assert_eq!(version, Some("3.6.4"));

        let (pattern, version) = templatize("jquery/1/jquery.min.js");
        assert_eq!(pattern, "jquery/1/jquery.min.js");
        assert_eq!(version, None);
    }

    #[test]
    fn test_substitute() {
        assert_eq!(
            substitute("resources/jquery/{version}/jquery.min.jsm", "2.1.4"),
            "resources/jquery/2.1.4/jquery.min.jsm"
        );
        assert_eq!(substitute("resources/x.jsm", "2.1.4"), "resources/x.jsm");
    }
}
