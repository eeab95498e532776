/// Leading text of a base64-wrapped gzip stream, longest first.
///
/// The 13-character form is the base64 of a gzip header with a zero mtime and
/// a FAT/Unix OS byte; the 4-character form is the shortest prefix every
/// gzip-in-base64 payload shares.
pub const MAGIC_PREFIXES: [&str; 2] = ["H4sIAAAAAAAAA", "H4sI"];

/// Substrings that only show up in plain placement text.
pub const PLACEMENT_MARKERS: [&str; 4] = [",2,", ";1,", "kA2,", "kS38,"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Compressed,
    DelimitedText,
    Unknown,
}

pub fn classify_payload(payload: &[u8]) -> PayloadKind {
    let trimmed = payload.trim_ascii_start();
    if trimmed.is_empty() {
        return PayloadKind::Unknown;
    }

    if matched_magic_prefix(trimmed).is_some() {
        return PayloadKind::Compressed;
    }

    if PLACEMENT_MARKERS
        .iter()
        .any(|marker| contains_subslice(trimmed, marker.as_bytes()))
    {
        return PayloadKind::DelimitedText;
    }

    PayloadKind::Unknown
}

pub(crate) fn matched_magic_prefix(payload: &[u8]) -> Option<&'static str> {
    MAGIC_PREFIXES
        .iter()
        .copied()
        .find(|prefix| payload.starts_with(prefix.as_bytes()))
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_prefix_classifies_as_compressed() {
        assert_eq!(
            classify_payload(b"H4sIAAAAAAAAA-1YW5LjIAy8"),
            PayloadKind::Compressed
        );
        assert_eq!(classify_payload(b"H4sIxyz"), PayloadKind::Compressed);
    }

    #[test]
    fn prefix_match_is_case_sensitive() {
        assert_eq!(classify_payload(b"h4siAAAA"), PayloadKind::Unknown);
    }

    #[test]
    fn placement_marker_without_prefix_is_delimited_text() {
        assert_eq!(
            classify_payload(b"1,1,2,15,3,15;1,8,2,45,3,15;"),
            PayloadKind::DelimitedText
        );
        assert_eq!(
            classify_payload(b"kS38,1_40_2_125,kA2,0;"),
            PayloadKind::DelimitedText
        );
    }

    #[test]
    fn empty_and_unmarked_payloads_are_unknown() {
        assert_eq!(classify_payload(b""), PayloadKind::Unknown);
        assert_eq!(classify_payload(b"   \n"), PayloadKind::Unknown);
        assert_eq!(classify_payload(b"hello world"), PayloadKind::Unknown);
    }

    #[test]
    fn leading_whitespace_is_ignored_for_prefix() {
        assert_eq!(classify_payload(b"\n  H4sIAAAA"), PayloadKind::Compressed);
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(
            matched_magic_prefix(b"H4sIAAAAAAAAAxyz"),
            Some("H4sIAAAAAAAAA")
        );
        assert_eq!(matched_magic_prefix(b"H4sIAAAAAAAAC"), Some("H4sI"));
        assert_eq!(matched_magic_prefix(b"eJx"), None);
    }
}
