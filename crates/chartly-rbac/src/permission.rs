// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hierarchical dot-pattern permission grammar: `reports.*.read`,
//! `reports.acme.**`, `admin`. A segment is a literal (`[a-z0-9_-]+`), a
//! single-segment wildcard (`*`), or (only as the final segment) a
//! remainder wildcard (`**`).

/// Validate and normalize a permission grant string.
///
/// Returns `None` for an empty grant, a grant with an empty segment, or a
/// `**` segment anywhere but last — callers silently drop these rather than
/// failing role construction.
#[must_use]
pub fn parse_permission(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let segments: Vec<&str> = trimmed.split('.').collect();
    for (i, seg) in segments.iter().enumerate() {
        if seg.is_empty() {
            return None;
        }
        if *seg == "**" {
            if i != segments.len() - 1 {
                return None;
            }
            continue;
        }
        if *seg == "*" {
            continue;
        }
        if !seg
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
        {
            return None;
        }
    }
    Some(trimmed.to_string())
}

/// Does `grant` cover `want`?
///
/// A literal segment must match exactly; `*` matches exactly one segment of
/// `want`; a trailing `**` matches the rest of `want` (one or more
/// segments). Both strings are matched dot-segment-by-dot-segment.
#[must_use]
pub fn match_permission(grant: &str, want: &str) -> bool {
    let grant_segs: Vec<&str> = grant.split('.').collect();
    let want_segs: Vec<&str> = want.split('.').collect();

    for (i, gseg) in grant_segs.iter().enumerate() {
        if *gseg == "**" {
            return i < want_segs.len();
        }
        let Some(wseg) = want_segs.get(i) else {
            return false;
        };
        if *gseg != "*" && gseg != wseg {
            return false;
        }
    }
    grant_segs.len() == want_segs.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_empty_and_empty_segments() {
        assert_eq!(parse_permission(""), None);
        assert_eq!(parse_permission("reports..read"), None);
    }

    #[test]
    fn parse_rejects_double_star_not_at_the_end() {
        assert_eq!(parse_permission("reports.**.read"), None);
        assert_eq!(parse_permission("reports.**"), Some("reports.**".to_string()));
    }

    #[test]
    fn parse_accepts_literal_and_single_wildcard_segments() {
        assert_eq!(parse_permission("reports.*.read"), Some("reports.*.read".to_string()));
    }

    #[test]
    fn literal_grant_matches_only_the_identical_permission() {
        assert!(match_permission("reports.acme.read", "reports.acme.read"));
        assert!(!match_permission("reports.acme.read", "reports.acme.write"));
    }

    #[test]
    fn single_star_matches_exactly_one_segment() {
        assert!(match_permission("reports.*.read", "reports.acme.read"));
        assert!(!match_permission("reports.*.read", "reports.acme.sub.read"));
    }

    #[test]
    fn trailing_double_star_matches_one_or_more_remaining_segments() {
        assert!(match_permission("reports.**", "reports.acme.read"));
        assert!(match_permission("reports.**", "reports.acme"));
        assert!(!match_permission("reports.**", "reports"));
    }

    #[test]
    fn grant_and_want_of_different_lengths_without_wildcard_do_not_match() {
        assert!(!match_permission("reports.acme", "reports.acme.read"));
    }
}
