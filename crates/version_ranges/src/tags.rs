use std::cmp::Ordering;

use semver::Version;

use crate::Range;

/// Parses a git tag as a version, stripping one leading `v`.
pub fn parse(tag: &str) -> Option<Version> {
    Version::parse(tag.strip_prefix('v').unwrap_or(tag)).ok()
}

/// Orders tags by semver precedence. Tags that do not parse compare lower
/// than any valid tag; equal precedence breaks ties by tag name, the
/// lexicographically higher name winning.
pub fn sort_tags(mut tags: Vec<String>, descending: bool) -> Vec<String> {
    tags.sort_by(|a, b| {
        let ordering = compare_tags(a, b);
        if descending { ordering.reverse() } else { ordering }
    });
    tags
}

fn compare_tags(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(va), Some(vb)) => va.cmp_precedence(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Returns the highest version-bearing tag (a `v`-prefixed tag parsing as
/// semver) whose version satisfies `range`.
pub fn match_tag<'a, I>(tags: I, range: &Range) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    best_tag(tags, |version| range.matches(version))
}

/// Highest version-bearing tag that is not a prerelease, optionally further
/// constrained by `range`. Used when discovering a repository without an
/// explicit ref.
pub fn highest_non_prerelease<'a, I>(tags: I, range: Option<&Range>) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    best_tag(tags, |version| {
        version.pre.is_empty() && range.is_none_or(|r| r.matches(version))
    })
}

fn best_tag<'a, I, F>(tags: I, mut accept: F) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&Version) -> bool,
{
    tags.into_iter()
        .filter(|tag| tag.starts_with('v'))
        .filter_map(|tag| parse(tag).map(|version| (tag, version)))
        .filter(|(_, version)| accept(version))
        .max_by(|(ta, va), (tb, vb)| va.cmp_precedence(vb).then_with(|| ta.cmp(tb)))
        .map(|(tag, _)| tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn range(r: &str) -> Range {
        Range::parse(r).unwrap()
    }

    #[test]
    fn caret_range_selects_highest_compatible_tag() {
        let tags = ["v1.0.0", "v1.1.0", "v2.0.0"];
        assert_eq!(Some("v1.1.0"), match_tag(tags, &range("^1.0.0")));
        assert_eq!(Some("v2.0.0"), match_tag(tags, &range("^2.0.0")));
    }

    #[test]
    fn no_satisfying_tag_yields_none() {
        let tags = ["v1.0.0", "v1.1.0"];
        assert_eq!(None, match_tag(tags, &range("^3.0.0")));
    }

    #[test]
    fn tags_without_v_prefix_are_not_version_bearing() {
        let tags = ["1.5.0", "v1.0.0"];
        assert_eq!(Some("v1.0.0"), match_tag(tags, &range("^1.0.0")));
    }

    #[test]
    fn equal_precedence_prefers_lexicographically_higher_name() {
        // Build metadata does not affect precedence.
        let tags = ["v1.0.0+linux", "v1.0.0+osx"];
        assert_eq!(Some("v1.0.0+osx"), match_tag(tags, &range("^1.0.0")));
    }

    #[test]
    fn sort_puts_invalid_tags_below_valid_ones() {
        let tags = vec![
            "not-a-version".to_string(),
            "v0.2.0".to_string(),
            "v0.10.0".to_string(),
        ];
        let sorted = sort_tags(tags, true);
        assert_eq!(vec!["v0.10.0", "v0.2.0", "not-a-version"], sorted);
    }

    #[test]
    fn sort_ascending_reverses() {
        let tags = vec!["v2.0.0".to_string(), "v1.0.0".to_string()];
        assert_eq!(vec!["v1.0.0", "v2.0.0"], sort_tags(tags, false));
    }

    #[test]
    fn highest_non_prerelease_skips_prereleases() {
        let tags = ["v1.0.0", "v2.0.0-rc.1"];
        assert_eq!(Some("v1.0.0"), highest_non_prerelease(tags, None));
    }

    #[test]
    fn highest_non_prerelease_honors_range() {
        let tags = ["v1.0.0", "v1.4.0", "v2.0.0"];
        assert_eq!(
            Some("v1.4.0"),
            highest_non_prerelease(tags, Some(&range("^1.0.0")))
        );
    }
}
