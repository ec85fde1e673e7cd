use semver::{Version, VersionReq};

/// A version range in the source-string grammar: `||` unions of
/// whitespace-separated comparators (`^`, `~`, `>=`, `<`, `=`), hyphen pairs
/// and `x`/`X` wildcards.
///
/// Each `||` alternative is compiled to a [`VersionReq`]; the range matches a
/// version when any alternative does.
#[derive(Debug, Clone)]
pub struct Range {
    source: String,
    alternatives: Vec<VersionReq>,
}

impl Range {
    pub fn parse(range: &str) -> Result<Self, semver::Error> {
        let mut alternatives = Vec::new();
        for alternative in range.split("||") {
            alternatives.push(parse_alternative(alternative)?);
        }
        Ok(Self {
            source: range.to_string(),
            alternatives,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The range exactly as it appeared in the source string.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_alternative(alternative: &str) -> Result<VersionReq, semver::Error> {
    let alternative = alternative.trim();
    if alternative.is_empty() {
        return VersionReq::parse("*");
    }

    if let Some((lower, upper)) = split_hyphen(alternative) {
        let req = format!(">={}, <={}", bound(lower), bound(upper));
        return VersionReq::parse(&req);
    }

    let comparators: Vec<String> = alternative
        .split_whitespace()
        .map(normalize_comparator)
        .collect();
    VersionReq::parse(&comparators.join(", "))
}

/// Splits `1.2.3 - 2.0.0` into its bounds. The hyphen must stand alone so
/// prerelease identifiers (`1.0.0-rc.1`) are not torn apart.
fn split_hyphen(alternative: &str) -> Option<(&str, &str)> {
    let idx = alternative.find(" - ")?;
    let lower = alternative[..idx].trim();
    let upper = alternative[idx + 3..].trim();
    (!lower.is_empty() && !upper.is_empty()).then_some((lower, upper))
}

/// Maps one comparator token to the `VersionReq` grammar.
///
/// `x`/`X` components become wildcards; a wildcard behind an operator is
/// truncated away (`~1.x` means `~1`); a bare version gets an explicit
/// operator (`=` when full, wildcard when partial) because `VersionReq`
/// would otherwise treat it as a caret requirement.
fn normalize_comparator(token: &str) -> String {
    let (op, rest) = split_operator(token);
    let (base, pre) = split_prerelease(rest);
    let components = wildcard_components(base);
    let wildcard = components.iter().position(|c| c == "*");

    if !op.is_empty() {
        return match wildcard {
            Some(0) => "*".to_string(),
            Some(idx) => format!("{op}{}", components[..idx].join(".")),
            None => format!("{op}{base}{pre}"),
        };
    }

    match wildcard {
        Some(0) => "*".to_string(),
        Some(idx) => components[..=idx].join("."),
        None if base.starts_with(|c: char| c.is_ascii_digit()) => {
            if components.len() < 3 {
                // Bare partial version: `1.2` means any 1.2.x release.
                format!("{base}.*")
            } else {
                format!("={base}{pre}")
            }
        }
        None => format!("{base}{pre}"),
    }
}

/// Wildcard-free version usable behind a hyphen bound's operator.
fn bound(token: &str) -> String {
    let (_, rest) = split_operator(token);
    let (base, pre) = split_prerelease(rest);
    let components = wildcard_components(base);
    match components.iter().position(|c| c == "*") {
        Some(0) => "0".to_string(),
        Some(idx) => components[..idx].join("."),
        None => format!("{base}{pre}"),
    }
}

fn split_prerelease(rest: &str) -> (&str, &str) {
    match rest.find(['-', '+']) {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    }
}

fn wildcard_components(base: &str) -> Vec<String> {
    base.split('.')
        .map(|part| {
            if part == "x" || part == "X" {
                "*".to_string()
            } else {
                part.to_string()
            }
        })
        .collect()
}

fn split_operator(token: &str) -> (&str, &str) {
    let idx = token
        .find(|c: char| c.is_ascii_digit() || c == 'x' || c == 'X' || c == '*')
        .unwrap_or(token.len());
    token.split_at(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matches(range: &str, version: &str) -> bool {
        Range::parse(range)
            .unwrap()
            .matches(&Version::parse(version).unwrap())
    }

    #[test]
    fn caret_and_tilde_ranges_match() {
        assert!(matches("^1.0.0", "1.1.0"));
        assert!(!matches("^1.0.0", "2.0.0"));
        assert!(matches("~1.1.7", "1.1.9"));
        assert!(!matches("~1.1.7", "1.2.0"));
    }

    #[test]
    fn comparator_sets_are_anded() {
        assert!(matches(">=1.2.0 <2.0.0", "1.5.0"));
        assert!(!matches(">=1.2.0 <2.0.0", "2.0.0"));
    }

    #[test]
    fn unions_match_either_side() {
        assert!(matches("^1.0.0 || ^2.0.0", "1.3.0"));
        assert!(matches("^1.0.0 || ^2.0.0", "2.1.0"));
        assert!(!matches("^1.0.0 || ^2.0.0", "3.0.0"));
    }

    #[test]
    fn hyphen_ranges_are_inclusive() {
        assert!(matches("1.2.3 - 2.0.0", "1.2.3"));
        assert!(matches("1.2.3 - 2.0.0", "2.0.0"));
        assert!(!matches("1.2.3 - 2.0.0", "2.0.1"));
    }

    #[test]
    fn hyphen_range_keeps_prerelease_bounds_whole() {
        assert!(matches("1.0.0-rc.1 - 2.0.0", "1.5.0"));
    }

    #[test]
    fn wildcards() {
        assert!(matches("*", "0.0.1"));
        assert!(matches("1.x", "1.9.9"));
        assert!(!matches("1.x", "2.0.0"));
        assert!(matches("1.2.x", "1.2.7"));
        assert!(!matches("1.2.X", "1.3.0"));
    }

    #[test]
    fn wildcards_behind_operators_truncate() {
        assert!(matches("~1.x", "1.9.0"));
        assert!(!matches("~1.x", "2.0.0"));
        assert!(matches(">=1.x", "2.4.0"));
    }

    #[test]
    fn hyphen_bounds_tolerate_partial_versions() {
        assert!(matches("1.x - 2.2", "2.0.0"));
        assert!(!matches("1.x - 2.2", "2.3.0"));
    }

    #[test]
    fn bare_versions_are_exact() {
        assert!(matches("1.2.3", "1.2.3"));
        assert!(!matches("1.2.3", "1.2.4"));
    }

    #[test]
    fn bare_partial_versions_are_wildcards() {
        assert!(matches("1.2", "1.2.9"));
        assert!(!matches("1.2", "1.3.0"));
        assert!(matches("1", "1.9.0"));
    }

    #[test]
    fn prereleases_need_opt_in() {
        assert!(!matches("^1.0.0", "1.1.0-beta.1"));
        assert!(matches("^1.1.0-beta.1", "1.1.0-beta.2"));
    }

    #[test]
    fn source_round_trips() {
        let range = Range::parse("^1.0.0 || ~2.1.0").unwrap();
        assert_eq!("^1.0.0 || ~2.1.0", range.source());
    }
}
