use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::Error;

const GIT_PREFIXES: [&str; 5] = [
    "git+https://",
    "git+ssh://",
    "git+http://",
    "git+file://",
    "git://",
];

const FILE_TEMPLATE_PREFIX: &str = "git+file://";
const SEMVER_FRAGMENT: &str = "semver:";

/// A dependency source after resolution. `version` and `branch` are mutually
/// exclusive; both are absent when the source names no ref (discovery picks
/// the highest release tag). `git` is absent only for bare version-only
/// legacy sources, which can never be fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub git: Option<String>,
    pub version: Option<String>,
    pub branch: Option<String>,
}

impl Resolved {
    /// A 40-hex-character ref denotes a commit SHA, never a branch name.
    /// The installer must not attempt branch listing for it.
    pub fn commit(&self) -> Option<&str> {
        self.branch.as_deref().filter(|b| is_commit_sha(b))
    }
}

fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit())
}

/// Resolves a dependency source string against the enclosing package's
/// remote aliases.
///
/// `base` is the enclosing package directory, used to resolve relative
/// `git+file://` templates; `global` disables alias expansion entirely.
pub fn resolve(
    remotes: &BTreeMap<String, String>,
    name: &str,
    src: &str,
    base: Option<&Utf8Path>,
    global: bool,
) -> Result<Resolved, Error> {
    if GIT_PREFIXES.iter().any(|prefix| src.starts_with(prefix)) {
        return Ok(resolve_direct(src));
    }

    let Some((alias, tail)) = src.split_once(':') else {
        // Bare version-only legacy source.
        return Ok(Resolved {
            git: None,
            version: Some(src.to_string()),
            branch: None,
        });
    };

    if global {
        return Err(Error::UnknownRemote {
            alias: alias.to_string(),
        });
    }
    let template = remotes.get(alias).ok_or_else(|| Error::UnknownRemote {
        alias: alias.to_string(),
    })?;

    let (repo, fragment) = split_fragment(tail);
    let repo = if repo.is_empty() { name } else { repo };
    let git = compose_url(template, repo, base)?;
    let (version, branch) = parse_fragment(fragment);

    Ok(Resolved {
        git: Some(git),
        version,
        branch,
    })
}

fn resolve_direct(src: &str) -> Resolved {
    let (url, fragment) = split_fragment(src);
    let url = url.strip_prefix("git+").unwrap_or(url);
    let (version, branch) = parse_fragment(fragment);
    Resolved {
        git: Some(url.to_string()),
        version,
        branch,
    }
}

fn split_fragment(src: &str) -> (&str, Option<&str>) {
    match src.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (src, None),
    }
}

fn parse_fragment(fragment: Option<&str>) -> (Option<String>, Option<String>) {
    match fragment {
        None | Some("") => (None, None),
        Some(fragment) => match fragment.strip_prefix(SEMVER_FRAGMENT) {
            Some(range) => (Some(range.to_string()), None),
            None => (None, Some(fragment.to_string())),
        },
    }
}

fn compose_url(template: &str, repo: &str, base: Option<&Utf8Path>) -> Result<String, Error> {
    if let Some(path) = template.strip_prefix(FILE_TEMPLATE_PREFIX) {
        let path = Utf8Path::new(path);
        let resolved: Utf8PathBuf = if path.is_relative() {
            base.ok_or(Error::UnknownBase)?.join(path)
        } else {
            path.to_path_buf()
        };
        return Ok(format!("file://{resolved}/{repo}/.git"));
    }
    let template = template.trim_end_matches('/');
    Ok(format!("{template}/{repo}.git"))
}
