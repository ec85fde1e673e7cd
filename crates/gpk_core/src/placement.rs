use camino::{Utf8Path, Utf8PathBuf};
use version_ranges::Range;

use crate::MODULES_DIR;
use crate::error::Error;
use crate::manifest;

/// What an existing install is matched against.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Exact commit: a branch tip or a SHA fragment.
    Commit(&'a str),
    /// Version range from a `semver:` fragment.
    Range(&'a Range),
}

/// Outcome of placement planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// An existing compatible install already satisfies the request.
    Satisfied,
    /// Copy into `dst`, which lives under `container`'s modules directory.
    Install {
        container: Utf8PathBuf,
        dst: Utf8PathBuf,
    },
}

enum SiteState {
    Absent,
    Compatible,
    Conflict,
}

/// Chooses where `name` must live given the ancestor chain (innermost frame
/// first, top-level root last).
///
/// The innermost frame's own slot is the bundle path: it can satisfy the
/// request (a bundled dependency shipped with the package) but is never a
/// placement candidate. Candidates are the ancestors proper, innermost
/// first, so a dependency lands next to its requester's siblings and is
/// shared by them; at the top level the root itself is the only candidate.
pub fn plan(name: &str, target: Target<'_>, chain: &[Utf8PathBuf]) -> Result<Placement, Error> {
    let (frame, ancestors) = chain.split_first().expect("ancestor chain is never empty");
    let mut conflict: Option<Utf8PathBuf> = None;

    if !ancestors.is_empty() {
        let bundle = site_path(frame, name);
        match classify(&bundle, target)? {
            SiteState::Compatible => return Ok(Placement::Satisfied),
            SiteState::Conflict => conflict = Some(bundle),
            SiteState::Absent => {}
        }
    }

    let candidates = if ancestors.is_empty() {
        std::slice::from_ref(frame)
    } else {
        ancestors
    };
    for container in candidates {
        let site = site_path(container, name);
        match classify(&site, target)? {
            SiteState::Compatible => return Ok(Placement::Satisfied),
            SiteState::Conflict => {
                conflict.get_or_insert(site);
            }
            SiteState::Absent => {
                return Ok(Placement::Install {
                    container: container.clone(),
                    dst: site,
                });
            }
        }
    }

    let path = conflict.expect("no free slot implies at least one conflict");
    Err(Error::PlacementConflict {
        name: name.to_string(),
        path,
    })
}

/// Global mode: the single candidate is the global library root and a
/// conflicting install is always fatal.
pub fn plan_global(
    name: &str,
    target: Target<'_>,
    global_root: &Utf8Path,
) -> Result<Placement, Error> {
    let site = global_root.join(name);
    match classify(&site, target)? {
        SiteState::Compatible => Ok(Placement::Satisfied),
        SiteState::Absent => Ok(Placement::Install {
            container: global_root.to_path_buf(),
            dst: site,
        }),
        SiteState::Conflict => Err(Error::PlacementConflict {
            name: name.to_string(),
            path: site,
        }),
    }
}

fn site_path(container: &Utf8Path, name: &str) -> Utf8PathBuf {
    container.join(MODULES_DIR).join(name)
}

fn classify(site: &Utf8Path, target: Target<'_>) -> Result<SiteState, Error> {
    let Some(existing) = manifest::read(site)? else {
        return Ok(SiteState::Absent);
    };
    let compatible = match target {
        Target::Commit(commit) => existing.commit.as_deref() == Some(commit),
        Target::Range(range) => existing.semver().is_some_and(|v| range.matches(&v)),
    };
    Ok(if compatible {
        SiteState::Compatible
    } else {
        SiteState::Conflict
    })
}
