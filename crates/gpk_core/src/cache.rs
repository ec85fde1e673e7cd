use camino::Utf8PathBuf;
use gpk_git::Repo;
use tracing::{debug, info};

use crate::env::Config;
use crate::error::Error;

/// The authenticated revision a dependency resolved to, carrying the OIDs
/// that key the verified cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// A tag selected by range matching. Annotated tags carry the OID of
    /// the tag object itself.
    Tag {
        name: String,
        annotated: Option<String>,
        commit: String,
    },
    /// A branch with its resolved tip.
    Branch { name: String, commit: String },
    /// An explicit commit SHA from a source fragment.
    Commit { sha: String },
}

impl Revision {
    /// Cache key priority: annotated tag OID over commit OID.
    pub fn cache_oid(&self) -> &str {
        match self {
            Revision::Tag {
                annotated: Some(oid),
                ..
            } => oid,
            Revision::Tag { commit, .. } | Revision::Branch { commit, .. } => commit,
            Revision::Commit { sha } => sha,
        }
    }

    /// Commit OID the revision points at.
    pub fn commit(&self) -> &str {
        match self {
            Revision::Tag { commit, .. } | Revision::Branch { commit, .. } => commit,
            Revision::Commit { sha } => sha,
        }
    }

    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Revision::Branch { name, .. } => Some(name),
            _ => None,
        }
    }

    fn reference(&self) -> &str {
        match self {
            Revision::Tag { name, .. } | Revision::Branch { name, .. } => name,
            Revision::Commit { sha } => sha,
        }
    }
}

/// Ensures a verified cache entry for `revision` of `url` and returns its
/// path.
///
/// An existing entry is returned as-is: entries are immutable once renamed
/// into place, and the rename only ever happens after signature verification
/// succeeded. On verification failure the unverified clone is left behind
/// and the entry is never populated, so a later run retries cleanly.
pub fn fetch_verified(
    config: &Config,
    url: &str,
    revision: &Revision,
) -> Result<Utf8PathBuf, Error> {
    let cache_dir = config.cache_dir();
    let dst = cache_dir.join(revision.cache_oid());
    if dst.exists() {
        debug!("cache hit for {}", revision.cache_oid());
        return Ok(dst);
    }
    fs_err::create_dir_all(&cache_dir)?;

    // Unique per process so concurrent workers racing on the same OID keep
    // distinct clones; the winner renames, losers discard.
    let unverified = Utf8PathBuf::from(format!("{dst}-unverified-{}", std::process::id()));
    if unverified.exists() {
        fs_err::remove_dir_all(&unverified)?;
    }

    info!("fetching {} at {}", url, revision.reference());
    match revision {
        Revision::Tag { name, .. } | Revision::Branch { name, .. } => {
            gpk_git::clone_ref(name, url, &unverified)?;
        }
        Revision::Commit { sha } => gpk_git::clone_commit(url, sha, &unverified)?,
    }

    let repo = Repo::new(unverified.clone());
    let verified = match revision {
        Revision::Tag {
            name,
            annotated: Some(_),
            ..
        } => repo.verify_tag(name),
        Revision::Tag { commit, .. } | Revision::Branch { commit, .. } => {
            repo.verify_commit(commit)
        }
        Revision::Commit { sha } => repo.verify_commit(sha),
    };
    if let Err(e) = verified {
        return Err(if e.is_verification() {
            Error::VerificationFailure {
                url: url.to_string(),
                reference: revision.reference().to_string(),
            }
        } else {
            Error::Git(e)
        });
    }

    match fs_err::rename(&unverified, &dst) {
        Ok(()) => Ok(dst),
        Err(_) if dst.exists() => {
            // Lost the populate race; the existing entry is already verified.
            let _ = fs_err::remove_dir_all(&unverified);
            Ok(dst)
        }
        Err(e) => Err(e.into()),
    }
}
