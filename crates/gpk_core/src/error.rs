use camino::Utf8PathBuf;

/// Error kinds surfaced by the install engine.
///
/// Orchestration code wraps these in [`anyhow::Error`] for context; callers
/// that care about the kind use `downcast_ref`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no package manifest found above {start}")]
    ManifestMissing { start: Utf8PathBuf },

    #[error("unknown remote {alias:?}")]
    UnknownRemote { alias: String },

    #[error("relative file:// remote requires a base directory")]
    UnknownBase,

    #[error("no ref matching {wanted:?} in {url}")]
    UnknownRef { url: String, wanted: String },

    #[error("dependency {name:?} has no git remote")]
    RemoteMissing { name: String },

    #[error("signature verification failed for {reference} of {url}")]
    VerificationFailure { url: String, reference: String },

    #[error("conflicting install of {name:?} at {path}")]
    PlacementConflict { name: String, path: Utf8PathBuf },

    #[error("dependency {name:?} declared in both dependencies and devDependencies")]
    DuplicateDependency { name: String },

    #[error(transparent)]
    Git(#[from] gpk_git::GitError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
