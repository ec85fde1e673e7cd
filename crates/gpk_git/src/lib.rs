//! Thin wrapper around the `git` binary.
//!
//! Every operation shells out to a subprocess with prompts disabled, so a
//! missing credential fails fast instead of hanging the install. Failures
//! carry the failing stage and the subprocess stderr.

mod cmd;
mod remote;
mod repo;

#[cfg(feature = "test_fixture")]
pub mod fixture;

pub use cmd::GitError;
pub use remote::{RemoteRefs, TagRef, clone_commit, clone_ref, list_branches, list_tags};
pub use repo::{HashAlgo, Repo};
