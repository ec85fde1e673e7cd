use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

use crate::cmd::{GitError, git};

/// A local clone (a verified cache entry or a fixture repository).
#[derive(Debug, Clone)]
pub struct Repo {
    dir: Utf8PathBuf,
}

/// Digest used by [`Repo::tree_hash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgo {
    Sha256,
    Sha512,
}

impl Repo {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Runs an arbitrary git command inside the repository.
    pub fn git(&self, args: &[&str]) -> Result<String, GitError> {
        git("git", args, Some(&self.dir))
    }

    /// OID of the commit HEAD points at.
    pub fn head_commit(&self) -> Result<String, GitError> {
        let output = git("rev-parse", &["rev-parse", "HEAD"], Some(&self.dir))?;
        Ok(output.trim().to_string())
    }

    /// Checks the signature of an annotated tag. Exit status is the contract:
    /// zero means the signature verified.
    pub fn verify_tag(&self, tag: &str) -> Result<(), GitError> {
        debug!("verifying tag {tag} in {}", self.dir);
        git("verify-tag", &["verify-tag", tag], Some(&self.dir))?;
        Ok(())
    }

    /// Checks the signature of a commit.
    pub fn verify_commit(&self, commit: &str) -> Result<(), GitError> {
        debug!("verifying commit {commit} in {}", self.dir);
        git("verify-commit", &["verify-commit", commit], Some(&self.dir))?;
        Ok(())
    }

    /// Writes `git archive HEAD` to `dst`.
    pub fn archive(&self, dst: &Utf8Path) -> Result<(), GitError> {
        git("archive", &["archive", "-o", dst.as_str(), "HEAD"], Some(&self.dir))?;
        Ok(())
    }

    /// Paths of the HEAD tree, sorted.
    pub fn list_tree(&self) -> Result<Vec<String>, GitError> {
        let output = git(
            "ls-tree",
            &["ls-tree", "--full-tree", "-r", "--name-only", "HEAD"],
            Some(&self.dir),
        )?;
        let mut paths: Vec<String> = output.lines().map(str::to_string).collect();
        paths.sort();
        Ok(paths)
    }

    /// Rolling digest over the HEAD tree: for every path in the sorted tree
    /// listing, `hex(digest(file)) + "  " + path + "\n"` is fed into the
    /// outer digest. Two identical trees hash identically regardless of
    /// where they were cloned.
    pub fn tree_hash(&self, base: Option<&Utf8Path>, algo: HashAlgo) -> anyhow::Result<String> {
        let base = base.unwrap_or(&self.dir);
        let paths = self.list_tree()?;
        match algo {
            HashAlgo::Sha256 => hash_tree::<Sha256>(base, &paths),
            HashAlgo::Sha512 => hash_tree::<Sha512>(base, &paths),
        }
    }
}

fn hash_tree<D: Digest>(base: &Utf8Path, paths: &[String]) -> anyhow::Result<String> {
    let mut tree = D::new();
    for path in paths {
        let file = base.join(path);
        let contents = fs_err::read(&file).with_context(|| format!("cannot hash {file}"))?;
        let digest = hex::encode(D::digest(&contents));
        tree.update(format!("{digest}  {path}\n"));
    }
    Ok(hex::encode(tree.finalize()))
}
