//! Throwaway local repositories for tests.
//!
//! The fixtures never sign anything, so signature verification against them
//! is expected to fail; tests use them for listing, cloning and tree
//! inspection.

use camino::Utf8Path;

use crate::Repo;

#[derive(Debug)]
pub struct TestRepo {
    repo: Repo,
    // Removed with the fixture.
    _dir: tempfile::TempDir,
}

impl TestRepo {
    /// Creates an empty repository with a `master` default branch and
    /// signing disabled.
    pub fn init() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().to_path_buf();
        let repo = Repo::new(path);
        repo.git(&["init", "-b", "master"]).unwrap();
        repo.git(&["config", "user.name", "fixture"]).unwrap();
        repo.git(&["config", "user.email", "fixture@example.com"])
            .unwrap();
        repo.git(&["config", "commit.gpgsign", "false"]).unwrap();
        repo.git(&["config", "tag.gpgsign", "false"]).unwrap();
        Self { repo, _dir: dir }
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    pub fn path(&self) -> &Utf8Path {
        self.repo.dir()
    }

    /// `file://` URL usable with the remote listing and clone operations.
    pub fn url(&self) -> String {
        format!("file://{}", self.repo.dir())
    }

    pub fn commit_file(&self, name: &str, contents: &str) {
        let path = self.repo.dir().join(name);
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent).unwrap();
        }
        fs_err::write(&path, contents).unwrap();
        self.repo.git(&["add", "."]).unwrap();
        self.repo.git(&["commit", "-m", name]).unwrap();
    }

    pub fn tag_annotated(&self, name: &str, message: &str) {
        self.repo.git(&["tag", "-a", name, "-m", message]).unwrap();
    }

    pub fn tag_lightweight(&self, name: &str) {
        self.repo.git(&["tag", name]).unwrap();
    }

    pub fn branch(&self, name: &str) {
        self.repo.git(&["branch", name]).unwrap();
    }

    pub fn head_commit(&self) -> String {
        self.repo.head_commit().unwrap()
    }
}

/// Convenience for tests that just need any repository with one commit.
pub fn repo_with_commit() -> TestRepo {
    let repo = TestRepo::init();
    repo.commit_file("README.md", "fixture\n");
    repo
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::init()
    }
}
