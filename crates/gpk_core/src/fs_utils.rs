use std::path::Path;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};

pub fn current_directory() -> anyhow::Result<Utf8PathBuf> {
    let current_dir = std::env::current_dir().context("cannot determine current directory")?;
    to_utf8_pathbuf(current_dir)
}

pub fn canonicalize_utf8(path: &Utf8Path) -> anyhow::Result<Utf8PathBuf> {
    let canonical = fs_err::canonicalize(path.as_std_path())?;
    to_utf8_pathbuf(canonical)
}

pub fn to_utf8_pathbuf(path: impl Into<std::path::PathBuf>) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.into()).map_err(|p| anyhow::anyhow!("non-UTF-8 path {p:?}"))
}

pub fn to_utf8_path(path: &Path) -> anyhow::Result<&Utf8Path> {
    Utf8Path::from_path(path).ok_or_else(|| anyhow::anyhow!("non-UTF-8 path {path:?}"))
}

/// Temporary directory with a UTF-8 path.
#[derive(Debug)]
pub struct Utf8TempDir {
    path: Utf8PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl Utf8TempDir {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir().context("cannot create temporary directory")?;
        let path = to_utf8_pathbuf(temp_dir.path().to_path_buf())?;
        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}
