use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::MANIFEST_FILE;
use crate::error::Error;

/// A package manifest (`package.json`).
///
/// Maps are `BTreeMap`s so dependency iteration and serialization are
/// lexicographic; unknown fields round-trip through `rest` so rewriting an
/// installed manifest never loses data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bin: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(
        default,
        rename = "devDependencies",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remotes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(
        default,
        rename = "bundleDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundle_dependencies: Option<Vec<String>>,
    #[serde(
        default,
        rename = "bundledDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundled_dependencies: Option<Vec<String>>,
    #[serde(default, rename = "_from", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, rename = "_resolved", skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    #[serde(default, rename = "_commit", skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, rename = "_branch", skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_json::Value>,
}

impl Manifest {
    pub fn named(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            ..Self::default()
        }
    }

    pub fn semver(&self) -> Option<Version> {
        Version::parse(self.version.as_deref()?).ok()
    }

    /// Both spellings of the bundled-dependency list, merged.
    pub fn bundled(&self) -> Vec<&str> {
        self.bundle_dependencies
            .iter()
            .chain(self.bundled_dependencies.iter())
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

/// Reads the manifest of a package directory. A missing file is `Ok(None)`;
/// everything else (unreadable file, invalid JSON) is an error.
pub fn read(dir: &Utf8Path) -> Result<Option<Manifest>, Error> {
    let path = dir.join(MANIFEST_FILE);
    let contents = match fs_err::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let manifest = serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Some(manifest))
}

/// Finds the root package starting at `start`, optionally climbing parent
/// directories until a manifest is found.
pub fn locate(start: &Utf8Path, walk: bool) -> Result<(Utf8PathBuf, Manifest), Error> {
    let mut dir = start;
    loop {
        if let Some(manifest) = read(dir)? {
            return Ok((dir.to_path_buf(), manifest));
        }
        if !walk {
            break;
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
    Err(Error::ManifestMissing {
        start: start.to_path_buf(),
    })
}

/// Writes a manifest as pretty JSON with a trailing newline.
pub fn write(dir: &Utf8Path, manifest: &Manifest) -> Result<(), Error> {
    let path = dir.join(MANIFEST_FILE);
    let mut contents = serde_json::to_string_pretty(manifest)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    contents.push('\n');
    fs_err::write(&path, contents)?;
    Ok(())
}

/// Resolution metadata injected into an installed manifest.
#[derive(Debug, Clone)]
pub struct Meta {
    pub from: String,
    pub url: String,
    pub commit: String,
    pub branch: Option<String>,
}

/// Records where an install site came from: `_from`, `_resolved`, `_commit`
/// and, for branch installs, `_branch`.
pub fn inject_meta(dir: &Utf8Path, meta: &Meta) -> Result<(), Error> {
    let mut manifest = read(dir)?.ok_or_else(|| Error::ManifestMissing {
        start: dir.to_path_buf(),
    })?;
    manifest.from = Some(meta.from.clone());
    manifest.resolved = Some(format!("git+{}#{}", meta.url, meta.commit));
    manifest.commit = Some(meta.commit.clone());
    manifest.branch = meta.branch.clone();
    debug!("injecting metadata into {dir}");
    write(dir, &manifest)
}

/// Merges new dependencies into the manifest; the map stays sorted.
pub fn add_deps(manifest: &mut Manifest, deps: &BTreeMap<String, String>) {
    for (name, source) in deps {
        manifest.dependencies.insert(name.clone(), source.clone());
    }
}

/// Drops dependencies by name from both dependency maps.
pub fn remove_deps(manifest: &mut Manifest, names: &[String]) {
    for name in names {
        manifest.dependencies.remove(name);
        manifest.dev_dependencies.remove(name);
    }
}
