use std::collections::BTreeSet;

use anyhow::Context;
use camino::Utf8Path;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::MODULES_DIR;
use crate::manifest::Manifest;

/// Ignore files consulted per directory, first existing one wins.
pub const IGNORE_FILES: [&str; 4] = [".gpkignore", ".yarnignore", ".npmignore", ".gitignore"];

/// Names that are dropped everywhere, regardless of keep patterns.
const ALWAYS_IGNORE: [&str; 13] = [
    ".*.swp",
    "._*",
    ".DS_Store",
    ".git",
    ".hg",
    ".svn",
    "config.gypi",
    "CVS",
    "npm-debug.log",
    ".gpkignore",
    ".yarnignore",
    ".npmignore",
    ".gitignore",
];

/// Names no user pattern can drop (matched case-insensitively).
const NEVER_IGNORE: [&str; 6] = [
    "package.json",
    "readme*",
    "license*",
    "licence*",
    "changelog*",
    "history*",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Skip,
}

/// The keep/ignore rule set of one package being copied.
///
/// The keep layer is fixed at construction from the manifest's `files` list;
/// the per-directory ignore layer lives in [`IgnoreStack`] and is rebuilt as
/// the copier descends.
#[derive(Debug)]
pub struct PackageFilter {
    always: GlobSet,
    never: GlobSet,
    keep: Option<KeepSet>,
    bundled: BTreeSet<String>,
}

#[derive(Debug)]
struct KeepSet {
    keep: GlobSet,
    inverse: GlobSet,
}

impl PackageFilter {
    pub fn new(manifest: &Manifest) -> anyhow::Result<Self> {
        let bundled: BTreeSet<String> = manifest
            .bundled()
            .into_iter()
            .map(str::to_string)
            .collect();
        let keep = match &manifest.files {
            Some(files) => Some(build_keep_set(files, !bundled.is_empty())?),
            None => None,
        };
        Ok(Self {
            always: build_globset(&ALWAYS_IGNORE, false)?,
            never: build_globset(&NEVER_IGNORE, true)?,
            keep,
            bundled,
        })
    }

    /// Decides one entry. `rel` is the forward-slash path from the copy
    /// root; `abs` the entry on disk (handed to the ignore layers).
    pub fn verdict(&self, rel: &str, abs: &Utf8Path, is_dir: bool, ignores: &IgnoreStack) -> Verdict {
        let file_name = rel.rsplit('/').next().unwrap_or(rel);
        let depth = rel.split('/').count();

        // The always-ignored baseline beats everything, kept entries
        // included.
        if self.always.is_match(file_name) {
            return Verdict::Skip;
        }

        // Bundled-dependency classification owns node_modules and precedes
        // every pattern layer.
        if rel == MODULES_DIR || rel.starts_with("node_modules/") {
            return self.bundled_verdict(rel, depth);
        }

        if self.never.is_match(file_name) {
            return Verdict::Keep;
        }

        // The keep layer applies once, at the top of the copied tree.
        if depth == 1
            && let Some(keep) = &self.keep
        {
            if keep.inverse.is_match(rel) {
                return Verdict::Skip;
            }
            return if keep.keep.is_match(rel) {
                Verdict::Keep
            } else {
                Verdict::Skip
            };
        }

        match ignores.ignored(abs, is_dir) {
            Some(true) => Verdict::Skip,
            Some(false) | None => Verdict::Keep,
        }
    }

    fn bundled_verdict(&self, rel: &str, depth: usize) -> Verdict {
        match depth {
            1 => {
                if self.bundled.is_empty() {
                    Verdict::Skip
                } else {
                    Verdict::Keep
                }
            }
            2 => {
                let dep = rel.split('/').nth(1).unwrap_or("");
                if self.bundled.contains(dep) {
                    Verdict::Keep
                } else {
                    Verdict::Skip
                }
            }
            // Inside a bundled dependency the subtree is kept wholesale;
            // only the always-ignored baseline applies (checked earlier).
            _ => Verdict::Keep,
        }
    }
}

fn build_keep_set(files: &[String], bundled: bool) -> anyhow::Result<KeepSet> {
    let mut keep = GlobSetBuilder::new();
    let mut inverse = GlobSetBuilder::new();

    for name in NEVER_IGNORE {
        keep.add(build_glob(name, true)?);
    }
    if bundled {
        keep.add(build_glob(MODULES_DIR, false)?);
    }
    for entry in files {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.strip_prefix('!') {
            Some(inverted) => {
                inverse.add(build_glob(inverted.trim_end_matches('/'), false)?);
            }
            None => {
                keep.add(build_glob(entry.trim_end_matches('/'), false)?);
            }
        }
    }

    Ok(KeepSet {
        keep: keep.build()?,
        inverse: inverse.build()?,
    })
}

fn build_globset(patterns: &[&str], case_insensitive: bool) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(pattern, case_insensitive)?);
    }
    Ok(builder.build()?)
}

fn build_glob(pattern: &str, case_insensitive: bool) -> anyhow::Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .with_context(|| format!("invalid pattern {pattern:?}"))
}

/// Ignore files of every directory from the copy root down to the current
/// one. The deepest file wins where patterns disagree.
#[derive(Debug, Clone, Default)]
pub struct IgnoreStack {
    layers: Vec<Gitignore>,
}

impl IgnoreStack {
    /// Stack for the copy root itself.
    pub fn root(dir: &Utf8Path) -> anyhow::Result<Self> {
        Self::default().enter(dir)
    }

    /// Stack for a subdirectory: the parent layers plus the directory's own
    /// ignore file, if it has one.
    pub fn enter(&self, dir: &Utf8Path) -> anyhow::Result<Self> {
        let mut layers = self.layers.clone();
        if let Some(gitignore) = read_ignore_file(dir)? {
            layers.push(gitignore);
        }
        Ok(Self { layers })
    }

    /// `Some(true)` ignored, `Some(false)` whitelisted with `!`, `None` when
    /// no pattern matches. Layers are consulted deepest first.
    fn ignored(&self, abs: &Utf8Path, is_dir: bool) -> Option<bool> {
        for layer in self.layers.iter().rev() {
            match layer.matched(abs, is_dir) {
                ignore::Match::Ignore(_) => return Some(true),
                ignore::Match::Whitelist(_) => return Some(false),
                ignore::Match::None => {}
            }
        }
        None
    }
}

fn read_ignore_file(dir: &Utf8Path) -> anyhow::Result<Option<Gitignore>> {
    for name in IGNORE_FILES {
        let path = dir.join(name);
        let contents = match fs_err::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        let mut builder = GitignoreBuilder::new(dir);
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            // The bundled-dependency logic owns node_modules.
            if names_modules_dir(trimmed) {
                continue;
            }
            builder
                .add_line(None, line)
                .with_context(|| format!("invalid pattern in {path}"))?;
        }
        return Ok(Some(builder.build()?));
    }
    Ok(None)
}

/// True when a pattern has `node_modules` as a path component; names that
/// merely contain the substring are ordinary user patterns.
fn names_modules_dir(pattern: &str) -> bool {
    pattern
        .trim_start_matches('!')
        .split('/')
        .any(|component| component == MODULES_DIR)
}
