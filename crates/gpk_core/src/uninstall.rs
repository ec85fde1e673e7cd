use std::collections::{BTreeMap, BTreeSet, VecDeque};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};
use version_ranges::Range;

use crate::env::Config;
use crate::fs_utils;
use crate::link;
use crate::manifest::{self, Manifest};
use crate::source::{self, Resolved};
use crate::{BIN_DIR, MODULES_DIR};

#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOpts {
    pub global: bool,
    pub production: bool,
}

/// Removes dependencies from the root manifest and prunes every installed
/// module that is no longer transitively required.
pub fn uninstall(config: &Config, names: &[String], opts: UninstallOpts) -> anyhow::Result<()> {
    if opts.global {
        return uninstall_global(config, names);
    }
    let start = fs_utils::current_directory()?;
    let (root, _) = manifest::locate(&start, true)?;
    uninstall_local(&root, names, opts.production)
}

/// Local uninstall rooted at an explicit package directory.
pub fn uninstall_local(root: &Utf8Path, names: &[String], production: bool) -> anyhow::Result<()> {
    let (_, mut root_manifest) = manifest::locate(root, false)?;
    manifest::remove_deps(&mut root_manifest, names);
    manifest::write(root, &root_manifest)?;
    prune(root, &root_manifest, production)
}

fn uninstall_global(config: &Config, names: &[String]) -> anyhow::Result<()> {
    let global_root = config.global_root()?;
    let global_bin = config.global_bin()?;
    for name in names {
        let site = global_root.join(name);
        let Some(site_manifest) = manifest::read(&site)? else {
            warn!("{name} is not installed globally");
            continue;
        };
        link::unlink_bins(&site_manifest, &global_bin)?;
        fs_err::remove_dir_all(&site)?;
        info!("removed {site}");
    }
    Ok(())
}

/// Removes every top-level module that is not reachable from the root
/// manifest via matching dependency declarations, unlinking its executables.
pub fn prune(root: &Utf8Path, root_manifest: &Manifest, production: bool) -> anyhow::Result<()> {
    let modules = root.join(MODULES_DIR);
    if !modules.exists() {
        return Ok(());
    }

    let installed = top_level_modules(&modules)?;
    let required = reachable(root, root_manifest, &installed, production)?;

    let bin_dir = modules.join(BIN_DIR);
    for (name, site_manifest) in &installed {
        if required.contains(name) {
            continue;
        }
        info!("removing unreachable module {name}");
        link::unlink_bins(site_manifest, &bin_dir)?;
        fs_err::remove_dir_all(modules.join(name))?;
    }
    Ok(())
}

/// Top-level install sites by name, skipping dot-prefixed entries. A site
/// without a readable manifest still participates (it is prunable).
fn top_level_modules(modules: &Utf8Path) -> anyhow::Result<BTreeMap<String, Manifest>> {
    let mut sites = BTreeMap::new();
    for entry in fs_err::read_dir(modules)? {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|name| anyhow::anyhow!("non-UTF-8 module name {name:?}"))?;
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        let site_manifest = manifest::read(&modules.join(&name))?.unwrap_or_default();
        sites.insert(name, site_manifest);
    }
    Ok(sites)
}

/// Breadth-first reachability over dependency declarations. A top-level
/// module is required when some reachable package declares a source that
/// matches it; every package in a required module's subtree is reachable in
/// turn.
fn reachable(
    root: &Utf8Path,
    root_manifest: &Manifest,
    installed: &BTreeMap<String, Manifest>,
    production: bool,
) -> anyhow::Result<BTreeSet<String>> {
    let modules = root.join(MODULES_DIR);
    let mut required: BTreeSet<String> = BTreeSet::new();
    let mut pending: VecDeque<(Utf8PathBuf, Manifest)> = VecDeque::new();

    let mut root_declarations = root_manifest.clone();
    if production {
        root_declarations.dev_dependencies.clear();
    }
    pending.push_back((root.to_path_buf(), root_declarations));

    while let Some((dir, pkg)) = pending.pop_front() {
        let declarations = pkg
            .dependencies
            .iter()
            .chain(pkg.dev_dependencies.iter());
        for (dep_name, src) in declarations {
            if required.contains(dep_name) {
                continue;
            }
            let Some(site_manifest) = installed.get(dep_name) else {
                continue;
            };
            let resolved = source::resolve(&pkg.remotes, dep_name, src, Some(dir.as_path()), false)?;
            if !declares_match(&resolved, site_manifest) {
                continue;
            }
            required.insert(dep_name.clone());
            collect_subtree(&modules.join(dep_name), &mut pending)?;
        }
    }
    Ok(required)
}

/// The declared source matches the installed copy: commit SHAs compare
/// against `_commit`, branches against `_branch`, ranges against the
/// installed version.
fn declares_match(resolved: &Resolved, installed: &Manifest) -> bool {
    if let Some(sha) = resolved.commit() {
        return installed.commit.as_deref() == Some(sha);
    }
    if let Some(branch) = &resolved.branch {
        return installed.branch.as_deref() == Some(branch.as_str());
    }
    match &resolved.version {
        Some(range) => match (Range::parse(range), installed.semver()) {
            (Ok(range), Some(version)) => range.matches(&version),
            _ => false,
        },
        None => true,
    }
}

fn collect_subtree(
    dir: &Utf8Path,
    out: &mut VecDeque<(Utf8PathBuf, Manifest)>,
) -> anyhow::Result<()> {
    let Some(mut pkg) = manifest::read(dir)? else {
        return Ok(());
    };
    // Installed packages only pull in their runtime dependencies.
    pkg.dev_dependencies.clear();
    out.push_back((dir.to_path_buf(), pkg));

    let nested = dir.join(MODULES_DIR);
    if !nested.exists() {
        return Ok(());
    }
    for entry in fs_err::read_dir(&nested)? {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|name| anyhow::anyhow!("non-UTF-8 module name {name:?}"))?;
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        collect_subtree(&nested.join(name), out)?;
    }
    Ok(())
}
