use std::collections::BTreeMap;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, instrument};
use version_ranges::Range;

use crate::cache::{self, Revision};
use crate::copy;
use crate::env::Config;
use crate::error::Error;
use crate::fs_utils;
use crate::link;
use crate::manifest::{self, Manifest, Meta};
use crate::placement::{self, Placement, Target};
use crate::rebuild;
use crate::source::{self, Resolved};
use crate::{BIN_DIR, MODULES_DIR};

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOpts {
    pub global: bool,
    pub production: bool,
}

/// Installs the root package's dependencies.
///
/// CLI-supplied `sources` are discovered first and merged into the root
/// manifest; in global mode they are installed standalone under the global
/// library root instead.
pub fn install(config: &Config, sources: &[String], opts: InstallOpts) -> anyhow::Result<()> {
    if opts.global {
        return install_global(config, sources);
    }

    let start = fs_utils::current_directory()?;
    let (root, mut root_manifest) = manifest::locate(&start, true)?;

    if !sources.is_empty() {
        let mut new_deps = BTreeMap::new();
        for src in sources {
            let discovered = discover(config, src, Some(root.as_path()), &root_manifest, false)?;
            info!(
                "resolved {} to {}@{}",
                src,
                discovered.name,
                discovered.version.as_deref().unwrap_or(&discovered.commit)
            );
            new_deps.insert(discovered.name, src.clone());
        }
        manifest::add_deps(&mut root_manifest, &new_deps);
        manifest::write(&root, &root_manifest)?;
    }

    let deps = merged_dependencies(&root_manifest, opts.production)?;
    let chain = vec![root.clone()];
    for (name, src) in &deps {
        install_module(config, &root_manifest, name, src, &chain)
            .with_context(|| format!("cannot install {name}"))?;
    }

    // The root's own executables land next to its dependencies'.
    link::link_bins(&root_manifest, &root, &root.join(MODULES_DIR).join(BIN_DIR))?;
    Ok(())
}

/// Merges runtime and development dependencies; a name appearing in both
/// maps is an error.
pub fn merged_dependencies(
    manifest: &Manifest,
    production: bool,
) -> Result<BTreeMap<String, String>, Error> {
    let mut deps = manifest.dependencies.clone();
    if !production {
        for (name, src) in &manifest.dev_dependencies {
            if deps.contains_key(name) {
                return Err(Error::DuplicateDependency { name: name.clone() });
            }
            deps.insert(name.clone(), src.clone());
        }
    }
    Ok(deps)
}

/// Installs one dependency of the innermost chain frame, then recurses into
/// the fresh install site.
#[instrument(skip_all, fields(module = name))]
fn install_module(
    config: &Config,
    parent: &Manifest,
    name: &str,
    src: &str,
    chain: &[Utf8PathBuf],
) -> anyhow::Result<()> {
    let frame = chain.first().expect("ancestor chain is never empty");
    let resolved = source::resolve(&parent.remotes, name, src, Some(frame.as_path()), false)?;

    let range = parse_range(resolved.version.as_deref())?;

    // Commits and ranges classify offline; a branch needs its tip resolved
    // before compatibility can be judged.
    let pre_resolved = resolve_named_ref(&resolved, name)?;

    let any = Range::parse("*").expect("the wildcard range parses");
    let target = match (&pre_resolved, &range) {
        (Some(revision), _) => Target::Commit(revision.commit()),
        (None, Some(range)) => Target::Range(range),
        (None, None) => Target::Range(&any),
    };

    let Placement::Install { container, dst } = placement::plan(name, target, chain)? else {
        debug!("{name} is already satisfied");
        return Ok(());
    };

    let url = require_url(&resolved, name)?;
    let revision = match pre_resolved {
        Some(revision) => revision,
        None => tag_revision(url, range.as_ref(), resolved.version.as_deref())?,
    };

    let cache_entry = cache::fetch_verified(config, url, &revision)?;
    let commit = gpk_git::Repo::new(cache_entry.clone()).head_commit()?;
    let cached_manifest = manifest::read(&cache_entry)?.ok_or_else(|| Error::ManifestMissing {
        start: cache_entry.clone(),
    })?;

    info!(
        "installing {}@{} into {dst}",
        name,
        cached_manifest.version.as_deref().unwrap_or("unversioned")
    );
    copy::copy_package(&cache_entry, &dst, &cached_manifest)?;
    manifest::inject_meta(
        &dst,
        &Meta {
            from: src.to_string(),
            url: url.to_string(),
            commit: commit.clone(),
            branch: revision.branch_name().map(str::to_string),
        },
    )?;
    link::link_bins(
        &cached_manifest,
        &dst,
        &container.join(MODULES_DIR).join(BIN_DIR),
    )?;

    install_subtree(config, &cached_manifest, &dst, chain)?;
    Ok(())
}

/// Recurses into a freshly installed site: the site becomes the innermost
/// frame and only runtime dependencies are considered.
fn install_subtree(
    config: &Config,
    site_manifest: &Manifest,
    site: &Utf8Path,
    chain: &[Utf8PathBuf],
) -> anyhow::Result<()> {
    let mut child_chain = Vec::with_capacity(chain.len() + 1);
    child_chain.push(site.to_path_buf());
    child_chain.extend(chain.iter().cloned());

    for (dep_name, dep_src) in &site_manifest.dependencies {
        install_module(config, site_manifest, dep_name, dep_src, &child_chain)
            .with_context(|| format!("cannot install {dep_name}"))?;
    }

    rebuild::rebuild_package(config, site)?;
    Ok(())
}

fn install_global(config: &Config, sources: &[String]) -> anyhow::Result<()> {
    if sources.is_empty() {
        anyhow::bail!("global install requires at least one source");
    }
    let global_root = config.global_root()?;
    let global_bin = config.global_bin()?;

    for src in sources {
        let discovered = discover(config, src, None, &Manifest::default(), true)?;
        let placement = placement::plan_global(
            &discovered.name,
            Target::Commit(&discovered.commit),
            &global_root,
        )?;
        let Placement::Install { dst, .. } = placement else {
            info!("{} is up to date", discovered.name);
            continue;
        };

        info!("installing {} into {dst}", discovered.name);
        copy::copy_package(&discovered.cache_entry, &dst, &discovered.manifest)?;
        manifest::inject_meta(
            &dst,
            &Meta {
                from: src.clone(),
                url: discovered.url.clone(),
                commit: discovered.commit.clone(),
                branch: discovered.revision.branch_name().map(str::to_string),
            },
        )?;
        link::link_bins(&discovered.manifest, &dst, &global_bin)?;
        install_subtree(config, &discovered.manifest, &dst, &[])?;
    }
    Ok(())
}

/// A CLI source resolved to a concrete package: the revision is picked,
/// fetched through the verified cache, and the canonical name read back
/// from the cached manifest.
#[derive(Debug)]
struct Discovered {
    name: String,
    version: Option<String>,
    commit: String,
    url: String,
    revision: Revision,
    cache_entry: Utf8PathBuf,
    manifest: Manifest,
}

fn discover(
    config: &Config,
    src: &str,
    base: Option<&Utf8Path>,
    enclosing: &Manifest,
    global: bool,
) -> anyhow::Result<Discovered> {
    let resolved = source::resolve(&enclosing.remotes, "", src, base, global)?;
    let url = require_url(&resolved, src)?.to_string();
    let range = parse_range(resolved.version.as_deref())?;

    let revision = match resolve_named_ref(&resolved, src)? {
        Some(revision) => revision,
        None => {
            // Without an explicit ref, discovery takes the highest
            // non-prerelease tag the range (if any) allows.
            let tags = gpk_git::list_tags(&url)?;
            let tag = version_ranges::highest_non_prerelease(
                tags.keys().map(String::as_str),
                range.as_ref(),
            )
            .ok_or_else(|| Error::UnknownRef {
                url: url.clone(),
                wanted: resolved.version.clone().unwrap_or_else(|| "*".to_string()),
            })?;
            let tag_ref = &tags[tag];
            Revision::Tag {
                name: tag.to_string(),
                annotated: tag_ref.annotated.clone(),
                commit: tag_ref.commit.clone(),
            }
        }
    };

    let cache_entry = cache::fetch_verified(config, &url, &revision)?;
    let commit = gpk_git::Repo::new(cache_entry.clone()).head_commit()?;
    let cached_manifest = manifest::read(&cache_entry)?.ok_or_else(|| Error::ManifestMissing {
        start: cache_entry.clone(),
    })?;
    let name = cached_manifest
        .name
        .clone()
        .with_context(|| format!("package at {url} has no name"))?;

    Ok(Discovered {
        name,
        version: cached_manifest.version.clone(),
        commit,
        url,
        revision,
        cache_entry,
        manifest: cached_manifest,
    })
}

/// Resolves an explicit ref to a revision: a 40-hex fragment is a commit
/// SHA (never listed against the remote), anything else is a branch whose
/// tip is read from the remote view.
fn resolve_named_ref(resolved: &Resolved, name: &str) -> anyhow::Result<Option<Revision>> {
    if let Some(sha) = resolved.commit() {
        return Ok(Some(Revision::Commit {
            sha: sha.to_string(),
        }));
    }
    let Some(branch) = &resolved.branch else {
        return Ok(None);
    };
    let url = require_url(resolved, name)?;
    let refs = gpk_git::list_branches(url)?;
    let tip = refs.branches.get(branch).ok_or_else(|| Error::UnknownRef {
        url: url.to_string(),
        wanted: branch.clone(),
    })?;
    Ok(Some(Revision::Branch {
        name: branch.clone(),
        commit: tip.clone(),
    }))
}

fn tag_revision(
    url: &str,
    range: Option<&Range>,
    wanted: Option<&str>,
) -> anyhow::Result<Revision> {
    let tags = gpk_git::list_tags(url)?;
    let names = tags.keys().map(String::as_str);
    let tag = match range {
        Some(range) => version_ranges::match_tag(names, range),
        None => version_ranges::highest_non_prerelease(names, None),
    }
    .ok_or_else(|| Error::UnknownRef {
        url: url.to_string(),
        wanted: wanted.unwrap_or("*").to_string(),
    })?;
    let tag_ref = &tags[tag];
    Ok(Revision::Tag {
        name: tag.to_string(),
        annotated: tag_ref.annotated.clone(),
        commit: tag_ref.commit.clone(),
    })
}

fn require_url<'a>(resolved: &'a Resolved, name: &str) -> Result<&'a str, Error> {
    resolved.git.as_deref().ok_or_else(|| Error::RemoteMissing {
        name: name.to_string(),
    })
}

fn parse_range(range: Option<&str>) -> anyhow::Result<Option<Range>> {
    match range {
        Some(range) => {
            let parsed = Range::parse(range)
                .map_err(|e| anyhow::anyhow!("invalid version range {range:?}: {e}"))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn duplicate_dependency_names_are_rejected() {
        let mut manifest = Manifest::named("root", "1.0.0");
        manifest
            .dependencies
            .insert("a".to_string(), "^1.0.0".to_string());
        manifest
            .dev_dependencies
            .insert("a".to_string(), "^2.0.0".to_string());

        let err = merged_dependencies(&manifest, false).unwrap_err();
        assert!(matches!(err, Error::DuplicateDependency { name } if name == "a"));
    }

    #[test]
    fn production_skips_dev_dependencies() {
        let mut manifest = Manifest::named("root", "1.0.0");
        manifest
            .dependencies
            .insert("a".to_string(), "^1.0.0".to_string());
        manifest
            .dev_dependencies
            .insert("b".to_string(), "^1.0.0".to_string());

        let deps = merged_dependencies(&manifest, true).unwrap();
        assert_eq!(1, deps.len());
        assert!(deps.contains_key("a"));

        let deps = merged_dependencies(&manifest, false).unwrap();
        assert_eq!(2, deps.len());
    }

    #[test]
    fn dependency_iteration_is_lexicographic() {
        let mut manifest = Manifest::named("root", "1.0.0");
        for name in ["zeta", "alpha", "mid"] {
            manifest
                .dependencies
                .insert(name.to_string(), "^1.0.0".to_string());
        }
        let deps = merged_dependencies(&manifest, true).unwrap();
        let order: Vec<&str> = deps.keys().map(String::as_str).collect();
        assert_eq!(vec!["alpha", "mid", "zeta"], order);
    }

    #[test]
    fn bare_version_sources_cannot_be_fetched() {
        let resolved = Resolved {
            git: None,
            version: Some("^1.0.0".to_string()),
            branch: None,
        };
        let err = require_url(&resolved, "legacy").unwrap_err();
        assert!(matches!(err, Error::RemoteMissing { name } if name == "legacy"));
    }
}
