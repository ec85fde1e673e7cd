use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::manifest::Manifest;

/// Creates executable links for a package's `bin` map.
///
/// Each link at `<bin_dir>/<name>` is a symlink whose target is the path
/// from `bin_dir` to the executable inside the install site, so the tree
/// can be relocated as a whole. A link that already points at the right
/// target is left alone; anything else at that path is an error.
pub fn link_bins(
    manifest: &Manifest,
    install_dir: &Utf8Path,
    bin_dir: &Utf8Path,
) -> anyhow::Result<()> {
    if manifest.bin.is_empty() {
        return Ok(());
    }
    fs_err::create_dir_all(bin_dir)?;
    for (name, rel) in &manifest.bin {
        let target = install_dir.join(rel);
        let link_target = relative_path(bin_dir, &target);
        let link = bin_dir.join(name);
        debug!("linking {link} -> {link_target}");
        ensure_symlink(&link, &link_target)?;
        make_executable(&target)?;
        #[cfg(windows)]
        write_cmd_shim(bin_dir, name, &link_target)?;
    }
    Ok(())
}

/// Removes the links of a package's `bin` map. Missing links are fine.
pub fn unlink_bins(manifest: &Manifest, bin_dir: &Utf8Path) -> anyhow::Result<()> {
    for name in manifest.bin.keys() {
        let link = bin_dir.join(name);
        match fs_err::symlink_metadata(&link) {
            Ok(meta) if meta.file_type().is_symlink() => {
                debug!("unlinking {link}");
                fs_err::remove_file(&link)?;
            }
            Ok(_) | Err(_) => {}
        }
        #[cfg(windows)]
        {
            let shim = bin_dir.join(format!("{name}.cmd"));
            if shim.exists() {
                fs_err::remove_file(&shim)?;
            }
        }
    }
    Ok(())
}

fn ensure_symlink(link: &Utf8Path, target: &Utf8Path) -> anyhow::Result<()> {
    match fs_err::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let existing = fs_err::read_link(link.as_std_path())?;
            if existing == target.as_std_path() {
                return Ok(());
            }
            anyhow::bail!("{link} already links to {}", existing.display());
        }
        Ok(_) => anyhow::bail!("{link} exists and is not a symlink"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(target, link)
        .with_context(|| format!("cannot link {link}"))?;
    #[cfg(windows)]
    std::os::windows::fs::symlink_file(target, link)
        .with_context(|| format!("cannot link {link}"))?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(target: &Utf8Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if target.exists() {
        fs_err::set_permissions(target, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_target: &Utf8Path) -> anyhow::Result<()> {
    Ok(())
}

/// Shim invoking the runtime with the linked script, for shells that do not
/// follow symlinks to scripts.
#[cfg(windows)]
fn write_cmd_shim(bin_dir: &Utf8Path, name: &str, link_target: &Utf8Path) -> anyhow::Result<()> {
    let shim = bin_dir.join(format!("{name}.cmd"));
    let target = link_target.as_str().replace('/', "\\");
    let contents = format!("@ECHO OFF\r\nnode \"%~dp0\\{target}\" %*\r\n");
    fs_err::write(shim, contents)?;
    Ok(())
}

/// Path from `base` to `target` using `..` segments over the common prefix.
fn relative_path(base: &Utf8Path, target: &Utf8Path) -> Utf8PathBuf {
    let base_components: Vec<_> = base.components().collect();
    let target_components: Vec<_> = target.components().collect();
    let common = base_components
        .iter()
        .zip(&target_components)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = Utf8PathBuf::new();
    for _ in common..base_components.len() {
        relative.push("..");
    }
    for component in &target_components[common..] {
        relative.push(component.as_str());
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_utils::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn bin_manifest(name: &str, rel: &str) -> Manifest {
        let mut manifest = Manifest::named("pkg", "1.0.0");
        manifest.bin.insert(name.to_string(), rel.to_string());
        manifest
    }

    #[test]
    fn relative_paths_climb_over_the_common_prefix() {
        assert_eq!(
            Utf8PathBuf::from("../pkg/bin/cli.js"),
            relative_path(
                Utf8Path::new("/root/node_modules/.bin"),
                Utf8Path::new("/root/node_modules/pkg/bin/cli.js"),
            )
        );
    }

    #[cfg(unix)]
    #[test]
    fn links_are_relative_and_idempotent() {
        let root = Utf8TempDir::new().unwrap();
        let install_dir = root.path().join("node_modules/pkg");
        let bin_dir = root.path().join("node_modules/.bin");
        fs_err::create_dir_all(&install_dir).unwrap();
        fs_err::write(install_dir.join("cli.js"), "#!/usr/bin/env node\n").unwrap();

        let manifest = bin_manifest("pkg-cli", "cli.js");
        link_bins(&manifest, &install_dir, &bin_dir).unwrap();

        let link = bin_dir.join("pkg-cli");
        let target = fs_err::read_link(link.as_std_path()).unwrap();
        assert_eq!(std::path::PathBuf::from("../pkg/cli.js"), target);
        // The link resolves to the script.
        assert!(link.canonicalize().is_ok());

        // Linking again is a no-op.
        link_bins(&manifest, &install_dir, &bin_dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn conflicting_links_error() {
        let root = Utf8TempDir::new().unwrap();
        let install_dir = root.path().join("node_modules/pkg");
        let bin_dir = root.path().join("node_modules/.bin");
        fs_err::create_dir_all(&install_dir).unwrap();
        fs_err::create_dir_all(&bin_dir).unwrap();
        fs_err::write(install_dir.join("cli.js"), "").unwrap();
        std::os::unix::fs::symlink("../elsewhere/cli.js", bin_dir.join("pkg-cli")).unwrap();

        let manifest = bin_manifest("pkg-cli", "cli.js");
        assert!(link_bins(&manifest, &install_dir, &bin_dir).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn regular_files_in_the_bin_dir_error() {
        let root = Utf8TempDir::new().unwrap();
        let install_dir = root.path().join("node_modules/pkg");
        let bin_dir = root.path().join("node_modules/.bin");
        fs_err::create_dir_all(&install_dir).unwrap();
        fs_err::create_dir_all(&bin_dir).unwrap();
        fs_err::write(install_dir.join("cli.js"), "").unwrap();
        fs_err::write(bin_dir.join("pkg-cli"), "not a link").unwrap();

        let manifest = bin_manifest("pkg-cli", "cli.js");
        assert!(link_bins(&manifest, &install_dir, &bin_dir).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn unlink_removes_only_symlinks() {
        let root = Utf8TempDir::new().unwrap();
        let install_dir = root.path().join("node_modules/pkg");
        let bin_dir = root.path().join("node_modules/.bin");
        fs_err::create_dir_all(&install_dir).unwrap();
        fs_err::write(install_dir.join("cli.js"), "").unwrap();

        let manifest = bin_manifest("pkg-cli", "cli.js");
        link_bins(&manifest, &install_dir, &bin_dir).unwrap();
        unlink_bins(&manifest, &bin_dir).unwrap();
        assert!(fs_err::symlink_metadata(bin_dir.join("pkg-cli")).is_err());

        // Unlinking again is fine.
        unlink_bins(&manifest, &bin_dir).unwrap();
    }
}
