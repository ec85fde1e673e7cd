use anyhow::Context;
use camino::Utf8Path;
use tracing::{debug, warn};

use crate::filter::{IgnoreStack, PackageFilter, Verdict};
use crate::manifest::{self, Manifest};

/// Copies a verified cache entry into an install site, honoring the layered
/// file filter. `manifest` is the manifest of the package being copied.
pub fn copy_package(src: &Utf8Path, dst: &Utf8Path, manifest: &Manifest) -> anyhow::Result<()> {
    // A destination without a readable manifest is debris from an
    // interrupted copy.
    if dst.exists() && manifest::read(dst)?.is_none() {
        fs_err::remove_dir_all(dst)?;
    }
    fs_err::create_dir_all(dst)?;
    debug!("copying {src} to {dst}");

    let filter = PackageFilter::new(manifest)?;
    let ignores = IgnoreStack::root(src)?;
    copy_dir(src, dst, "", &filter, &ignores)
}

fn copy_dir(
    src_dir: &Utf8Path,
    dst_dir: &Utf8Path,
    rel_prefix: &str,
    filter: &PackageFilter,
    ignores: &IgnoreStack,
) -> anyhow::Result<()> {
    let mut entries = Vec::new();
    for entry in fs_err::read_dir(src_dir)? {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|name| anyhow::anyhow!("non-UTF-8 file name {name:?} in {src_dir}"))?;
        entries.push((name, entry.file_type()?));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, file_type) in entries {
        let rel = if rel_prefix.is_empty() {
            name.clone()
        } else {
            format!("{rel_prefix}/{name}")
        };
        let src_path = src_dir.join(&name);
        let is_dir = file_type.is_dir();
        if filter.verdict(&rel, &src_path, is_dir, ignores) == Verdict::Skip {
            continue;
        }

        let dst_path = dst_dir.join(&name);
        if is_dir {
            fs_err::create_dir_all(&dst_path)?;
            let ignores = ignores.enter(&src_path)?;
            copy_dir(&src_path, &dst_path, &rel, filter, &ignores)?;
        } else if file_type.is_file() {
            fs_err::copy(&src_path, &dst_path)
                .with_context(|| format!("cannot copy {src_path}"))?;
        } else {
            // Symlink: copy what it points at, dropping broken links.
            match fs_err::metadata(&src_path) {
                Ok(meta) if meta.is_file() => {
                    fs_err::copy(&src_path, &dst_path)
                        .with_context(|| format!("cannot copy {src_path}"))?;
                }
                _ => warn!("skipping symlink {src_path}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_utils::Utf8TempDir;

    fn write(dir: &Utf8Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs_err::create_dir_all(path.parent().unwrap()).unwrap();
        fs_err::write(path, contents).unwrap();
    }

    #[test]
    fn copies_the_tree_minus_ignored_entries() {
        let src = Utf8TempDir::new().unwrap();
        let dst = Utf8TempDir::new().unwrap();
        let dst = dst.path().join("site");

        let pkg = Manifest::named("pkg", "1.0.0");
        manifest::write(src.path(), &pkg).unwrap();
        write(src.path(), "lib/index.js", "code\n");
        write(src.path(), "lib/scratch.tmp", "junk\n");
        write(src.path(), ".git/HEAD", "ref\n");
        write(src.path(), ".npmignore", "*.tmp\n");

        copy_package(src.path(), &dst, &pkg).unwrap();

        assert!(dst.join("package.json").exists());
        assert!(dst.join("lib/index.js").exists());
        assert!(!dst.join("lib/scratch.tmp").exists());
        assert!(!dst.join(".git").exists());
        assert!(!dst.join(".npmignore").exists());
    }

    #[test]
    fn nested_ignore_files_apply_to_their_subtree_only() {
        let src = Utf8TempDir::new().unwrap();
        let dst = Utf8TempDir::new().unwrap();
        let dst = dst.path().join("site");

        let pkg = Manifest::named("pkg", "1.0.0");
        manifest::write(src.path(), &pkg).unwrap();
        write(src.path(), "a/.npmignore", "*.log\n");
        write(src.path(), "a/debug.log", "drop\n");
        write(src.path(), "b/debug.log", "keep\n");

        copy_package(src.path(), &dst, &pkg).unwrap();

        assert!(!dst.join("a/debug.log").exists());
        assert!(dst.join("b/debug.log").exists());
    }

    #[test]
    fn files_whitelist_limits_top_level_entries() {
        let src = Utf8TempDir::new().unwrap();
        let dst = Utf8TempDir::new().unwrap();
        let dst = dst.path().join("site");

        let pkg = Manifest {
            files: Some(vec!["lib".to_string()]),
            ..Manifest::named("pkg", "1.0.0")
        };
        manifest::write(src.path(), &pkg).unwrap();
        write(src.path(), "lib/index.js", "code\n");
        write(src.path(), "scripts/tool.js", "tool\n");
        write(src.path(), "README.md", "docs\n");

        copy_package(src.path(), &dst, &pkg).unwrap();

        assert!(dst.join("lib/index.js").exists());
        assert!(dst.join("README.md").exists());
        assert!(dst.join("package.json").exists());
        assert!(!dst.join("scripts").exists());
    }

    #[test]
    fn bundled_dependencies_are_the_only_surviving_modules() {
        let src = Utf8TempDir::new().unwrap();
        let dst = Utf8TempDir::new().unwrap();
        let dst = dst.path().join("site");

        let pkg = Manifest {
            bundle_dependencies: Some(vec!["keeper".to_string()]),
            ..Manifest::named("pkg", "1.0.0")
        };
        manifest::write(src.path(), &pkg).unwrap();
        write(src.path(), "node_modules/keeper/index.js", "kept\n");
        write(src.path(), "node_modules/dropped/index.js", "dropped\n");

        copy_package(src.path(), &dst, &pkg).unwrap();

        assert!(dst.join("node_modules/keeper/index.js").exists());
        assert!(!dst.join("node_modules/dropped").exists());
    }

    #[test]
    fn half_finished_destination_is_replaced() {
        let src = Utf8TempDir::new().unwrap();
        let dst_root = Utf8TempDir::new().unwrap();
        let dst = dst_root.path().join("site");

        let pkg = Manifest::named("pkg", "1.0.0");
        manifest::write(src.path(), &pkg).unwrap();
        write(src.path(), "index.js", "code\n");

        // No manifest in the destination: debris from an aborted copy.
        write(&dst, "stale.js", "stale\n");

        copy_package(src.path(), &dst, &pkg).unwrap();

        assert!(!dst.join("stale.js").exists());
        assert!(dst.join("index.js").exists());
    }
}
