use std::process::Command;

use anyhow::Context;
use camino::Utf8Path;
use tracing::{debug, info};

use crate::MODULES_DIR;
use crate::env::Config;

const BINDING_FILE: &str = "binding.gyp";

/// Runs the configured addon build (`<builder...> rebuild`) in `dir` when it
/// carries a top-level `binding.gyp`. Packages without one are skipped.
pub fn rebuild_package(config: &Config, dir: &Utf8Path) -> anyhow::Result<()> {
    if !dir.join(BINDING_FILE).exists() {
        return Ok(());
    }
    let (program, args) = config
        .addon_build()
        .split_first()
        .context("empty addon build command")?;

    info!("rebuilding native addon in {dir}");
    let status = Command::new(program)
        .args(args)
        .arg("rebuild")
        .current_dir(dir)
        .status()
        .with_context(|| format!("cannot spawn {program}"))?;
    anyhow::ensure!(status.success(), "addon build failed in {dir}");
    Ok(())
}

/// Rebuilds a package and every installed module below it.
pub fn rebuild_tree(config: &Config, root: &Utf8Path) -> anyhow::Result<()> {
    rebuild_package(config, root)?;

    let modules = root.join(MODULES_DIR);
    if !modules.exists() {
        return Ok(());
    }
    let mut names = Vec::new();
    for entry in fs_err::read_dir(&modules)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        names.push(name);
    }
    names.sort();

    for name in names {
        debug!("rebuilding subtree of {name}");
        rebuild_tree(config, &modules.join(name))?;
    }
    Ok(())
}
