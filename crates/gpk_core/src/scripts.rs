use std::process::Command;

use anyhow::Context;
use camino::Utf8Path;
use tracing::info;

use crate::manifest::Manifest;
use crate::{BIN_DIR, MODULES_DIR};

/// Runs a named manifest script through the shell, with the package's
/// `.bin` directory prepended to `PATH`.
pub fn run_script(manifest: &Manifest, dir: &Utf8Path, name: &str) -> anyhow::Result<()> {
    let Some(command) = manifest.scripts.get(name) else {
        anyhow::bail!("no script named {name:?}");
    };
    info!("> {command}");

    let bin_dir = dir.join(MODULES_DIR).join(BIN_DIR);
    let path = match std::env::var_os("PATH") {
        Some(path) => std::env::join_paths(
            std::iter::once(bin_dir.as_std_path().to_path_buf())
                .chain(std::env::split_paths(&path)),
        )
        .context("cannot extend PATH")?,
        None => bin_dir.as_os_str().to_os_string(),
    };

    let status = shell_command(command)
        .current_dir(dir)
        .env("PATH", path)
        .status()
        .context("cannot spawn the shell")?;
    anyhow::ensure!(status.success(), "script {name:?} failed: {status}");
    Ok(())
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_utils::Utf8TempDir;

    #[test]
    fn missing_scripts_error() {
        let dir = Utf8TempDir::new().unwrap();
        let manifest = Manifest::named("pkg", "1.0.0");
        assert!(run_script(&manifest, dir.path(), "test").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn scripts_run_in_the_package_directory() {
        let dir = Utf8TempDir::new().unwrap();
        let mut manifest = Manifest::named("pkg", "1.0.0");
        manifest
            .scripts
            .insert("touch".to_string(), "echo ran > witness.txt".to_string());

        run_script(&manifest, dir.path(), "touch").unwrap();
        assert!(dir.path().join("witness.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_scripts_surface_an_error() {
        let dir = Utf8TempDir::new().unwrap();
        let mut manifest = Manifest::named("pkg", "1.0.0");
        manifest
            .scripts
            .insert("test".to_string(), "exit 3".to_string());
        assert!(run_script(&manifest, dir.path(), "test").is_err());
    }
}
