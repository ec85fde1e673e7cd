mod args;
mod log;

use anyhow::Context;
use clap::Parser;
use gpk_core::install::InstallOpts;
use gpk_core::uninstall::UninstallOpts;
use gpk_core::{Config, fs_utils, install, manifest, rebuild, scripts, uninstall};
use tracing::error;

use crate::args::{CliArgs, Command};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    log::init(args.verbosity()?);
    run(args).map_err(|e| {
        error!("{:?}", e);
        e
    })?;

    Ok(())
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    match args.command {
        Command::Install(cmd_args) => {
            let config = Config::from_env()?;
            install::install(
                &config,
                &cmd_args.sources,
                InstallOpts {
                    global: cmd_args.global,
                    production: cmd_args.production,
                },
            )?;
        }
        Command::Uninstall(cmd_args) => {
            let config = Config::from_env()?;
            uninstall::uninstall(
                &config,
                &cmd_args.names,
                UninstallOpts {
                    global: cmd_args.global,
                    production: cmd_args.production,
                },
            )?;
        }
        Command::Rebuild => {
            let config = Config::from_env()?;
            let (root, _) = manifest::locate(&fs_utils::current_directory()?, true)?;
            rebuild::rebuild_tree(&config, &root)?;
        }
        Command::Run(cmd_args) => run_script(&cmd_args.script)?,
        Command::Test => run_script("test")?,
        Command::Init => init()?,
    }
    Ok(())
}

fn run_script(name: &str) -> anyhow::Result<()> {
    let (root, root_manifest) = manifest::locate(&fs_utils::current_directory()?, true)?;
    scripts::run_script(&root_manifest, &root, name)
}

/// Writes a skeleton manifest named after the current directory.
fn init() -> anyhow::Result<()> {
    let dir = fs_utils::current_directory()?;
    if manifest::read(&dir)?.is_some() {
        anyhow::bail!("a manifest already exists in {dir}");
    }
    let name = dir
        .file_name()
        .context("cannot name a package after the filesystem root")?;
    let mut skeleton = manifest::Manifest::named(name, "1.0.0");
    skeleton.main = Some("index.js".to_string());
    manifest::write(&dir, &skeleton)?;
    println!("wrote {}", dir.join(gpk_core::MANIFEST_FILE));
    Ok(())
}
