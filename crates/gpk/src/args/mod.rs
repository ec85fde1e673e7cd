use anyhow::bail;
use tracing::level_filters::LevelFilter;

/// gpk installs packages directly from git repositories, verifying the
/// signature of every installed revision.
#[derive(clap::Parser, Debug)]
#[command(version, author)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
    /// Print additional information in logs.
    ///
    /// `-v` sets the log level to DEBUG, `-vv` to TRACE. To change the log
    /// level without a flag, use the `GPK_LOG` environment variable.
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
    )]
    verbose: u8,
}

impl CliArgs {
    pub fn verbosity(&self) -> anyhow::Result<Option<LevelFilter>> {
        let level = match self.verbose {
            0 => None,
            1 => Some(LevelFilter::DEBUG),
            2 => Some(LevelFilter::TRACE),
            _ => bail!("invalid verbosity level. Use -v or -vv."),
        };
        Ok(level)
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Install the declared dependencies, or add new ones from git sources.
    ///
    /// A source is either a full git URL (`git+https://…`, `git+ssh://…`,
    /// `git+file://…`, `git://…`) or an `alias:repo` pair resolved through
    /// the manifest's remotes table, optionally suffixed with
    /// `#semver:<range>` or `#<ref>`.
    Install(Install),
    /// Remove dependencies from the manifest and prune every module that is
    /// no longer required.
    Uninstall(Uninstall),
    /// Rebuild the native addons of the package and its installed modules.
    Rebuild,
    /// Run a script declared in the manifest.
    Run(Run),
    /// Run the test script.
    Test,
    /// Write a skeleton manifest into the current directory.
    Init,
}

#[derive(clap::Args, Debug)]
pub struct Install {
    /// Git sources to add to the manifest before installing.
    pub sources: Vec<String>,
    /// Install into the global library root instead of the local tree.
    #[arg(short = 'g', long)]
    pub global: bool,
    /// Skip development dependencies.
    #[arg(long)]
    pub production: bool,
}

#[derive(clap::Args, Debug)]
pub struct Uninstall {
    /// Dependency names to remove.
    #[arg(required = true)]
    pub names: Vec<String>,
    /// Uninstall from the global library root.
    #[arg(short = 'g', long)]
    pub global: bool,
    /// Consider only runtime dependencies when pruning.
    #[arg(long)]
    pub production: bool,
}

#[derive(clap::Args, Debug)]
pub struct Run {
    /// Script name from the manifest's scripts map.
    pub script: String,
}
