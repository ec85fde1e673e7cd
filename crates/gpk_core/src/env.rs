use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};

use crate::MODULES_DIR;
use crate::fs_utils;

/// Environment variable overriding the base directory that relative
/// `git+file://` remotes resolve against.
pub const BASE_DIR_ENV: &str = "GPK_BASE_DIR";

/// Process-wide configuration: where the verified cache lives, where global
/// installs go and how native addons are rebuilt.
#[derive(Debug, Clone)]
pub struct Config {
    home: Utf8PathBuf,
    prefix: Option<Utf8PathBuf>,
    base_dir: Option<Utf8PathBuf>,
    addon_build: Vec<String>,
}

impl Config {
    /// Configuration from the process environment. `home` defaults to
    /// `<user-home>/.gpk`.
    pub fn from_env() -> anyhow::Result<Self> {
        let user_home = dirs::home_dir().context("cannot determine home directory")?;
        let home = fs_utils::to_utf8_pathbuf(user_home)?.join(".gpk");
        Ok(Self {
            home,
            prefix: None,
            base_dir: std::env::var(BASE_DIR_ENV).ok().map(Utf8PathBuf::from),
            addon_build: default_addon_build(),
        })
    }

    /// Configuration rooted at an explicit home directory (tests, sandboxes).
    pub fn with_home(home: impl Into<Utf8PathBuf>) -> Self {
        Self {
            home: home.into(),
            prefix: None,
            base_dir: None,
            addon_build: default_addon_build(),
        }
    }

    pub fn set_prefix(&mut self, prefix: impl Into<Utf8PathBuf>) {
        self.prefix = Some(prefix.into());
    }

    pub fn set_base_dir(&mut self, base_dir: impl Into<Utf8PathBuf>) {
        self.base_dir = Some(base_dir.into());
    }

    pub fn home(&self) -> &Utf8Path {
        &self.home
    }

    /// Root of the verified cache.
    pub fn cache_dir(&self) -> Utf8PathBuf {
        self.home.join("cache")
    }

    pub fn base_dir(&self) -> Option<&Utf8Path> {
        self.base_dir.as_deref()
    }

    /// Command prefix invoked as `<addon_build...> rebuild` in a package
    /// directory carrying a `binding.gyp`.
    pub fn addon_build(&self) -> &[String] {
        &self.addon_build
    }

    /// Global prefix: explicit configuration, then `PREFIX`, then the
    /// directory the running binary is installed under. `DESTDIR` is
    /// prepended when present.
    pub fn global_prefix(&self) -> anyhow::Result<Utf8PathBuf> {
        let prefix = match &self.prefix {
            Some(prefix) => prefix.clone(),
            None => match std::env::var("PREFIX") {
                Ok(prefix) => Utf8PathBuf::from(prefix),
                Err(_) => runtime_prefix()?,
            },
        };
        Ok(match std::env::var("DESTDIR") {
            Ok(destdir) => prepend_destdir(&destdir, &prefix),
            Err(_) => prefix,
        })
    }

    /// Global library root holding globally installed packages.
    pub fn global_root(&self) -> anyhow::Result<Utf8PathBuf> {
        let prefix = self.global_prefix()?;
        if cfg!(windows) {
            Ok(prefix.join(MODULES_DIR))
        } else {
            Ok(prefix.join("lib").join(MODULES_DIR))
        }
    }

    /// Directory global executables are linked into.
    pub fn global_bin(&self) -> anyhow::Result<Utf8PathBuf> {
        let prefix = self.global_prefix()?;
        if cfg!(windows) {
            Ok(prefix)
        } else {
            Ok(prefix.join("bin"))
        }
    }
}

fn default_addon_build() -> Vec<String> {
    match std::env::var("GPK_NODE_GYP") {
        // A path to the addon build script, run through the runtime.
        Ok(script) => vec!["node".to_string(), script],
        Err(_) => vec!["node-gyp".to_string()],
    }
}

fn runtime_prefix() -> anyhow::Result<Utf8PathBuf> {
    let exe = std::env::current_exe().context("cannot locate the running binary")?;
    let exe_dir = exe
        .parent()
        .context("the running binary has no parent directory")?;
    let prefix = if cfg!(windows) {
        exe_dir
    } else {
        exe_dir.parent().unwrap_or(exe_dir)
    };
    fs_utils::to_utf8_pathbuf(prefix.to_path_buf())
}

fn prepend_destdir(destdir: &str, prefix: &Utf8Path) -> Utf8PathBuf {
    let relative = prefix.as_str().trim_start_matches(['/', '\\']);
    Utf8PathBuf::from(destdir).join(relative)
}
