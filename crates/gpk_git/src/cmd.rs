use std::process::Command;

use camino::Utf8Path;
use tracing::trace;

/// A failed git subprocess. `stage` names the operation (`clone`,
/// `ls-remote`, `verify-tag`, ...) and `stderr` carries whatever git printed.
#[derive(Debug, thiserror::Error)]
#[error("git {stage} failed: {}", stderr.trim())]
pub struct GitError {
    pub stage: &'static str,
    pub stderr: String,
}

impl GitError {
    /// Signature verification failures are never retried and are reported
    /// differently from transport errors.
    pub fn is_verification(&self) -> bool {
        matches!(self.stage, "verify-tag" | "verify-commit")
    }
}

/// Runs `git` with the given arguments and returns its stdout.
///
/// Interactive prompts are disabled: credentials must come from the
/// environment (credential helpers, ssh-agent).
pub(crate) fn git(
    stage: &'static str,
    args: &[&str],
    cwd: Option<&Utf8Path>,
) -> Result<String, GitError> {
    trace!("git {}", args.join(" "));
    let mut command = Command::new("git");
    command.args(args);
    command.env("GIT_TERMINAL_PROMPT", "0");
    if std::env::var_os("GIT_SSH_COMMAND").is_none() {
        let ssh = std::env::var("GIT_SSH").unwrap_or_else(|_| "ssh".to_string());
        command.env("GIT_SSH_COMMAND", format!("{ssh} -o BatchMode=yes"));
    }
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = command.output().map_err(|e| GitError {
        stage,
        stderr: format!("failed to spawn git: {e}"),
    })?;
    if !output.status.success() {
        return Err(GitError {
            stage,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
