use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::CommandFactory;

use super::Cli;

const PROFILE_MARKER: &str = "# probedesk completion";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InstallOutcome {
    Installed(PathBuf),
    AlreadyPresent(PathBuf),
}

pub(crate) fn script(shell: clap_complete::Shell) -> String {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "probedesk", &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

pub(crate) fn powershell_profile_path(home_dir: &Path) -> PathBuf {
    home_dir.join("Documents/PowerShell/Microsoft.PowerShell_profile.ps1")
}

/// Appends the PowerShell completion script to the user's profile, once.
pub(crate) fn install_powershell(home_dir: &Path) -> Result<InstallOutcome> {
    let path = powershell_profile_path(home_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create profile directory: {}", parent.display())
        })?;
    }

    if path.exists() {
        let existing = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read profile: {}", path.display()))?;
        if existing.contains(PROFILE_MARKER) {
            return Ok(InstallOutcome::AlreadyPresent(path));
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open profile: {}", path.display()))?;
    write!(
        file,
        "\n{PROFILE_MARKER}\n{}\n",
        script(clap_complete::Shell::PowerShell)
    )
    .with_context(|| format!("failed to write completion script: {}", path.display()))?;

    Ok(InstallOutcome::Installed(path))
}

pub(crate) fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "powershell" | "pwsh" => Ok(clap_complete::Shell::PowerShell),
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected powershell|bash|zsh|fish)"
        ))),
    }
}
