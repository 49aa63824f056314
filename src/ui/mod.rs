use anyhow::Error;
use std::io::{self, Write};
use std::path::Path;

use crate::core::ReportSection;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stderr_is_tty: bool,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(
        stderr,
        "  - see `probedesk --help` for the available probes and options"
    );
}

/// Streams one finished section, in the same shape the report uses.
pub fn print_section(out: &mut dyn Write, section: &ReportSection, color: bool) {
    let title = if color {
        format!("\x1b[1;36m=== {} ===\x1b[0m", section.title)
    } else {
        format!("=== {} ===", section.title)
    };
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", section.body);
    let _ = out.flush();
}

/// Status line for the user (clipboard, export). Suppressed by `--quiet`.
pub fn notice(cfg: &UiConfig, message: &str) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{message}");
}

/// Failure the user must see even with `--quiet`. Goes to stderr so it
/// never mixes with `--json` output.
pub fn failure(message: &str) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{message}");
}

/// Shortens paths under the home directory to `~/...` for display.
pub fn display_path(path: &Path, home_dir: &Path) -> String {
    path.strip_prefix(home_dir)
        .map(|p| format!("~/{p}", p = p.display()))
        .unwrap_or_else(|_| path.display().to_string())
}
