use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::ui::UiConfig;

mod clipboard;

pub use clipboard::{Clipboard, SystemClipboard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Html,
}

impl ReportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Html => "html",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "md" => Ok(ReportFormat::Markdown),
            "html" => Ok(ReportFormat::Html),
            other => Err(anyhow!("unsupported format: {other}")),
        }
    }
}

/// File contents for `content` in `format`. The layouts are fixed: other
/// tools consume these files.
pub fn render_export(content: &str, format: ReportFormat) -> String {
    match format {
        ReportFormat::Markdown => format!("```markdown\n{content}\n```"),
        ReportFormat::Html => {
            format!("<html><body><pre>{}</pre></body></html>", escape_html(content))
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn export_file_name(format: ReportFormat, at: OffsetDateTime) -> String {
    let stamp = at
        .format(format_description!(
            "[year]-[month]-[day]_[hour]-[minute]-[second]"
        ))
        .unwrap_or_else(|_| "unknown".to_string());
    format!("report_{stamp}.{}", format.extension())
}

/// Writes `content` to `dir/report_<timestamp>.<ext>`. The format is checked
/// before anything touches the filesystem.
pub fn export_report(content: &str, format: &str, dir: &Path) -> Result<PathBuf> {
    let format: ReportFormat = format.parse()?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
    let path = dir.join(export_file_name(format, crate::engine::now_local()));
    std::fs::write(&path, render_export(content, format))
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}

/// Side effects for a finished report: clipboard first, then the file.
/// Neither failure is fatal, and one never prevents the other.
pub struct ReportSink<'a> {
    pub clipboard: Option<&'a dyn Clipboard>,
    pub format: Option<String>,
    /// `None` exports to the user's desktop.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub copied: bool,
    pub exported: Option<PathBuf>,
}

impl ReportSink<'_> {
    pub fn deliver(&self, content: &str, ui: &UiConfig) -> Delivery {
        let mut delivery = Delivery::default();
        if content.is_empty() {
            crate::ui::notice(ui, "Nothing to copy.");
            return delivery;
        }

        if let Some(clipboard) = self.clipboard {
            match clipboard.set_text(content) {
                Ok(()) => {
                    delivery.copied = true;
                    crate::ui::notice(ui, "✅ Output copied to clipboard!");
                }
                Err(err) => {
                    crate::ui::failure(&format!("Error copying to clipboard: {err:#}"));
                }
            }
        }

        let Some(format) = self.format.as_deref() else {
            return delivery;
        };
        let result = match &self.output_dir {
            Some(dir) => export_report(content, format, dir),
            None => crate::platform::desktop_dir()
                .and_then(|dir| export_report(content, format, &dir)),
        };
        match result {
            Ok(path) => {
                crate::ui::notice(
                    ui,
                    &format!(
                        "✅ Report exported successfully as {} ({})",
                        format.trim(),
                        path.display()
                    ),
                );
                delivery.exported = Some(path);
            }
            Err(err) => crate::ui::failure(&format!("Error exporting report: {err:#}")),
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    struct FakeClipboard {
        texts: RefCell<Vec<String>>,
        broken: bool,
    }

    impl FakeClipboard {
        fn new(broken: bool) -> Self {
            Self {
                texts: RefCell::new(Vec::new()),
                broken,
            }
        }
    }

    impl Clipboard for FakeClipboard {
        fn set_text(&self, text: &str) -> Result<()> {
            if self.broken {
                return Err(anyhow!("clipboard unavailable"));
            }
            self.texts.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn quiet_ui() -> UiConfig {
        UiConfig {
            color: false,
            stderr_is_tty: false,
            quiet: true,
            verbose: false,
        }
    }

    fn make_temp_dir() -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "probedesk-export-test-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn markdown_export_wraps_text_in_fence() {
        let dir = make_temp_dir();
        let text = "=== A ===\nbody-a\n\n";
        let path = export_report(text, "md", &dir).expect("export");
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("md"));
        let written = std::fs::read_to_string(&path).expect("read");
        assert_eq!(written, format!("```markdown\n{text}\n```"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn html_export_escapes_text_inside_pre() {
        let dir = make_temp_dir();
        let text = "=== Users ===\n<admin> & \"guest\"";
        let path = export_report(text, "html", &dir).expect("export");
        let written = std::fs::read_to_string(&path).expect("read");
        assert_eq!(
            written,
            "<html><body><pre>=== Users ===\n&lt;admin&gt; &amp; &#34;guest&#34;</pre></body></html>"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_format_writes_nothing() {
        let dir = make_temp_dir();
        let err = export_report("text", "pdf", &dir).unwrap_err();
        assert_eq!(err.to_string(), "unsupported format: pdf");
        assert!(!dir.exists());
    }

    #[test]
    fn export_file_name_uses_timestamp() {
        let at = time::macros::datetime!(2025-03-04 05:06:07 UTC);
        assert_eq!(
            export_file_name(ReportFormat::Html, at),
            "report_2025-03-04_05-06-07.html"
        );
    }

    #[test]
    fn escape_html_handles_quotes() {
        assert_eq!(escape_html("it's"), "it&#39;s");
        assert_eq!(escape_html("•"), "•");
    }

    #[test]
    fn empty_report_is_neither_copied_nor_exported() {
        let dir = make_temp_dir();
        let clipboard = FakeClipboard::new(false);
        let sink = ReportSink {
            clipboard: Some(&clipboard),
            format: Some("md".to_string()),
            output_dir: Some(dir.clone()),
        };

        let delivery = sink.deliver("", &quiet_ui());

        assert_eq!(delivery, Delivery::default());
        assert!(clipboard.texts.borrow().is_empty());
        assert!(!dir.exists());
    }

    #[test]
    fn clipboard_failure_does_not_block_export() {
        let dir = make_temp_dir();
        let clipboard = FakeClipboard::new(true);
        let sink = ReportSink {
            clipboard: Some(&clipboard),
            format: Some("html".to_string()),
            output_dir: Some(dir.clone()),
        };

        let delivery = sink.deliver("=== A ===\nx\n\n", &quiet_ui());

        assert!(!delivery.copied);
        assert!(delivery.exported.as_ref().is_some_and(|p| p.exists()));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bad_format_still_copies_to_clipboard() {
        let dir = make_temp_dir();
        let clipboard = FakeClipboard::new(false);
        let sink = ReportSink {
            clipboard: Some(&clipboard),
            format: Some("pdf".to_string()),
            output_dir: Some(dir.clone()),
        };

        let delivery = sink.deliver("=== A ===\nx\n\n", &quiet_ui());

        assert!(delivery.copied);
        assert_eq!(delivery.exported, None);
        assert_eq!(clipboard.texts.borrow().as_slice(), ["=== A ===\nx\n\n"]);
        assert!(!dir.exists());
    }
}
