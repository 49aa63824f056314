use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Result, anyhow};

pub trait Clipboard {
    fn set_text(&self, text: &str) -> Result<()>;
}

/// Hands the text to the first clipboard helper found on the system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    /// `clip` reads unmarked input in the console code page.
    #[cfg_attr(not(windows), allow(dead_code))]
    Utf16LeBom,
}

#[cfg(windows)]
const CANDIDATES: &[(&str, &[&str], Encoding)] = &[("clip", &[], Encoding::Utf16LeBom)];

#[cfg(target_os = "macos")]
const CANDIDATES: &[(&str, &[&str], Encoding)] = &[("pbcopy", &[], Encoding::Utf8)];

#[cfg(all(not(windows), not(target_os = "macos")))]
const CANDIDATES: &[(&str, &[&str], Encoding)] = &[
    ("wl-copy", &[], Encoding::Utf8),
    ("xclip", &["-selection", "clipboard"], Encoding::Utf8),
    ("xsel", &["--clipboard", "--input"], Encoding::Utf8),
];

fn encode(text: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => text.as_bytes().to_vec(),
        Encoding::Utf16LeBom => {
            let mut buf = Vec::with_capacity(2 + text.len() * 2);
            buf.extend_from_slice(&[0xFF, 0xFE]);
            for unit in text.encode_utf16() {
                buf.extend_from_slice(&unit.to_le_bytes());
            }
            buf
        }
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        copy_with(CANDIDATES, text)
    }
}

type Helper<'a> = (&'a str, &'a [&'a str], Encoding);

fn copy_with(candidates: &[Helper<'_>], text: &str) -> Result<()> {
    let mut last_failure = None;
    for (program, args, encoding) in candidates {
        let mut child = match Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(_) => continue,
        };

        // stdin is closed before waiting so the helper sees EOF.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&encode(text, *encoding)),
            None => Ok(()),
        };
        let status = child.wait()?;
        written?;
        if status.success() {
            return Ok(());
        }
        last_failure = Some(format!("{program} exited with {status}"));
    }

    Err(match last_failure {
        Some(failure) => anyhow!(failure),
        None => {
            let tried: Vec<&str> = candidates.iter().map(|(p, _, _)| *p).collect();
            anyhow!("no clipboard helper available (tried: {})", tried.join(", "))
        }
    })
}
