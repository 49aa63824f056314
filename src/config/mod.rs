use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::export::ReportFormat;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub shell: ShellConfig,
    pub report: ReportConfig,
    pub clipboard: ClipboardConfig,
    pub collect: CollectConfig,
    pub ui: UiConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShellConfig {
    pub program: String,
    /// 0 waits for probes indefinitely.
    pub timeout_secs: u64,
}

impl ShellConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub default_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClipboardConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectConfig {
    pub trace_samples: Vec<String>,
    pub trace_max_hops: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            shell: ShellConfig {
                program: "powershell".to_string(),
                timeout_secs: 0,
            },
            report: ReportConfig {
                default_format: "html".to_string(),
                output_dir: None,
            },
            clipboard: ClipboardConfig { enabled: true },
            collect: CollectConfig {
                trace_samples: vec!["localhost".to_string(), "8.8.8.8".to_string()],
                trace_max_hops: 10,
            },
            ui: UiConfig { color: true },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    shell: Option<RawShellConfig>,
    report: Option<RawReportConfig>,
    clipboard: Option<RawClipboardConfig>,
    collect: Option<RawCollectConfig>,
    ui: Option<RawUiConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawShellConfig {
    program: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReportConfig {
    default_format: Option<String>,
    output_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClipboardConfig {
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCollectConfig {
    trace_samples: Option<Vec<String>>,
    trace_max_hops: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/probedesk/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(shell) = raw.shell {
        if let Some(program) = shell.program {
            cfg.shell.program = program;
        }
        if let Some(timeout_secs) = shell.timeout_secs {
            cfg.shell.timeout_secs = timeout_secs;
        }
    }

    if let Some(report) = raw.report {
        if let Some(default_format) = report.default_format {
            cfg.report.default_format = default_format;
        }
        if let Some(output_dir) = report.output_dir {
            cfg.report.output_dir = Some(output_dir);
        }
    }

    if let Some(clipboard) = raw.clipboard {
        if let Some(enabled) = clipboard.enabled {
            cfg.clipboard.enabled = enabled;
        }
    }

    if let Some(collect) = raw.collect {
        if let Some(trace_samples) = collect.trace_samples {
            cfg.collect.trace_samples = trace_samples;
        }
        if let Some(trace_max_hops) = collect.trace_max_hops {
            cfg.collect.trace_max_hops = trace_max_hops;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
    }
}

fn apply_env_overrides<F>(cfg: &mut EffectiveConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = var("PROBEDESK_SHELL_PROGRAM") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.shell.program = v.to_string();
        }
    }
    if let Some(v) = var("PROBEDESK_SHELL_TIMEOUT_SECS") {
        cfg.shell.timeout_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "PROBEDESK_SHELL_TIMEOUT_SECS")?;
    }
    if let Some(v) = var("PROBEDESK_REPORT_DEFAULT_FORMAT") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.report.default_format = v.to_string();
        }
    }
    if let Some(v) = var("PROBEDESK_REPORT_OUTPUT_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.report.output_dir = Some(v.to_string());
        }
    }
    if let Some(v) = var("PROBEDESK_CLIPBOARD_ENABLED") {
        cfg.clipboard.enabled = parse_bool(&v).with_context(|| "PROBEDESK_CLIPBOARD_ENABLED")?;
    }
    if let Some(v) = var("PROBEDESK_COLLECT_TRACE_SAMPLES") {
        let parts: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        if !parts.is_empty() {
            cfg.collect.trace_samples = parts;
        }
    }
    if let Some(v) = var("PROBEDESK_COLLECT_TRACE_MAX_HOPS") {
        cfg.collect.trace_max_hops = v
            .trim()
            .parse::<u32>()
            .with_context(|| "PROBEDESK_COLLECT_TRACE_MAX_HOPS")?;
    }
    if let Some(v) = var("PROBEDESK_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "PROBEDESK_UI_COLOR")?;
    }

    Ok(())
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    cfg.report
        .default_format
        .parse::<ReportFormat>()
        .context("report.default_format")?;
    if cfg.collect.trace_max_hops == 0 {
        anyhow::bail!("collect.trace_max_hops must be greater than 0");
    }
    if cfg.shell.program.trim().is_empty() {
        anyhow::bail!("shell.program must not be empty");
    }
    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
