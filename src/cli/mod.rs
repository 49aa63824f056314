use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::actions::catalog;
use crate::actions::{MutatingOp, Registry};
use crate::config::EffectiveConfig;
use crate::engine::{Engine, EngineOptions, SingleShot, TraceRequest};
use crate::export::{Clipboard, ReportSink, SystemClipboard};
use crate::probe::ShellRunner;
use crate::ui::UiConfig;

mod completion;

#[derive(Debug, Parser)]
#[command(
    name = "probedesk",
    version,
    about = "Collect Windows system and network diagnostics for support tickets and audits"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub probes: ProbeArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print a shell completion script
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

/// Probe selectors and delivery options. With no selector at all, every
/// probe runs and the report is exported.
#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// OS name and version
    #[arg(long)]
    pub system: bool,
    /// Full network adapter configuration
    #[arg(long)]
    pub ipconfig: bool,
    /// Mapped network drives
    #[arg(long)]
    pub netuse: bool,
    /// Installed products
    #[arg(long)]
    pub products: bool,
    /// Configured VPN connections
    #[arg(long)]
    pub vpn: bool,
    /// Running services
    #[arg(long)]
    pub services: bool,
    /// Local user accounts
    #[arg(long)]
    pub users: bool,
    /// External USB devices
    #[arg(long)]
    pub usb: bool,
    /// Component store health (DISM /CheckHealth)
    #[arg(long = "check-health")]
    pub check_health: bool,

    /// Trace the route to HOST
    #[arg(long, num_args = 0..=1, value_name = "HOST")]
    pub trace: Option<Option<String>>,
    /// Run every probe on this machine instead of the local one
    #[arg(long, value_name = "HOST")]
    pub remote: Option<String>,
    /// Export the report (md|html)
    #[arg(long, value_name = "FORMAT")]
    pub report: Option<String>,
    /// Directory for exported reports (default: Desktop)
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
    #[arg(long = "no-clipboard")]
    pub no_clipboard: bool,
    /// Confirm operations that change the machine
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Flush the DNS resolver cache
    #[arg(long)]
    pub flush: bool,
    /// Upgrade all packages with winget
    #[arg(long = "winget-update")]
    pub winget_update: bool,
    /// DISM /ScanHealth
    #[arg(long = "scan-health")]
    pub scan_health: bool,
    /// DISM /RestoreHealth
    #[arg(long = "restore-health")]
    pub restore_health: bool,
    /// Ping HOST
    #[arg(long, num_args = 0..=1, value_name = "HOST")]
    pub ping: Option<Option<String>>,
    /// Add completion to the PowerShell profile
    #[arg(long = "autocomplete-install")]
    pub autocomplete_install: bool,

    /// Target for --trace and --ping when not given as their value
    pub host: Option<String>,
}

fn target_host(flag: &Option<Option<String>>, positional: &Option<String>) -> Option<String> {
    let value = flag.as_ref()?.as_ref().or(positional.as_ref());
    value
        .map(|host| host.trim())
        .filter(|host| !host.is_empty())
        .map(ToOwned::to_owned)
}

impl ProbeArgs {
    fn selected_names(&self) -> Vec<&'static str> {
        [
            (self.system, catalog::SYSTEM),
            (self.ipconfig, catalog::IPCONFIG),
            (self.netuse, catalog::NETUSE),
            (self.products, catalog::PRODUCTS),
            (self.vpn, catalog::VPN),
            (self.services, catalog::SERVICES),
            (self.users, catalog::USERS),
            (self.usb, catalog::USB),
            (self.check_health, catalog::CHECK_HEALTH),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }

    fn mutating_op(&self) -> Option<MutatingOp> {
        if self.flush {
            Some(MutatingOp::FlushDns)
        } else if self.winget_update {
            Some(MutatingOp::WingetUpdate)
        } else if self.scan_health {
            Some(MutatingOp::ScanHealth)
        } else if self.restore_health {
            Some(MutatingOp::RestoreHealth)
        } else {
            None
        }
    }

    fn trace_request(&self) -> TraceRequest {
        if self.trace.is_none() {
            return TraceRequest::None;
        }
        match target_host(&self.trace, &self.host) {
            Some(host) => TraceRequest::Host(host),
            None => TraceRequest::MissingHost,
        }
    }

    /// `Some(None)` means `--ping` was given without a target.
    fn ping_request(&self) -> Option<Option<String>> {
        self.ping.as_ref()?;
        Some(target_host(&self.ping, &self.host))
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::platform::effective_home_dir()?;

    let env_config_path = std::env::var_os("PROBEDESK_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;

    let ui_cfg = UiConfig {
        color,
        stderr_is_tty,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Completion(args)) => {
            let shell = completion::parse_shell(&args.shell)?;
            write_stdout(completion::script(shell).as_bytes())?;
        }
        Some(Commands::Config(args)) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `probedesk config --show`");
            }
        }
        None => run_probes(&cli.probes, &cfg, &ui_cfg, &home_dir, cli.json)?,
    }

    Ok(())
}

fn run_probes(
    args: &ProbeArgs,
    cfg: &EffectiveConfig,
    ui_cfg: &UiConfig,
    home_dir: &Path,
    json: bool,
) -> Result<()> {
    let remote = match args.remote.as_deref().map(str::trim) {
        Some(host) if !crate::actions::is_valid_host(host) => {
            return Err(crate::exit::invalid_args(format!(
                "invalid remote target: {host:?} (only letters, digits, dots, and hyphens are allowed)"
            )));
        }
        Some(host) => Some(host.to_string()),
        None => None,
    };

    if args.autocomplete_install {
        let outcome =
            completion::install_powershell(home_dir).map_err(crate::exit::run_failed_err)?;
        let message = match outcome {
            completion::InstallOutcome::Installed(path) => format!(
                "✅ Autocomplete installed in {}. Restart PowerShell to use it.",
                crate::ui::display_path(&path, home_dir)
            ),
            completion::InstallOutcome::AlreadyPresent(path) => format!(
                "Autocomplete is already installed in {}.",
                crate::ui::display_path(&path, home_dir)
            ),
        };
        crate::ui::notice(ui_cfg, &message);
        return Ok(());
    }

    let runner = ShellRunner::new(cfg.shell.program.clone(), cfg.shell.timeout());
    let engine = Engine::new(
        EngineOptions {
            remote,
            confirmed: args.yes,
            trace_max_hops: cfg.collect.trace_max_hops,
            show_progress: ui_cfg.stderr_is_tty && !ui_cfg.quiet && !json,
            stream: !json,
            color: ui_cfg.color,
            quiet: ui_cfg.quiet,
            verbose: ui_cfg.verbose,
            log_home: Some(home_dir.to_path_buf()),
        },
        &runner,
    );

    let single = if let Some(ping) = args.ping_request() {
        match ping {
            Some(host) => Some(SingleShot::Ping(host)),
            None => {
                let hint = "Please specify a host or IP to ping, e.g.: probedesk --ping 8.8.8.8";
                if json {
                    eprintln!("{hint}");
                } else {
                    println!("{hint}");
                }
                return Ok(());
            }
        }
    } else {
        args.mutating_op().map(SingleShot::Mutating)
    };
    if let Some(shot) = single {
        let output = engine.run_single(&shot);
        if json {
            let id = match &shot {
                SingleShot::Ping(_) => "ping",
                SingleShot::Mutating(op) => op.id(),
            };
            write_json(&serde_json::json!({ "operation": id, "output": output }))?;
        } else {
            println!("{output}");
        }
        return Ok(());
    }

    let mut registry = Registry::standard();
    for name in args.selected_names() {
        registry.select(name);
    }
    let trace = args.trace_request();
    let host_consumed = matches!(args.trace, Some(None));
    if args.host.is_some() && !host_consumed && !ui_cfg.quiet {
        eprintln!("warning: HOST is only used with --trace or --ping; ignoring it");
    }

    let (report, format) = {
        let mut stdout = io::stdout().lock();
        if registry.any_selected(trace.is_requested()) {
            let report = engine.collect_selected(&registry, &trace, &mut stdout);
            (report, args.report.clone())
        } else {
            let generated_by =
                crate::platform::current_username().unwrap_or_else(|| "Unknown".to_string());
            let report = engine.collect_all(
                &registry,
                &cfg.collect.trace_samples,
                &generated_by,
                &mut stdout,
            );
            let format = args
                .report
                .clone()
                .unwrap_or_else(|| cfg.report.default_format.clone());
            (report, Some(format))
        }
    };

    if json {
        write_json(&JsonReport {
            report: &report,
            rendered: report.render(),
        })?;
    }

    let system_clipboard = SystemClipboard;
    let clipboard: Option<&dyn Clipboard> = if cfg.clipboard.enabled && !args.no_clipboard {
        Some(&system_clipboard)
    } else {
        None
    };
    let output_dir = args.output.clone().or_else(|| {
        cfg.report
            .output_dir
            .as_deref()
            .map(|dir| expand_tilde(dir, home_dir))
    });
    let sink = ReportSink {
        clipboard,
        format,
        output_dir,
    };
    let sink_ui = UiConfig {
        quiet: ui_cfg.quiet || json,
        ..ui_cfg.clone()
    };
    sink.deliver(&report.render(), &sink_ui);

    Ok(())
}

#[derive(serde::Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a crate::core::Report,
    rendered: String,
}

fn expand_tilde(path: &str, home_dir: &Path) -> PathBuf {
    if path == "~" {
        return home_dir.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir.join(rest),
        None => PathBuf::from(path),
    }
}

fn write_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut buf = serde_json::to_vec_pretty(value)?;
    buf.push(b'\n');
    write_stdout(&buf)
}

fn write_stdout(buf: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(buf).and_then(|()| stdout.flush()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}
