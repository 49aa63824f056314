use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use time::macros::format_description;

use crate::actions::{MutatingOp, Registry};
use crate::core::{Action, ProbeOutcome, Report, ReportSection, outcome_text};
use crate::probe::{CommandRunner, Invoker};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub remote: Option<String>,
    pub confirmed: bool,
    pub trace_max_hops: u32,
    pub show_progress: bool,
    /// Print each section to the output stream as soon as it is collected.
    pub stream: bool,
    pub color: bool,
    pub quiet: bool,
    pub verbose: bool,
    /// Where operation logs for confirmed mutating probes go. `None` skips them.
    pub log_home: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            remote: None,
            confirmed: false,
            trace_max_hops: 10,
            show_progress: false,
            stream: true,
            color: false,
            quiet: false,
            verbose: false,
            log_home: None,
        }
    }
}

/// A trace-route request as it arrives from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRequest {
    None,
    /// `--trace` was given without a host.
    MissingHost,
    Host(String),
}

impl TraceRequest {
    pub fn is_requested(&self) -> bool {
        !matches!(self, TraceRequest::None)
    }
}

/// Work that bypasses the report entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleShot {
    Ping(String),
    Mutating(MutatingOp),
}

pub struct Engine<'a> {
    opts: EngineOptions,
    runner: &'a dyn CommandRunner,
}

impl<'a> Engine<'a> {
    pub fn new(opts: EngineOptions, runner: &'a dyn CommandRunner) -> Self {
        Self { opts, runner }
    }

    fn invoker(&self) -> Invoker<'_> {
        Invoker::new(
            self.runner,
            self.opts.remote.as_deref(),
            self.opts.confirmed,
        )
    }

    /// Selective mode: runs the selected actions in registry order, then the
    /// trace request, if any. Every selected action is attempted once no
    /// matter how earlier ones ended.
    pub fn collect_selected(
        &self,
        registry: &Registry,
        trace: &TraceRequest,
        out: &mut dyn Write,
    ) -> Report {
        let mut report = Report::default();

        for action in registry.selected() {
            let outcome = self.run_action(action);
            let section = report.push(action.title(), outcome_text(&outcome));
            self.emit(out, section);
        }

        match trace {
            TraceRequest::None => {}
            TraceRequest::MissingHost => {
                let hint = "Please specify a host or IP to trace, e.g.: probedesk --trace 8.8.8.8";
                if !self.opts.quiet {
                    if self.opts.stream {
                        let _ = writeln!(out, "{hint}");
                    } else {
                        eprintln!("{hint}");
                    }
                }
            }
            TraceRequest::Host(host) => {
                let section = self.trace_section(&mut report, host);
                self.emit(out, section);
            }
        }

        report
    }

    /// Full-collection mode: every registered action plus a trace to each
    /// sample host, under a header naming who ran it and when.
    pub fn collect_all(
        &self,
        registry: &Registry,
        trace_samples: &[String],
        generated_by: &str,
        out: &mut dyn Write,
    ) -> Report {
        if self.opts.stream && !self.opts.quiet {
            let _ = writeln!(out, "=== Collecting All Info ===");
        }

        let mut report = Report::with_header(generated_by, header_timestamp(now_local()));

        for action in registry.all() {
            let outcome = self.run_action(action);
            let section = report.push(action.title(), outcome_text(&outcome));
            self.emit(out, section);
        }

        for host in trace_samples {
            let section = self.trace_section(&mut report, host);
            self.emit(out, section);
        }

        report
    }

    pub fn run_single(&self, shot: &SingleShot) -> String {
        let outcome = match shot {
            SingleShot::Ping(host) => {
                self.timed(&format!("ping {host}"), || {
                    crate::actions::ping(&self.invoker(), host)
                })
            }
            SingleShot::Mutating(op) => {
                let probe = op.probe();
                self.run_logged(op.id(), op.operation(), &probe.script, || {
                    crate::actions::run_mutating(&self.invoker(), *op)
                })
            }
        };
        outcome_text(&outcome)
    }

    fn run_action(&self, action: &Action) -> ProbeOutcome {
        let outcome = match &action.probe.confirm {
            Some(label) => self.run_logged(&action.name, label, &action.probe.script, || {
                self.invoker().run_probe(&action.probe)
            }),
            None => self.timed(&action.name, || self.invoker().run_probe(&action.probe)),
        };
        if let Err(err) = &outcome {
            if err.is_failure() && !self.opts.quiet {
                eprintln!("Error running {}: {err}", action.name);
            }
        }
        outcome
    }

    fn trace_section<'r>(&self, report: &'r mut Report, host: &str) -> &'r ReportSection {
        let outcome = self.timed(&format!("trace {host}"), || {
            crate::actions::trace_route(&self.invoker(), host, self.opts.trace_max_hops)
        });
        report.push(format!("TraceRoute ({host})"), outcome_text(&outcome))
    }

    // Confirmed runs of mutating probes leave an operation log behind.
    fn run_logged<F>(&self, id: &str, label: &str, script: &str, f: F) -> ProbeOutcome
    where
        F: FnOnce() -> ProbeOutcome,
    {
        let started_at = OffsetDateTime::now_utc();
        let outcome = self.timed(id, f);
        let finished_at = OffsetDateTime::now_utc();

        if !self.opts.confirmed {
            return outcome;
        }
        let Some(home) = &self.opts.log_home else {
            return outcome;
        };
        let record = crate::logs::OperationRecord {
            id,
            label,
            script,
            remote: self.opts.remote.as_deref(),
            started_at,
            finished_at,
            outcome: &outcome,
        };
        match crate::logs::write_operation_log(home, &record) {
            Ok(path) => {
                if self.opts.verbose {
                    eprintln!("log: {}", crate::ui::display_path(&path, home));
                }
            }
            Err(err) => {
                if !self.opts.quiet {
                    eprintln!("warning: failed to write operation log: {err:#}");
                }
            }
        }
        outcome
    }

    fn timed<F>(&self, label: &str, f: F) -> ProbeOutcome
    where
        F: FnOnce() -> ProbeOutcome,
    {
        let pb = self.spinner(label);
        let started = Instant::now();
        let outcome = f();
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        if self.opts.verbose {
            eprintln!("{label}: {:.2?}", started.elapsed());
        }
        outcome
    }

    fn spinner(&self, label: &str) -> Option<indicatif::ProgressBar> {
        if !self.opts.show_progress {
            return None;
        }
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(format!("running {label}..."));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }

    fn emit(&self, out: &mut dyn Write, section: &ReportSection) {
        if self.opts.stream && !self.opts.quiet {
            crate::ui::print_section(out, section, self.opts.color);
        }
    }
}

/// Local wall-clock time, falling back to UTC when the offset cannot be
/// determined.
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn header_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Probe;
    use crate::probe::fake::RecordingRunner;

    fn quiet_opts() -> EngineOptions {
        EngineOptions {
            stream: false,
            quiet: true,
            ..EngineOptions::default()
        }
    }

    fn titles(report: &Report) -> Vec<&str> {
        report.sections.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn unselected_actions_are_never_invoked() {
        let runner = RecordingRunner::new();
        let engine = Engine::new(quiet_opts(), &runner);
        let mut registry = Registry::standard();
        registry.select("ipconfig");

        let report = engine.collect_selected(&registry, &TraceRequest::None, &mut Vec::new());

        assert_eq!(runner.call_count(), 1);
        assert_eq!(runner.calls_containing("ipconfig /all"), 1);
        assert_eq!(titles(&report), vec!["Ipconfig"]);
    }

    #[test]
    fn selected_actions_run_in_registry_order() {
        let runner = RecordingRunner::new();
        let engine = Engine::new(quiet_opts(), &runner);
        let mut registry = Registry::standard();
        registry.select("check-health");
        registry.select("system");
        registry.select("usb");

        let report = engine.collect_selected(&registry, &TraceRequest::None, &mut Vec::new());

        assert_eq!(titles(&report), vec!["System", "Usb", "Check-Health"]);
        let calls = runner.calls.borrow();
        assert!(calls[0].contains("systeminfo"));
        assert!(calls[2].contains("CheckHealth"));
    }

    #[test]
    fn failing_probe_does_not_stop_later_actions() {
        let runner = RecordingRunner::new()
            .fail("systeminfo", "failed to start process: powershell")
            .reply("ipconfig /all", 0, "Windows IP Configuration");
        let engine = Engine::new(quiet_opts(), &runner);
        let mut registry = Registry::standard();
        registry.select("system");
        registry.select("ipconfig");

        let report = engine.collect_selected(&registry, &TraceRequest::None, &mut Vec::new());

        assert_eq!(report.sections.len(), 2);
        assert_eq!(
            report.sections[0].body,
            "⚠️ Error executing: failed to start process: powershell"
        );
        assert_eq!(report.sections[1].body, "Windows IP Configuration");
    }

    #[test]
    fn trace_section_is_appended_last() {
        let runner = RecordingRunner::new().reply("tracert", 0, "1  <1 ms  10.0.0.1");
        let engine = Engine::new(quiet_opts(), &runner);
        let mut registry = Registry::standard();
        registry.select("users");

        let report = engine.collect_selected(
            &registry,
            &TraceRequest::Host("8.8.8.8".to_string()),
            &mut Vec::new(),
        );

        assert_eq!(titles(&report), vec!["Users", "TraceRoute (8.8.8.8)"]);
        assert_eq!(report.sections[1].body, "1  <1 ms  10.0.0.1");
    }

    #[test]
    fn invalid_trace_target_is_reported_inline_without_running() {
        let runner = RecordingRunner::new();
        let engine = Engine::new(quiet_opts(), &runner);
        let registry = Registry::standard();

        let report = engine.collect_selected(
            &registry,
            &TraceRequest::Host("host; rm -rf /".to_string()),
            &mut Vec::new(),
        );

        assert_eq!(runner.call_count(), 0);
        assert_eq!(
            report.sections[0].body,
            "Invalid target: only letters, digits, dots, and hyphens are allowed."
        );
    }

    #[test]
    fn trace_without_host_adds_no_section() {
        let runner = RecordingRunner::new();
        let opts = EngineOptions {
            stream: true,
            ..EngineOptions::default()
        };
        let engine = Engine::new(opts, &runner);
        let mut out = Vec::new();

        let report =
            engine.collect_selected(&Registry::standard(), &TraceRequest::MissingHost, &mut out);

        assert!(report.is_empty());
        assert!(String::from_utf8_lossy(&out).contains("Please specify a host or IP to trace"));
    }

    #[test]
    fn trace_hint_stays_off_the_output_stream_when_not_streaming() {
        let runner = RecordingRunner::new();
        let opts = EngineOptions {
            stream: false,
            ..EngineOptions::default()
        };
        let mut out = Vec::new();

        Engine::new(opts, &runner).collect_selected(
            &Registry::standard(),
            &TraceRequest::MissingHost,
            &mut out,
        );

        assert!(out.is_empty());
    }

    #[test]
    fn full_collection_runs_everything_once_plus_trace_samples() {
        let runner = RecordingRunner::new();
        let engine = Engine::new(quiet_opts(), &runner);
        let registry = Registry::standard();
        let samples = vec!["localhost".to_string(), "8.8.8.8".to_string()];

        let report = engine.collect_all(&registry, &samples, "tester", &mut Vec::new());

        let action_count = registry.all().len();
        assert_eq!(runner.call_count(), action_count + samples.len());
        for action in registry.all() {
            assert_eq!(
                runner.calls_containing(&action.probe.script),
                1,
                "{}",
                action.name
            );
        }
        assert_eq!(runner.calls_containing("tracert"), 2);
        assert_eq!(report.sections.len(), action_count + 2);
        assert_eq!(
            report.sections[action_count].title,
            "TraceRoute (localhost)"
        );
        assert_eq!(
            report.sections[action_count + 1].title,
            "TraceRoute (8.8.8.8)"
        );
        let header = report.header.as_ref().expect("header");
        assert_eq!(header.generated_by, "tester");
        assert!(report.render().starts_with("Report generated by: tester\nDate: "));
    }

    #[test]
    fn streamed_output_matches_report_order() {
        let runner = RecordingRunner::new();
        let opts = EngineOptions {
            stream: true,
            ..EngineOptions::default()
        };
        let engine = Engine::new(opts, &runner);
        let mut registry = Registry::standard();
        registry.select("vpn");
        registry.select("netuse");
        let mut out = Vec::new();

        engine.collect_selected(&registry, &TraceRequest::None, &mut out);

        let text = String::from_utf8_lossy(&out);
        let netuse = text.find("=== Netuse ===").expect("netuse header");
        let vpn = text.find("=== Vpn ===").expect("vpn header");
        assert!(netuse < vpn, "{text}");
    }

    #[test]
    fn gated_registry_action_is_held_back_without_confirmation() {
        let runner = RecordingRunner::new();
        let engine = Engine::new(quiet_opts(), &runner);
        let mut action = Action::new("flush", Probe::gated("ipconfig /flushdns", "Flushing DNS"));
        action.selected = true;
        let registry = Registry::new(vec![action]);

        let report = engine.collect_selected(&registry, &TraceRequest::None, &mut Vec::new());

        assert_eq!(runner.call_count(), 0);
        assert_eq!(
            report.sections[0].body,
            "Flushing DNS requires explicit confirmation to proceed."
        );
    }

    #[test]
    fn single_shot_mutating_op_respects_confirmation() {
        let runner = RecordingRunner::new().reply("ScanHealth", 0, "No component store corruption detected.");

        let refused = Engine::new(quiet_opts(), &runner)
            .run_single(&SingleShot::Mutating(MutatingOp::ScanHealth));
        assert_eq!(
            refused,
            "Scanning health requires explicit confirmation to proceed."
        );
        assert_eq!(runner.call_count(), 0);

        let confirmed = EngineOptions {
            confirmed: true,
            ..quiet_opts()
        };
        let done = Engine::new(confirmed, &runner)
            .run_single(&SingleShot::Mutating(MutatingOp::ScanHealth));
        assert_eq!(done, "No component store corruption detected.");
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn confirmed_mutating_op_writes_operation_log() {
        let home = std::env::temp_dir().join(format!(
            "probedesk-engine-log-test-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&home);
        let runner = RecordingRunner::new();
        let opts = EngineOptions {
            confirmed: true,
            log_home: Some(home.clone()),
            ..quiet_opts()
        };

        Engine::new(opts, &runner).run_single(&SingleShot::Mutating(MutatingOp::FlushDns));

        let entries: Vec<_> = std::fs::read_dir(crate::logs::logs_dir(&home))
            .expect("logs dir")
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(
            entries[0]
                .file_name()
                .to_string_lossy()
                .starts_with("flush-dns-")
        );
        let _ = std::fs::remove_dir_all(&home);
    }

    #[test]
    fn remote_target_applies_to_all_probes_including_trace() {
        let runner = RecordingRunner::new();
        let opts = EngineOptions {
            remote: Some("srv-01".to_string()),
            ..quiet_opts()
        };
        let engine = Engine::new(opts, &runner);
        let mut registry = Registry::standard();
        registry.select("system");

        engine.collect_selected(
            &registry,
            &TraceRequest::Host("8.8.8.8".to_string()),
            &mut Vec::new(),
        );

        assert_eq!(runner.call_count(), 2);
        assert_eq!(runner.calls_containing("Invoke-Command -ComputerName srv-01"), 2);
    }
}
