use std::time::Duration;

use anyhow::Result;

use crate::core::{Probe, ProbeError, ProbeOutcome};
use crate::platform::CommandOutput;

const UTF8_PREAMBLE: &str = "[Console]::OutputEncoding = [Text.UTF8Encoding]::UTF8;";

/// Executes one interpreter script. This is the only place probes touch the
/// outside world.
pub trait CommandRunner {
    fn run(&self, script: &str) -> Result<CommandOutput>;
}

/// Runs scripts through a PowerShell-compatible interpreter.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    program: String,
    timeout: Option<Duration>,
}

impl ShellRunner {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, script: &str) -> Result<CommandOutput> {
        crate::platform::run_command(
            &self.program,
            &["-NoProfile", "-NonInteractive", "-Command", script],
            self.timeout,
        )
    }
}

/// Builds the script actually handed to the interpreter. With a remote host
/// the same command runs inside an `Invoke-Command` block on that host.
pub fn wrap_script(command: &str, remote: Option<&str>) -> String {
    match remote {
        Some(host) => format!(
            "Invoke-Command -ComputerName {host} -ScriptBlock {{ {UTF8_PREAMBLE} {command} }}"
        ),
        None => format!("{UTF8_PREAMBLE} {command}"),
    }
}

pub struct Invoker<'a> {
    runner: &'a dyn CommandRunner,
    remote: Option<String>,
    confirmed: bool,
}

impl<'a> Invoker<'a> {
    pub fn new(runner: &'a dyn CommandRunner, remote: Option<&str>, confirmed: bool) -> Self {
        Self {
            runner,
            remote: remote.map(ToOwned::to_owned),
            confirmed,
        }
    }

    /// Runs `command` and normalizes the result. Never returns a hard error:
    /// a failed invocation comes back as `ProbeError::ExecutionFailed`.
    pub fn invoke(&self, command: &str) -> ProbeOutcome {
        let script = wrap_script(command, self.remote.as_deref());
        match self.runner.run(&script) {
            Ok(output) => normalize_output(&output),
            Err(err) => Err(ProbeError::ExecutionFailed(format!("{err:#}"))),
        }
    }

    /// Runs a registered probe, holding back mutating ones unless the run was
    /// confirmed.
    pub fn run_probe(&self, probe: &Probe) -> ProbeOutcome {
        match &probe.confirm {
            Some(operation) => {
                crate::actions::gate(self.confirmed, operation, || self.invoke(&probe.script))
            }
            None => self.invoke(&probe.script),
        }
    }
}

/// Combines stdout and stderr and trims the result. Text wins over the exit
/// status: a failing command that printed something reports what it printed.
pub fn normalize_output(output: &CommandOutput) -> ProbeOutcome {
    let stdout = output.stdout.trim();
    let stderr = output.stderr.trim();
    let text = match (stdout.is_empty(), stderr.is_empty()) {
        (false, false) => format!("{stdout}\n{stderr}"),
        (false, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (true, true) => String::new(),
    };

    if !text.is_empty() {
        return Ok(text);
    }
    if output.success() {
        Err(ProbeError::EmptyOutput)
    } else {
        Err(ProbeError::ExecutionFailed(format!(
            "exit status {}",
            output.exit_code
        )))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use anyhow::{Result, anyhow};

    use super::CommandRunner;
    use crate::platform::CommandOutput;

    /// Records every script it receives. Replies are looked up by a substring
    /// of the script; anything unmatched echoes `ran: <script>`.
    #[derive(Default)]
    pub(crate) struct RecordingRunner {
        pub(crate) calls: RefCell<Vec<String>>,
        replies: HashMap<String, Reply>,
    }

    #[derive(Clone)]
    enum Reply {
        Output(CommandOutput),
        SpawnError(String),
    }

    impl RecordingRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(mut self, needle: &str, exit_code: i32, stdout: &str) -> Self {
            self.replies.insert(
                needle.to_string(),
                Reply::Output(CommandOutput {
                    exit_code,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
            );
            self
        }

        pub(crate) fn fail(mut self, needle: &str, message: &str) -> Self {
            self.replies
                .insert(needle.to_string(), Reply::SpawnError(message.to_string()));
            self
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }

        pub(crate) fn calls_containing(&self, needle: &str) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| c.contains(needle))
                .count()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, script: &str) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(script.to_string());
            let reply = self
                .replies
                .iter()
                .find(|(needle, _)| script.contains(needle.as_str()))
                .map(|(_, reply)| reply.clone());
            match reply {
                Some(Reply::Output(out)) => Ok(out),
                Some(Reply::SpawnError(msg)) => Err(anyhow!(msg)),
                None => Ok(CommandOutput {
                    exit_code: 0,
                    stdout: format!("ran: {script}"),
                    stderr: String::new(),
                }),
            }
        }
    }
}
