use std::sync::LazyLock;

use regex::Regex;

use crate::core::{Action, ProbeError, ProbeOutcome};
use crate::probe::Invoker;

pub mod catalog;

pub use catalog::MutatingOp;

static HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.\-]+$").expect("host pattern compiles"));

/// Ordered bindings of selectors to probes. Order here is the order of
/// execution and of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    actions: Vec<Action>,
}

impl Registry {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn standard() -> Self {
        Self::new(catalog::standard_actions())
    }

    /// Marks `name` as selected. Returns false for names not in the registry.
    pub fn select(&mut self, name: &str) -> bool {
        match self.actions.iter_mut().find(|a| a.name == name) {
            Some(action) => {
                action.selected = true;
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> &[Action] {
        &self.actions
    }

    pub fn selected(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| a.selected)
    }

    /// True when selective mode applies: some selector is on, or a trace
    /// request with its own target is pending.
    pub fn any_selected(&self, trace_requested: bool) -> bool {
        trace_requested || self.actions.iter().any(|a| a.selected)
    }
}

/// Refuses to run `action` unless the run carries explicit confirmation.
/// A refusal is an ordinary outcome, not an error of the tool.
pub fn gate<F>(confirmed: bool, operation: &str, action: F) -> ProbeOutcome
where
    F: FnOnce() -> ProbeOutcome,
{
    if !confirmed {
        return Err(ProbeError::ConfirmationRequired(operation.to_string()));
    }
    action()
}

/// Allow-list for anything interpolated into a command line as a host.
pub fn is_valid_host(input: &str) -> bool {
    HOST_RE.is_match(input)
}

pub fn trace_route(invoker: &Invoker<'_>, host: &str, max_hops: u32) -> ProbeOutcome {
    if !is_valid_host(host) {
        return Err(ProbeError::ValidationFailed(host.to_string()));
    }
    invoker.invoke(&catalog::trace_route_script(host, max_hops))
}

pub fn ping(invoker: &Invoker<'_>, host: &str) -> ProbeOutcome {
    if !is_valid_host(host) {
        return Err(ProbeError::ValidationFailed(host.to_string()));
    }
    invoker.invoke(&catalog::ping_script(host))
}

pub fn run_mutating(invoker: &Invoker<'_>, op: MutatingOp) -> ProbeOutcome {
    invoker.run_probe(&op.probe())
}
