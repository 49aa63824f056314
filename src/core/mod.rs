mod action;
mod outcome;
mod report;

pub use action::{Action, Probe, title_case};
pub use outcome::{ProbeError, ProbeOutcome, outcome_text};
pub use report::{Report, ReportHeader, ReportSection, render_sections};
