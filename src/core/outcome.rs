use std::fmt;

pub const EMPTY_OUTPUT_MESSAGE: &str = "No output (possibly no data found).";
pub const INVALID_TARGET_MESSAGE: &str =
    "Invalid target: only letters, digits, dots, and hyphens are allowed.";

/// Every way a probe can fail to produce output. None of these abort a run;
/// they are rendered into the report in place of the probe's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    ExecutionFailed(String),
    EmptyOutput,
    ValidationFailed(String),
    ConfirmationRequired(String),
}

impl ProbeError {
    pub const fn kind(&self) -> &'static str {
        match self {
            ProbeError::ExecutionFailed(_) => "execution_failed",
            ProbeError::EmptyOutput => "empty_output",
            ProbeError::ValidationFailed(_) => "validation_failed",
            ProbeError::ConfirmationRequired(_) => "confirmation_required",
        }
    }

    /// Execution failures are the only kind worth a diagnostic on stderr.
    pub const fn is_failure(&self) -> bool {
        matches!(self, ProbeError::ExecutionFailed(_))
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::ExecutionFailed(reason) => write!(f, "⚠️ Error executing: {reason}"),
            ProbeError::EmptyOutput => f.write_str(EMPTY_OUTPUT_MESSAGE),
            ProbeError::ValidationFailed(_) => f.write_str(INVALID_TARGET_MESSAGE),
            ProbeError::ConfirmationRequired(operation) => {
                write!(f, "{operation} requires explicit confirmation to proceed.")
            }
        }
    }
}

impl std::error::Error for ProbeError {}

pub type ProbeOutcome = Result<String, ProbeError>;

pub fn outcome_text(outcome: &ProbeOutcome) -> String {
    match outcome {
        Ok(text) => text.clone(),
        Err(err) => err.to_string(),
    }
}
