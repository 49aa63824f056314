use serde::Serialize;

/// The external work behind an action: one script for the shell interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub script: String,
    /// Set for probes that mutate the system. Holds the operation label used
    /// in the refusal message when confirmation is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

impl Probe {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            confirm: None,
        }
    }

    pub fn gated(script: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            confirm: Some(operation.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: String,
    pub selected: bool,
    pub probe: Probe,
}

impl Action {
    pub fn new(name: impl Into<String>, probe: Probe) -> Self {
        Self {
            name: name.into(),
            selected: false,
            probe,
        }
    }

    pub fn title(&self) -> String {
        title_case(&self.name)
    }
}

/// Upper-cases the first letter of every word. Anything other than a letter,
/// digit or underscore separates words, so `check-health` becomes
/// `Check-Health`. The remaining letters are left untouched.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}
