//! Interactive exchanges for device commands that prompt for input.
//!
//! `copy file:/mnt/flash/x scp://user@host/path` stops at `Password:` and
//! waits; `cli vrf MGMT` changes the prompt. An exchange is a list of
//! [`InteractiveEvent`]s, each sending one line and waiting for a pattern.

use std::time::Duration;

use regex::bytes::Regex;

/// One line to send and the pattern that ends the wait for its output.
///
/// ```rust
/// use tacbundle::channel::InteractiveEvent;
///
/// let events = vec![
///     InteractiveEvent::new("copy file:/mnt/flash/a.zip scp://u@h/tmp/", r"(?i)password:\s*$").unwrap(),
///     InteractiveEvent::new("secret", r"#\s*$").unwrap().hidden(),
/// ];
/// assert!(events[1].hidden);
/// ```
#[derive(Debug, Clone)]
pub struct InteractiveEvent {
    /// The input to send (command or response).
    pub input: String,

    /// Pattern to wait for after sending input.
    pub pattern: Regex,

    /// Whether this input should be hidden in logs (e.g., passwords).
    pub hidden: bool,

    /// How the input appears in logs, when it differs from `input`.
    pub display: Option<String>,
}

impl InteractiveEvent {
    /// Create a new interactive event.
    pub fn new(input: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            input: input.into(),
            pattern: Regex::new(pattern)?,
            hidden: false,
            display: None,
        })
    }

    /// Mark this event's input as hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Log this input as `display` instead, e.g. with a credential masked.
    ///
    /// Takes precedence over the mask of a hidden input.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// The input as it may appear in logs and transcripts.
    pub fn display_input(&self) -> &str {
        match (&self.display, self.hidden) {
            (Some(display), _) => display,
            (None, true) => "********",
            (None, false) => &self.input,
        }
    }
}

/// Result of an interactive command sequence.
#[derive(Debug, Clone)]
pub struct InteractiveResult {
    /// Results from each step in the sequence.
    pub steps: Vec<InteractiveStep>,

    /// Total time for the entire sequence.
    pub elapsed: Duration,
}

impl InteractiveResult {
    /// Create a new interactive result.
    pub fn new(steps: Vec<InteractiveStep>, elapsed: Duration) -> Self {
        Self { steps, elapsed }
    }

    /// Whether any step matched a failure marker.
    pub fn failed(&self) -> bool {
        self.steps.iter().any(|s| s.failure_message.is_some())
    }

    /// The first failed step, if any.
    pub fn first_failure(&self) -> Option<&InteractiveStep> {
        self.steps.iter().find(|s| s.failure_message.is_some())
    }

    /// Get the final output (from the last step).
    pub fn final_output(&self) -> Option<&str> {
        self.steps.last().map(|s| s.output.as_str())
    }

    /// Inputs and outputs interleaved, hidden inputs masked.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str("> ");
            out.push_str(&step.input);
            out.push('\n');
            if !step.output.is_empty() {
                out.push_str(&step.output);
                out.push('\n');
            }
        }
        out
    }
}

/// Result of a single step in an interactive sequence.
#[derive(Debug, Clone)]
pub struct InteractiveStep {
    /// The input that was sent (masked if hidden).
    pub input: String,

    /// The output received after sending input, echo and prompt removed.
    pub output: String,

    /// Time taken for this step.
    pub elapsed: Duration,

    /// Failure marker found in the output.
    pub failure_message: Option<String>,
}
