//! Result of a command executed through a session.

use std::time::Duration;

/// Output of one executed command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// The command that was executed.
    pub command: String,

    /// Standard output, trailing whitespace removed.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Exit status, when the transport reported one.
    pub exit_status: Option<u32>,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// Failure marker found in the output, if any.
    pub failure_message: Option<String>,
}

impl CommandOutput {
    /// Whether no failure marker was seen and the command did not exit non-zero.
    pub fn is_success(&self) -> bool {
        self.failure_message.is_none() && self.exit_status.is_none_or(|s| s == 0)
    }

    /// Standard output followed by standard error, for error reports.
    pub fn combined(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr.trim_end())
        }
    }

    /// Explanation of why this output counts as a failure.
    pub(crate) fn failure_reason(&self) -> Option<String> {
        if let Some(marker) = &self.failure_message {
            return Some(format!("output contains '{marker}'"));
        }
        match self.exit_status {
            Some(s) if s != 0 => Some(format!("exit status {s}")),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(exit_status: Option<u32>, failure: Option<&str>) -> CommandOutput {
        CommandOutput {
            command: "show hostname".into(),
            stdout: "Hostname: leaf1\nFQDN:     leaf1.lab".into(),
            stderr: String::new(),
            exit_status,
            elapsed: Duration::from_millis(5),
            failure_message: failure.map(str::to_string),
        }
    }

    #[test]
    fn test_success() {
        let out = output(Some(0), None);
        assert!(out.is_success());
        assert!(out.failure_reason().is_none());
        assert_eq!(out.to_string(), "Hostname: leaf1\nFQDN:     leaf1.lab");

        assert!(output(None, None).is_success());
    }

    #[test]
    fn test_failure_reasons() {
        let out = output(Some(1), None);
        assert!(!out.is_success());
        assert_eq!(out.failure_reason().unwrap(), "exit status 1");

        let out = output(Some(0), Some("% Invalid input"));
        assert!(!out.is_success());
        assert!(out.failure_reason().unwrap().contains("% Invalid input"));
    }
}
