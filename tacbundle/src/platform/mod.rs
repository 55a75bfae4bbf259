//! Device CLI definitions.
//!
//! A [`PlatformDefinition`] carries what the session layer needs to know
//! about a vendor CLI: what its prompt looks like, which output markers
//! mean a command failed, and what to send when an interactive shell opens.

mod arista;

use std::fmt;

use regex::bytes::Regex;

pub use arista::{FASTCLI_PATH, FLASH_DIR, platform as arista_eos};

/// Vendor CLI configuration.
#[derive(Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g., "arista_eos").
    pub name: String,

    /// Matches any prompt the shell can sit at once a command finishes.
    pub prompt_pattern: Regex,

    /// Matches the unprivileged prompt; the shell escalates away from it.
    pub exec_prompt_pattern: Option<Regex>,

    /// Command that leaves the unprivileged prompt.
    pub enable_command: Option<String>,

    /// Patterns that indicate command failure.
    pub failed_when_contains: Vec<String>,

    /// Commands to run when an interactive shell is opened.
    pub on_open_commands: Vec<String>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,
}

impl PlatformDefinition {
    /// Create a definition with a prompt pattern and nothing else.
    pub fn new(name: impl Into<String>, prompt_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            prompt_pattern: Regex::new(prompt_pattern)?,
            exec_prompt_pattern: None,
            enable_command: None,
            failed_when_contains: vec![],
            on_open_commands: vec![],
            terminal_width: 511,
            terminal_height: 24,
        })
    }

    /// Set the unprivileged prompt and the command that escalates from it.
    pub fn with_enable(
        mut self,
        exec_prompt_pattern: &str,
        command: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        self.exec_prompt_pattern = Some(Regex::new(exec_prompt_pattern)?);
        self.enable_command = Some(command.into());
        Ok(self)
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Return the first failure marker present in `output`.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|pattern| output.contains(pattern.as_str()))
            .map(String::as_str)
    }

    /// Whether `prompt` is the unprivileged prompt.
    pub fn is_exec_prompt(&self, prompt: &str) -> bool {
        self.exec_prompt_pattern
            .as_ref()
            .is_some_and(|p| p.is_match(prompt.trim_end().as_bytes()))
    }

    /// Strip the command echo and the trailing prompt from PTY output.
    pub fn normalize_output(&self, raw: &str, command: &str) -> String {
        let raw = raw.replace("\r\n", "\n");
        let trimmed = raw.trim_start_matches(['\r', '\n']);
        let output = trimmed
            .strip_prefix(command)
            .unwrap_or(trimmed)
            .trim_start_matches(['\r', '\n']);

        // the last line is the prompt
        match output.rfind('\n') {
            Some(pos) => output[..pos].to_string(),
            None if self.prompt_pattern.is_match(output.as_bytes()) => String::new(),
            None => output.to_string(),
        }
    }
}

impl Default for PlatformDefinition {
    fn default() -> Self {
        arista::platform()
    }
}

impl fmt::Debug for PlatformDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformDefinition")
            .field("name", &self.name)
            .field("prompt_pattern", &self.prompt_pattern.as_str())
            .field("failed_when_contains", &self.failed_when_contains)
            .field("on_open_commands", &self.on_open_commands)
            .finish()
    }
}
