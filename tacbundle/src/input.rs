//! Operator input: passwords and yes/no confirmations.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};

/// Source of operator answers.
pub trait InputProvider: Send + Sync {
    /// Ask for a secret without echoing it.
    fn secret(&self, prompt: &str) -> Result<SecretString>;

    /// Ask a yes/no question.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Asks on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptInput;

impl InputProvider for PromptInput {
    fn secret(&self, prompt: &str) -> Result<SecretString> {
        dialoguer::Password::new()
            .with_prompt(prompt)
            .allow_empty_password(false)
            .interact()
            .map(SecretString::from)
            .map_err(|e| Error::config(format!("cannot read password: {e}")))
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| Error::config(format!("cannot read confirmation: {e}")))
    }
}

/// Fixed answers for unattended runs and tests.
#[derive(Debug, Default)]
pub struct StaticInput {
    password: Option<SecretString>,
    confirm: bool,
}

impl StaticInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every secret prompt with `password`.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Answer every confirmation with `answer`.
    pub fn with_confirm(mut self, answer: bool) -> Self {
        self.confirm = answer;
        self
    }
}

impl InputProvider for StaticInput {
    fn secret(&self, prompt: &str) -> Result<SecretString> {
        self.password
            .as_ref()
            .map(|p| SecretString::from(p.expose_secret().to_string()))
            .ok_or_else(|| Error::config(format!("no answer available for '{prompt}'")))
    }

    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(self.confirm)
    }
}
