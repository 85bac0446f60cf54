use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password};

/// Source of interactive answers.
pub trait Prompter {
    fn input(&mut self, label: &str, default: Option<&str>) -> Result<String>;

    /// Hidden input, never echoed or logged.
    fn password(&mut self, label: &str) -> Result<String>;

    fn confirm(&mut self, label: &str, default: bool) -> Result<bool>;
}

/// Prompts on the controlling terminal.
pub struct TermPrompter;

impl Prompter for TermPrompter {
    fn input(&mut self, label: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(label).allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        let answer = input
            .interact_text()
            .with_context(|| format!("Failed to read '{}'", label))?;
        tracing::debug!("prompt '{}' answered", label);
        Ok(answer)
    }

    fn password(&mut self, label: &str) -> Result<String> {
        Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()
            .with_context(|| format!("Failed to read '{}'", label))
    }

    fn confirm(&mut self, label: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(label)
            .default(default)
            .interact()
            .with_context(|| format!("Failed to read '{}'", label))
    }
}
