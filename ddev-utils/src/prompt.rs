//! Interactive input, behind a trait so non-interactive runs fail fast.

use anyhow::{Context, Result};
use ddev_core::DdevError;
use std::sync::Arc;

pub trait Prompt: Send + Sync + std::fmt::Debug {
    /// Asks for one line of input. An empty answer is allowed.
    fn ask(&self, question: &str) -> Result<String>;
}

/// Reads answers from the terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&self, question: &str) -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(question)
            .allow_empty(true)
            .interact_text()
            .context("failed to read input")
    }
}

/// Refuses every question.
#[derive(Debug, Default)]
pub struct NonInteractive;

impl Prompt for NonInteractive {
    fn ask(&self, question: &str) -> Result<String> {
        Err(DdevError::AssetInvalid(format!(
            "input required ({question}) but {} is set",
            crate::env::DDEV_NONINTERACTIVE
        ))
        .into())
    }
}

/// The prompt matching the current environment.
pub fn from_env() -> Arc<dyn Prompt> {
    if crate::env::is_noninteractive() {
        Arc::new(NonInteractive)
    } else {
        Arc::new(TerminalPrompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noninteractive_fails_fast() {
        let err = NonInteractive.ask("Import path").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DdevError>(),
            Some(DdevError::AssetInvalid(_))
        ));
        assert!(err.to_string().contains("Import path"));
    }
}
