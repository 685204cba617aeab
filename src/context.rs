//! Run context: resolved region plus terminal helpers shared by every step.

use anyhow::Result;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};

use crate::workflow::OperatorPrompt;

/// Explicit configuration threaded through constructors; nothing in the
/// workflow core reads the environment directly.
pub struct Context {
    region: String,
}

impl Context {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn theme(&self) -> ColorfulTheme {
        ColorfulTheme::default()
    }

    pub fn info(&self, msg: &str) {
        println!(" . {msg}");
    }

    pub fn step(&self, msg: &str) {
        println!(" + {msg}");
    }

    pub fn success(&self, msg: &str) {
        println!("{}", style(format!(" . {msg}")).green());
    }

    pub fn warn(&self, msg: &str) {
        println!("{}", style(format!(" ! {msg}")).yellow());
    }
}

impl OperatorPrompt for Context {
    /// Single yes/no gate; anything other than an explicit affirmative is a
    /// decline.
    fn confirm(&self, prompt: &str) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme())
            .with_prompt(format!(" ? {prompt}"))
            .default(false)
            .interact()?)
    }
}
