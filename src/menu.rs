//! Interactive menu collaborator.
//!
//! The workflow talks to the `Menu` trait; the terminal implementation uses
//! dialoguer. Tests script the trait instead of driving a terminal.

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input, Select};

use crate::event::{Action, NodeSize};

/// A deletable cluster as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEntry {
    pub name: String,
    /// Creation timestamp, or the "not found" sentinel when metadata lookup
    /// failed.
    pub date: String,
}

/// Create-time parameters collected from the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateParams {
    pub name: String,
    pub size: NodeSize,
    pub count: String,
}

pub trait Menu {
    fn choose_action(&self) -> Result<Action>;
    fn collect_create(&self) -> Result<CreateParams>;
    /// Pick one cluster to delete; `None` means the operator backed out.
    fn choose_cluster(&self, clusters: &[ClusterEntry]) -> Result<Option<String>>;
}

pub struct TerminalMenu {
    theme: ColorfulTheme,
}

impl TerminalMenu {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalMenu {
    fn default() -> Self {
        Self::new()
    }
}

impl Menu for TerminalMenu {
    fn choose_action(&self) -> Result<Action> {
        let options = ["Create a cluster", "Delete a cluster", "Exit"];
        let selection = Select::with_theme(&self.theme)
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(0)
            .interact()?;

        Ok(match selection {
            0 => Action::Create,
            1 => Action::Delete,
            _ => Action::Exit,
        })
    }

    fn collect_create(&self) -> Result<CreateParams> {
        let name: String = Input::with_theme(&self.theme)
            .with_prompt("Cluster name")
            .interact_text()?;

        let sizes = [NodeSize::Small, NodeSize::Medium, NodeSize::Large];
        let labels: Vec<String> = sizes
            .iter()
            .map(|s| format!("{s} ({})", s.instance_type()))
            .collect();
        let size_idx = Select::with_theme(&self.theme)
            .with_prompt("Worker node size")
            .items(&labels)
            .default(0)
            .interact()?;

        let count: String = Input::with_theme(&self.theme)
            .with_prompt("Worker node count")
            .default("2".to_string())
            .validate_with(|input: &String| -> Result<(), &str> {
                match input.parse::<u32>() {
                    Ok(n) if n > 0 => Ok(()),
                    _ => Err("node count must be a positive integer"),
                }
            })
            .interact_text()?;

        Ok(CreateParams {
            name: name.to_lowercase(),
            size: sizes[size_idx],
            count,
        })
    }

    fn choose_cluster(&self, clusters: &[ClusterEntry]) -> Result<Option<String>> {
        let labels: Vec<String> = clusters
            .iter()
            .map(|c| format!("{}  (created {})", c.name, c.date))
            .collect();

        let selection = Select::with_theme(&self.theme)
            .with_prompt("Which cluster should be deleted?")
            .items(&labels)
            .default(0)
            .interact_opt()?;

        Ok(selection.map(|idx| clusters[idx].name.clone()))
    }
}
