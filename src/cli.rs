//! Flag-based input acquisition.
//!
//! Parses `cumulus create` / `cumulus delete` plus typed flags into an
//! [`Event`]. With no subcommand at all the tool drops into interactive
//! mode instead (handled in `main`).

use clap::{Args, Parser, Subcommand};

use crate::error::Result;
use crate::event::{
    validate_cluster_name, Action, Event, NodeSize, DEFAULT_K8S_VERSION, DEFAULT_NODE_COUNT,
};

pub const USAGE_FORMS: &str = "usage:\n  cumulus create [--name STR] [--size small|medium|large] [--nodes N] [--version STR] [--yes]\n  cumulus delete --name STR [--yes]";

#[derive(Debug, Parser)]
#[command(name = "cumulus", version, about = "Single-cluster EKS provisioning")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision a new cluster
    Create(CreateArgs),
    /// Tear down an existing cluster
    Delete(DeleteArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Cluster name
    #[arg(long)]
    pub name: Option<String>,

    /// Worker node size
    #[arg(long, value_enum, default_value_t = NodeSize::Small)]
    pub size: NodeSize,

    /// Worker node count
    #[arg(long, default_value = DEFAULT_NODE_COUNT)]
    pub nodes: String,

    /// Kubernetes version
    #[arg(long, default_value = DEFAULT_K8S_VERSION)]
    pub version: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Cluster name
    #[arg(long)]
    pub name: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

/// Map parsed flags onto an event without validating the name.
///
/// A missing `--name` is a hard failure for both subcommands: the event comes
/// back with `action = Exit` and the diagnostic already printed.
pub fn event_from_args(command: Command) -> Event {
    let mut event = Event::default();

    match command {
        Command::Create(args) => {
            event.action = Action::Create;
            event.size = args.size;
            event.count = args.nodes;
            event.version = args.version;
            event.verified = args.yes;

            match args.name {
                Some(name) => event.name = name.to_lowercase(),
                None => {
                    eprintln!(" ! create events require the --name parameter");
                    event.action = Action::Exit;
                }
            }
        }
        Command::Delete(args) => {
            event.action = Action::Delete;
            event.verified = args.yes;

            match args.name {
                Some(name) => event.name = name.to_lowercase(),
                None => {
                    eprintln!(" ! delete events require the --name parameter");
                    event.action = Action::Exit;
                }
            }
        }
        Command::Version => {
            println!("cumulus version {}", env!("CARGO_PKG_VERSION"));
            event.action = Action::Exit;
        }
    }

    event
}

/// Full flag-based acquisition: map flags to an event, then apply the same
/// name validation the interactive path uses. Validation failure is fatal.
pub fn acquire(command: Command) -> Result<Event> {
    let event = event_from_args(command);

    if event.action == Action::Exit {
        return Ok(event);
    }

    validate_cluster_name(&event.name)?;

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args)
            .expect("args should parse")
            .command
            .expect("subcommand expected")
    }

    #[test]
    fn test_create_defaults() {
        let event = event_from_args(parse(&["cumulus", "create"]));
        assert_eq!(event.size, NodeSize::Small);
        assert_eq!(event.count, "2");
        assert_eq!(event.version, DEFAULT_K8S_VERSION);
        assert!(!event.verified);
        // No --name: acquisition aborts rather than guessing one.
        assert_eq!(event.action, Action::Exit);
    }

    #[test]
    fn test_create_with_all_flags() {
        let event = event_from_args(parse(&[
            "cumulus", "create", "--name", "x.io", "--size", "large", "--nodes", "20",
            "--version", "1.20.8", "--yes",
        ]));
        assert_eq!(event.action, Action::Create);
        assert_eq!(event.name, "x.io");
        assert_eq!(event.size, NodeSize::Large);
        assert_eq!(event.count, "20");
        assert_eq!(event.version, "1.20.8");
        assert!(event.verified);
    }

    #[test]
    fn test_size_aliases() {
        let event = event_from_args(parse(&[
            "cumulus", "create", "--name", "tiny", "--size", "m",
        ]));
        assert_eq!(event.size, NodeSize::Medium);
    }

    #[test]
    fn test_delete_requires_name() {
        let event = event_from_args(parse(&["cumulus", "delete"]));
        assert_eq!(event.action, Action::Exit);
    }

    #[test]
    fn test_delete_with_name() {
        let event = event_from_args(parse(&[
            "cumulus", "delete", "--name", "My-Cluster", "--yes",
        ]));
        assert_eq!(event.action, Action::Delete);
        // Names are normalized to lowercase on acquisition.
        assert_eq!(event.name, "my-cluster");
        assert!(event.verified);
    }

    #[test]
    fn test_acquire_rejects_invalid_name() {
        let result = acquire(parse(&["cumulus", "create", "--name", "9lives"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_acquire_passes_valid_name() {
        let event = acquire(parse(&["cumulus", "delete", "--name", "my-cluster"]))
            .expect("valid name");
        assert_eq!(event.action, Action::Delete);
    }
}
