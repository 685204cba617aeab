//! The provisioning event: one create/delete request and its parameters.

use std::fmt;

use clap::ValueEnum;

use crate::error::Error;

/// Default Kubernetes version when `--version` is not given.
pub const DEFAULT_K8S_VERSION: &str = "1.24";

/// Default worker node count when `--nodes` is not given.
pub const DEFAULT_NODE_COUNT: &str = "2";

/// What the operator asked for. `Exit` is terminal and short-circuits all
/// further processing; `Unset` reaching the dispatcher is a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Unset,
    Create,
    Delete,
    Exit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Action::Unset => "unset",
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Exit => "exit",
        };
        f.write_str(word)
    }
}

/// Worker node sizing, mapped to a concrete EC2 instance class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NodeSize {
    #[default]
    #[value(alias = "s")]
    Small,
    #[value(alias = "m")]
    Medium,
    #[value(alias = "l")]
    Large,
}

impl NodeSize {
    pub fn instance_type(self) -> &'static str {
        match self {
            NodeSize::Small => "t2.medium",
            NodeSize::Medium => "t2.xlarge",
            NodeSize::Large => "m4.2xlarge",
        }
    }
}

impl fmt::Display for NodeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            NodeSize::Small => "small",
            NodeSize::Medium => "medium",
            NodeSize::Large => "large",
        };
        f.write_str(word)
    }
}

/// The request record threaded through the workflow.
///
/// Created empty at process start, populated by exactly one input path,
/// enriched with `bucket` and `user` by bootstrap, consumed once by the
/// dispatcher, and discarded. Durable cluster state lives in the remote
/// state store, never here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub action: Action,
    pub name: String,
    pub size: NodeSize,
    pub count: String,
    pub version: String,
    pub bucket: String,
    pub user: String,
    pub verified: bool,
}

/// Check a cluster name: an ASCII letter followed by letters, digits, or
/// hyphens, matched against the whole string. Required before any backend
/// call. Pure with respect to its argument.
pub fn validate_cluster_name(name: &str) -> Result<(), Error> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphabetic()
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "cluster name '{name}' is invalid: names must start with a letter \
             and contain only letters, digits, and hyphens"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cluster_names() {
        for name in ["my-cluster", "a1", "a", "Dev-Cluster-2"] {
            assert!(validate_cluster_name(name).is_ok(), "expected valid: {name}");
        }
    }

    #[test]
    fn test_invalid_cluster_names() {
        for name in ["", "123abc", "a b", "-abc", "a_b", "x.io", "café"] {
            assert!(
                validate_cluster_name(name).is_err(),
                "expected invalid: {name}"
            );
        }
    }

    #[test]
    fn test_validation_error_names_the_cluster() {
        let err = validate_cluster_name("9lives").unwrap_err();
        assert!(err.to_string().contains("9lives"));
    }

    #[test]
    fn test_node_size_instance_types() {
        assert_eq!(NodeSize::Small.instance_type(), "t2.medium");
        assert_eq!(NodeSize::Medium.instance_type(), "t2.xlarge");
        assert_eq!(NodeSize::Large.instance_type(), "m4.2xlarge");
    }

    #[test]
    fn test_event_starts_unset() {
        let event = Event::default();
        assert_eq!(event.action, Action::Unset);
        assert!(!event.verified);
        assert!(event.name.is_empty());
    }
}
