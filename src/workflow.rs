//! The provisioning workflow: interactive acquisition, validation, the
//! existence guard, the confirmation gate, and backend dispatch.
//!
//! Collaborators are injected as capability traits so the state machine can
//! be exercised without a terminal, an AWS account, or an eksctl binary.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;

pub use crate::cmd_builder::LineStream;
use crate::error::{Error, Result};
use crate::event::{validate_cluster_name, Action, Event, DEFAULT_K8S_VERSION};
use crate::menu::{ClusterEntry, Menu};

/// Sentinel shown when cluster metadata lookup fails. A display value, not a
/// workflow error.
pub const NOT_FOUND: &str = "not found";

/// Read access to the cluster identifiers recorded in the state store.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    async fn list(&self, bucket: &str) -> anyhow::Result<Vec<String>>;
    /// Creation timestamp for display, or [`NOT_FOUND`].
    async fn creation_date(&self, bucket: &str, name: &str) -> String;
}

/// Result of the backend's post-execution step.
#[derive(Debug)]
pub enum Finished {
    Created { kubeconfig: PathBuf },
    Deleted { entry: String },
}

/// The provisioning backend port: builds an execution plan from the event
/// and streams its progress line by line.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    async fn apply(&self, event: &Event) -> anyhow::Result<LineStream>;
    async fn destroy(&self, event: &Event) -> anyhow::Result<LineStream>;
    /// Runs once after the stream completed cleanly: materializes local
    /// access for a create, removes the remote bookkeeping entry for a
    /// delete.
    async fn finish(&self, event: &Event) -> anyhow::Result<Finished>;
}

/// The yes/no checkpoint in front of every irreversible backend call.
pub trait OperatorPrompt: Send + Sync {
    fn confirm(&self, prompt: &str) -> anyhow::Result<bool>;
}

/// CloudFormation stack identifier eksctl derives from a cluster name.
pub fn stack_name(cluster: &str) -> String {
    format!("eksctl-{cluster}-cluster")
}

/// Operator-facing summary of what the state store currently records,
/// shown once during bootstrap. One line per cluster, or a single
/// empty-store notice.
pub async fn existing_cluster_report(
    directory: &dyn ClusterDirectory,
    bucket: &str,
) -> Result<Vec<String>> {
    let clusters = directory
        .list(bucket)
        .await
        .map_err(|e| Error::dependency("list existing clusters", e))?;

    if clusters.is_empty() {
        return Ok(vec![" . No existing clusters found".to_string()]);
    }

    let mut lines = vec![" - Existing cluster configurations:".to_string()];
    lines.extend(clusters.iter().map(|c| format!("\t <> {c}")));
    Ok(lines)
}

/// Interactive input acquisition: populate the event from the menu
/// collaborator. Produces the same shape of event as the flag path.
pub async fn acquire_interactive(
    menu: &dyn Menu,
    directory: &dyn ClusterDirectory,
    seed: Event,
) -> Result<Event> {
    let mut event = seed;

    let action = menu
        .choose_action()
        .map_err(|e| Error::dependency("read menu selection", e))?;

    match action {
        Action::Create => {
            let params = menu
                .collect_create()
                .map_err(|e| Error::dependency("collect create parameters", e))?;

            event.action = Action::Create;
            event.name = params.name;
            event.size = params.size;
            event.count = params.count;
            event.version = DEFAULT_K8S_VERSION.to_string();

            validate_cluster_name(&event.name)?;
        }
        Action::Delete => {
            let clusters = directory
                .list(&event.bucket)
                .await
                .map_err(|e| Error::dependency("list existing clusters", e))?;

            if clusters.is_empty() {
                println!(" . No existing clusters to delete");
                event.action = Action::Exit;
                return Ok(event);
            }

            let mut entries = Vec::with_capacity(clusters.len());
            for name in clusters {
                let date = directory.creation_date(&event.bucket, &name).await;
                entries.push(ClusterEntry { name, date });
            }

            let choice = menu
                .choose_cluster(&entries)
                .map_err(|e| Error::dependency("select cluster", e))?;

            match choice {
                Some(name) => {
                    event.action = Action::Delete;
                    event.name = name;
                    validate_cluster_name(&event.name)?;
                }
                None => event.action = Action::Exit,
            }
        }
        _ => event.action = Action::Exit,
    }

    Ok(event)
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The backend ran and reported success.
    Completed,
    /// The operator backed out, or the event asked to exit. No side effects.
    Aborted,
}

/// Validator/dispatcher for one provisioning event.
pub struct Workflow<'a> {
    pub directory: &'a dyn ClusterDirectory,
    pub backend: &'a dyn ProvisioningBackend,
    pub prompt: &'a dyn OperatorPrompt,
    pub region: String,
}

impl Workflow<'_> {
    /// Run one event end to end. The event is borrowed immutably: nothing
    /// past the confirmation gate can alter it.
    pub async fn run(&self, event: &Event) -> Result<Outcome> {
        match event.action {
            Action::Exit => return Ok(Outcome::Aborted),
            Action::Unset => {
                return Err(Error::Usage(
                    "no action was selected; run `cumulus create` or `cumulus delete`".into(),
                ))
            }
            Action::Create | Action::Delete => {}
        }

        validate_cluster_name(&event.name)?;

        if event.action == Action::Create && (event.count.is_empty() || event.version.is_empty()) {
            return Err(Error::Validation(
                "create events require a node count and a Kubernetes version".into(),
            ));
        }

        // Existence guard: exact match after lowercase normalization.
        let clusters = self
            .directory
            .list(&event.bucket)
            .await
            .map_err(|e| Error::dependency("list existing clusters", e))?;
        let exists = clusters.iter().any(|c| c.eq_ignore_ascii_case(&event.name));

        match event.action {
            Action::Create if exists => {
                return Err(Error::Conflict(format!(
                    "cluster {} already exists; pick a new name or delete it first",
                    event.name
                )))
            }
            Action::Delete if !exists => {
                return Err(Error::Conflict(format!("unknown cluster {}", event.name)))
            }
            _ => {}
        }

        if !event.verified {
            self.print_summary(event);
            let approved = self
                .prompt
                .confirm(&format!("{} cluster {}", event.action, event.name))
                .map_err(|e| Error::dependency("read confirmation", e))?;
            if !approved {
                return Ok(Outcome::Aborted);
            }
        }

        println!("\n Performing {} action for cluster {}\n", event.action, event.name);

        let started = match event.action {
            Action::Create => self.backend.apply(event).await,
            Action::Delete => self.backend.destroy(event).await,
            Action::Unset | Action::Exit => unreachable!("filtered above"),
        };

        let mut lines = started.map_err(|e| Error::Backend(format!("{e:#}")))?;
        while let Some(line) = lines.next().await {
            match line {
                Ok(text) => println!("{text}"),
                // Progress already printed stays printed; the backend's own
                // state may be partially applied.
                Err(e) => return Err(Error::Backend(format!("{e:#}"))),
            }
        }

        let finished = self
            .backend
            .finish(event)
            .await
            .map_err(|e| Error::Backend(format!("{e:#}")))?;

        match finished {
            Finished::Created { kubeconfig } => {
                println!("\n Configure kubectl access to cluster {} with:", event.name);
                println!("   export KUBECONFIG='{}'", kubeconfig.display());
            }
            Finished::Deleted { entry } => {
                println!(" - state entry {entry} removed from the state store");
            }
        }

        Ok(Outcome::Completed)
    }

    fn print_summary(&self, event: &Event) {
        println!("\n Cluster name: {}", event.name);
        if event.action == Action::Create {
            println!(" Node size: {} ({})", event.size, event.size.instance_type());
            println!(" Node count: {}", event.count);
            println!(" Kubernetes version: {}", event.version);
        }
        println!(" AWS region: {}", self.region);
        println!(" State bucket: s3://{}", event.bucket);
        println!(" CloudFormation stack: {}", stack_name(&event.name));
    }
}
