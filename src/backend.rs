//! Provisioning backend adapter: drives the external `eksctl` binary and the
//! `aws` CLI for kubeconfig materialization, and keeps the state store's
//! bookkeeping entry in step with the cluster.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aws::StateStore;
use crate::cmd_builder::CmdBuilder;
use crate::event::{Action, Event};
use crate::workflow::{Finished, LineStream, ProvisioningBackend};

/// Fixed headroom added to the requested node count for the autoscaling
/// upper bound.
pub const NODE_COUNT_HEADROOM: u32 = 2;

/// Everything needed to turn an event into an eksctl invocation.
pub struct BackendPlan {
    pub region: String,
    pub zones: String,
    pub ssh_public_key: PathBuf,
    pub kubeconfig: PathBuf,
}

impl BackendPlan {
    fn create_args(&self, event: &Event) -> Result<Vec<String>> {
        let count: u32 = event
            .count
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .with_context(|| format!("node count '{}' is not a positive integer", event.count))?;
        let max = count
            .checked_add(NODE_COUNT_HEADROOM)
            .with_context(|| format!("node count '{}' is too large", event.count))?;

        Ok(vec![
            "create".into(),
            "cluster".into(),
            format!("--name={}", event.name),
            format!("--version={}", event.version),
            format!("--region={}", self.region),
            format!("--zones={}", self.zones),
            format!("--node-type={}", event.size.instance_type()),
            format!("--nodes={count}"),
            format!("--nodes-min={count}"),
            format!("--nodes-max={max}"),
            format!("--tags=owner={},CreatedBy=cumulus", event.user),
            "--ssh-access".into(),
            format!("--ssh-public-key={}", self.ssh_public_key.display()),
            format!("--kubeconfig={}", self.kubeconfig.display()),
        ])
    }

    fn destroy_args(&self, event: &Event) -> Vec<String> {
        vec![
            "delete".into(),
            "cluster".into(),
            format!("--name={}", event.name),
            format!("--region={}", self.region),
            "--wait".into(),
        ]
    }
}

/// The configuration object recorded at `<name>/config` in the state store.
#[derive(Debug, Serialize)]
struct ClusterConfig<'a> {
    name: &'a str,
    size: String,
    count: &'a str,
    version: &'a str,
    owner: &'a str,
    created_by: &'static str,
}

/// One entry of `eksctl get cluster -o json`.
#[derive(Debug, Deserialize)]
struct ClusterRecord {
    #[serde(rename = "Name")]
    name: String,
}

pub struct EksctlBackend {
    store: StateStore,
    plan: BackendPlan,
}

impl EksctlBackend {
    pub fn new(store: StateStore, plan: BackendPlan) -> Self {
        Self { store, plan }
    }

    /// Cluster identifier from the backend's structured output.
    async fn cluster_id(&self, event: &Event) -> Result<String> {
        let out = CmdBuilder::new("eksctl")
            .args([
                "get".to_string(),
                "cluster".to_string(),
                format!("--name={}", event.name),
                format!("--region={}", self.plan.region),
                "-o".to_string(),
                "json".to_string(),
            ])
            .run_capture()
            .await?;

        let records: Vec<ClusterRecord> = serde_json::from_str(&out.stdout_string())
            .context("parse eksctl cluster listing")?;

        records
            .into_iter()
            .next()
            .map(|r| r.name)
            .context("eksctl reported no cluster")
    }

    async fn write_kubeconfig(&self, cluster_id: &str, alias: &str) -> Result<()> {
        CmdBuilder::new("aws")
            .args([
                "eks".to_string(),
                "--region".to_string(),
                self.plan.region.clone(),
                "update-kubeconfig".to_string(),
                "--name".to_string(),
                cluster_id.to_string(),
                "--alias".to_string(),
                alias.to_string(),
                "--kubeconfig".to_string(),
                self.plan.kubeconfig.to_string_lossy().into_owned(),
            ])
            .run_capture()
            .await
            .context("write kube-access configuration")?;
        Ok(())
    }
}

#[async_trait]
impl ProvisioningBackend for EksctlBackend {
    async fn apply(&self, event: &Event) -> Result<LineStream> {
        let args = self.plan.create_args(event)?;
        info!(cluster = %event.name, region = %self.plan.region, "starting eksctl create");
        CmdBuilder::new("eksctl").args(args).stream_lines()
    }

    async fn destroy(&self, event: &Event) -> Result<LineStream> {
        let args = self.plan.destroy_args(event);
        info!(cluster = %event.name, region = %self.plan.region, "starting eksctl delete");
        CmdBuilder::new("eksctl").args(args).stream_lines()
    }

    async fn finish(&self, event: &Event) -> Result<Finished> {
        match event.action {
            Action::Create => {
                let cluster_id = self.cluster_id(event).await?;
                self.write_kubeconfig(&cluster_id, &event.name).await?;

                let config = ClusterConfig {
                    name: &event.name,
                    size: event.size.to_string(),
                    count: &event.count,
                    version: &event.version,
                    owner: &event.user,
                    created_by: "cumulus",
                };
                let body =
                    serde_json::to_vec_pretty(&config).context("serialize cluster config")?;
                self.store.put_config(&event.bucket, &event.name, body).await?;

                Ok(Finished::Created {
                    kubeconfig: self.plan.kubeconfig.clone(),
                })
            }
            _ => {
                let entry = self.store.remove_config(&event.bucket, &event.name).await?;
                Ok(Finished::Deleted { entry })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NodeSize;

    fn plan() -> BackendPlan {
        BackendPlan {
            region: "us-east-1".to_string(),
            zones: "us-east-1a,us-east-1b".to_string(),
            ssh_public_key: PathBuf::from("/home/op/.cumulus/.ssh/cumulus_rsa.pub"),
            kubeconfig: PathBuf::from("/home/op/.cumulus/.kube/config"),
        }
    }

    fn event() -> Event {
        Event {
            action: Action::Create,
            name: "demo".to_string(),
            size: NodeSize::Large,
            count: "20".to_string(),
            version: "1.20.8".to_string(),
            bucket: "op-cumulus-state-store-123".to_string(),
            user: "op".to_string(),
            verified: true,
        }
    }

    #[test]
    fn test_create_args_resolve_size_and_headroom() {
        let args = plan().create_args(&event()).unwrap();
        assert!(args.contains(&"--node-type=m4.2xlarge".to_string()));
        assert!(args.contains(&"--nodes=20".to_string()));
        assert!(args.contains(&"--nodes-min=20".to_string()));
        assert!(args.contains(&"--nodes-max=22".to_string()));
        assert!(args.contains(&"--version=1.20.8".to_string()));
        assert!(args.contains(&"--zones=us-east-1a,us-east-1b".to_string()));
    }

    #[test]
    fn test_create_args_tag_operator_identity() {
        let args = plan().create_args(&event()).unwrap();
        assert!(args.contains(&"--tags=owner=op,CreatedBy=cumulus".to_string()));
    }

    #[test]
    fn test_create_args_reject_bad_node_count() {
        let mut bad = event();
        bad.count = "zero".to_string();
        assert!(plan().create_args(&bad).is_err());

        bad.count = "0".to_string();
        assert!(plan().create_args(&bad).is_err());
    }

    #[test]
    fn test_create_args_reject_count_without_headroom() {
        let mut bad = event();
        bad.count = u32::MAX.to_string();
        let err = plan().create_args(&bad).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_destroy_args_name_the_cluster() {
        let mut ev = event();
        ev.action = Action::Delete;
        let args = plan().destroy_args(&ev);
        assert_eq!(args[0], "delete");
        assert!(args.contains(&"--name=demo".to_string()));
        assert!(args.contains(&"--region=us-east-1".to_string()));
    }

    #[test]
    fn test_cluster_record_parses_eksctl_output() {
        let json = r#"[{"Name":"demo","Region":"us-east-1","Owner":"op"}]"#;
        let records: Vec<ClusterRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].name, "demo");
    }
}
