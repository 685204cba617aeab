//! Local workspace bootstrap: the `~/.cumulus` tree, SSH keypair, kube
//! config file, backend binaries, and the persisted operator identity.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use dialoguer::Input;
use serde::{Deserialize, Serialize};
use which::which;

use crate::cmd_builder::CmdBuilder;
use crate::context::Context;

const SSH_KEY_NAME: &str = "cumulus_rsa";

/// Binaries the backend adapter shells out to, with install remediation.
const REQUIRED_BINARIES: &[(&str, &str)] = &[
    ("eksctl", "https://eksctl.io/installation/"),
    ("aws", "https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html"),
];

#[derive(Serialize, Deserialize)]
struct OperatorConfig {
    uid: String,
}

#[derive(Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("home directory not found")?;
        Ok(Self::at(home.join(".cumulus")))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn kubeconfig(&self) -> PathBuf {
        self.root.join(".kube").join("config")
    }

    pub fn ssh_public_key(&self) -> PathBuf {
        self.root.join(".ssh").join(format!("{SSH_KEY_NAME}.pub"))
    }

    fn ssh_private_key(&self) -> PathBuf {
        self.root.join(".ssh").join(SSH_KEY_NAME)
    }

    fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Make the workspace usable and return the operator identity. Prompts
    /// for the identity once and persists it.
    pub async fn ensure(&self, ctx: &Context) -> Result<String> {
        ensure_backend_binaries()?;

        fs::create_dir_all(self.root.join(".ssh")).context("create workspace directories")?;
        fs::create_dir_all(self.root.join(".kube")).context("create workspace directories")?;

        self.ensure_ssh_keypair(ctx).await?;
        self.ensure_kube_config()?;
        self.ensure_operator_id(ctx)
    }

    async fn ensure_ssh_keypair(&self, ctx: &Context) -> Result<()> {
        let key = self.ssh_private_key();
        if key.exists() {
            ctx.info(&format!("Found SSH key {}", key.display()));
            return Ok(());
        }

        ctx.step(&format!("Creating SSH keypair {}", key.display()));
        CmdBuilder::new("ssh-keygen")
            .args([
                "-t".to_string(),
                "rsa".to_string(),
                "-b".to_string(),
                "4096".to_string(),
                "-N".to_string(),
                String::new(),
                "-C".to_string(),
                "cumulus".to_string(),
                "-f".to_string(),
                key.to_string_lossy().into_owned(),
            ])
            .run_capture()
            .await
            .context("generate SSH keypair")?;
        Ok(())
    }

    fn ensure_kube_config(&self) -> Result<()> {
        let path = self.kubeconfig();
        if path.exists() {
            return Ok(());
        }

        fs::write(&path, "").context("create kube config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .context("restrict kube config permissions")?;
        }

        Ok(())
    }

    fn ensure_operator_id(&self, ctx: &Context) -> Result<String> {
        if let Some(uid) = self.read_operator_id()? {
            ctx.info(&format!("Found operator ID '{uid}'"));
            return Ok(uid);
        }

        let uid: String = Input::with_theme(&ctx.theme())
            .with_prompt("Please enter an operator ID")
            .validate_with(|input: &String| -> Result<(), &str> {
                let trimmed = input.trim();
                if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                {
                    Ok(())
                } else {
                    Err("operator ID must contain only letters, digits, and hyphens")
                }
            })
            .interact_text()
            .context("read operator ID")?;

        // Lowercased: the ID becomes part of an S3 bucket name.
        let uid = uid.trim().to_lowercase();
        self.write_operator_id(&uid)?;
        Ok(uid)
    }

    fn read_operator_id(&self) -> Result<Option<String>> {
        let path = self.config_file();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let config: OperatorConfig = toml::from_str(&content)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(Some(config.uid))
    }

    fn write_operator_id(&self, uid: &str) -> Result<()> {
        let config = OperatorConfig {
            uid: uid.to_string(),
        };
        let content = toml::to_string_pretty(&config).context("serialize operator config")?;
        fs::write(self.config_file(), content).context("write operator config")?;
        Ok(())
    }
}

fn ensure_backend_binaries() -> Result<()> {
    for (bin, hint) in REQUIRED_BINARIES {
        which(bin).map_err(|_| anyhow!("{bin} not found in PATH; install it from {hint}"))?;
    }
    Ok(())
}
