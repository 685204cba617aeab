//! cumulus: provision and tear down a single EKS cluster backed by an
//! S3 state store.

mod aws;
mod backend;
mod cli;
mod cmd_builder;
mod context;
mod error;
mod event;
mod menu;
mod workflow;
mod workspace;

use clap::error::{ContextKind, ErrorKind};
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use crate::aws::{ensure_state_bucket, resolve_region, AwsContext, StateStore};
use crate::backend::{BackendPlan, EksctlBackend};
use crate::cli::{Cli, USAGE_FORMS};
use crate::context::Context;
use crate::error::Error;
use crate::event::{Action, Event};
use crate::menu::TerminalMenu;
use crate::workflow::{acquire_interactive, Workflow};
use crate::workspace::Workspace;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", style(format!(" ! {err}")).red());
            err.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<(), Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return handle_parse_error(err),
    };

    // Flag-based acquisition happens before any cloud calls so usage
    // mistakes fail fast.
    let mut event = match cli.command {
        Some(command) => cli::acquire(command)?,
        None => Event::default(),
    };
    if event.action == Action::Exit {
        return Ok(());
    }

    let ctx = Context::new(resolve_region());

    println!("\nEnsuring dependencies:");

    let workspace = Workspace::new().map_err(|e| Error::dependency("locate workspace", e))?;
    event.user = workspace
        .ensure(&ctx)
        .await
        .map_err(|e| Error::dependency("bootstrap workspace", e))?;

    let aws = AwsContext::new(ctx.region()).await;
    let account = aws
        .verify_credentials()
        .await
        .map_err(|e| Error::dependency("verify AWS credentials", e))?;
    ctx.info(&format!(
        "Valid AWS credentials have been provided for region {}",
        ctx.region()
    ));

    let store = StateStore::new(&aws);
    event.bucket = ensure_state_bucket(&ctx, &store, &event.user, &account).await?;

    for line in workflow::existing_cluster_report(&store, &event.bucket).await? {
        println!("{line}");
    }

    // No subcommand: fall back to the interactive path.
    if event.action == Action::Unset {
        let menu = TerminalMenu::new();
        event = acquire_interactive(&menu, &store, event).await?;
        if event.action == Action::Exit {
            return Ok(());
        }
    }

    let zones = aws
        .availability_zones()
        .await
        .map_err(|e| Error::dependency("discover availability zones", e))?;

    let backend = EksctlBackend::new(
        store.clone(),
        BackendPlan {
            region: ctx.region().to_string(),
            zones,
            ssh_public_key: workspace.ssh_public_key(),
            kubeconfig: workspace.kubeconfig(),
        },
    );

    let workflow = Workflow {
        directory: &store,
        backend: &backend,
        prompt: &ctx,
        region: ctx.region().to_string(),
    };

    workflow.run(&event).await?;
    Ok(())
}

fn handle_parse_error(err: clap::Error) -> Result<(), Error> {
    match err.kind() {
        // clap renders help and version itself; both exit 0.
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{err}");
            Ok(())
        }
        // An unrecognized first argument gets the two valid forms and a
        // non-error exit by convention.
        ErrorKind::InvalidSubcommand => {
            let what = err
                .get(ContextKind::InvalidSubcommand)
                .map(|v| v.to_string())
                .unwrap_or_default();
            eprintln!(" ! {what} is not a valid cumulus option");
            eprintln!("{USAGE_FORMS}");
            Ok(())
        }
        _ => Err(Error::Usage(err.to_string())),
    }
}
