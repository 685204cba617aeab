//! Fluent builder for running external processes on the tokio runtime.

use std::pin::Pin;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use futures::stream::{self, Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::LinesStream;

/// Progress lines from a running process, yielded as they are produced.
/// The stream terminates with an error when the process exits non-zero.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub struct CmdBuilder {
    program: String,
    args: Vec<String>,
}

impl CmdBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Run to completion with stdout/stderr captured; non-zero exit is an
    /// error carrying the process's stderr.
    pub async fn run_capture(&self) -> Result<CmdOutput> {
        let mut cmd = self.build_command();
        // Null stdin so a prompting child fails instead of hanging.
        cmd.stdin(Stdio::null());

        let output = cmd
            .output()
            .await
            .with_context(|| format!("failed to start: {}", self.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with code {:?}: {}",
                self.program,
                output.status.code(),
                stderr.trim()
            ));
        }

        Ok(CmdOutput {
            stdout: output.stdout,
        })
    }

    /// Spawn the process and return its merged stdout/stderr as a line
    /// stream. Lines arrive as the process writes them, not after it exits.
    pub fn stream_lines(&self) -> Result<LineStream> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start: {}", self.display()))?;

        let stdout = child.stdout.take().context("child stdout not captured")?;
        let stderr = child.stderr.take().context("child stderr not captured")?;
        let what = self.display();

        let lines = stream::select(
            LinesStream::new(BufReader::new(stdout).lines()),
            LinesStream::new(BufReader::new(stderr).lines()),
        )
        .map(|line| line.map(Some).map_err(anyhow::Error::from));

        // Once both pipes close, reap the child and fold its exit status
        // into the stream.
        let tail = stream::once(async move {
            let status = child
                .wait()
                .await
                .with_context(|| format!("failed to wait for: {what}"))?;
            if status.success() {
                Ok(None)
            } else {
                Err(anyhow!("{what} exited with {status}"))
            }
        });

        Ok(Box::pin(
            lines
                .chain(tail)
                .filter_map(|item| async move { item.transpose() }),
        ))
    }
}

/// Output from a captured command execution.
#[derive(Debug)]
pub struct CmdOutput {
    pub stdout: Vec<u8>,
}

impl CmdOutput {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}
