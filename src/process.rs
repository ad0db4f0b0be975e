//! Runs the external tools the release depends on (`gh`, `python`).
use async_trait::async_trait;
use log::*;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, path::PathBuf, process::Stdio};
use tokio::process::Command;

use crate::error::{ReleaseError, Result};

/// An external command invocation.
#[derive(Debug, Clone, Default)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the child. Values never appear in logs.
    pub envs: Vec<(String, SecretString)>,
    pub current_dir: Option<PathBuf>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
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

    pub fn secret_env(
        mut self,
        key: impl Into<String>,
        value: SecretString,
    ) -> Self {
        self.envs.push((key.into(), value));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Whether the invocation is `program` with `args` exactly.
    #[cfg(test)]
    pub fn is(&self, program: &str, args: &[&str]) -> bool {
        self.program == program
            && self.args.len() == args.len()
            && self.args.iter().zip(args).all(|(a, b)| a.as_str() == *b)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.envs {
            command.env(key, value.expose_secret());
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Executes external commands. Abstracted so the workflow can be exercised
/// without the real tools installed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion with inherited stdio. A non-zero exit is
    /// [`ReleaseError::CommandFailed`].
    async fn run(&self, cmd: &Cmd) -> Result<()>;

    /// Run to completion and capture stdout.
    async fn output(&self, cmd: &Cmd) -> Result<String>;

    /// Whether `program` can be started at all.
    async fn available(&self, program: &str) -> bool;
}

/// Runs commands on the host.
#[derive(Debug, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &Cmd) -> Result<()> {
        info!("running: {cmd}");

        let status = cmd
            .command()
            .status()
            .await
            .map_err(|source| ReleaseError::CommandSpawn {
                command: cmd.to_string(),
                source,
            })?;

        if !status.success() {
            return Err(ReleaseError::CommandFailed {
                command: cmd.to_string(),
                code: status.code(),
            });
        }

        Ok(())
    }

    async fn output(&self, cmd: &Cmd) -> Result<String> {
        debug!("running: {cmd}");

        let output = cmd
            .command()
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ReleaseError::CommandSpawn {
                command: cmd.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                warn!("{cmd}: {}", stderr.trim());
            }
            return Err(ReleaseError::CommandFailed {
                command: cmd.to_string(),
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8(output.stdout)?)
    }

    async fn available(&self, program: &str) -> bool {
        let result = Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match result {
            Ok(status) => status.success(),
            Err(err) => {
                debug!("{program} is not available: {err}");
                false
            }
        }
    }
}
