//! Waits for the CI run triggered by a release tag using the `gh` CLI.
use log::*;
use serde::Deserialize;
use std::path::Path;

use crate::{
    config::{CiConfig, RepoSlug},
    error::ReleaseError,
    process::{Cmd, CommandRunner},
};

/// Result of the CI wait step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiOutcome {
    /// The run with this id was watched until it finished.
    Watched(u64),
    /// No run was waited on.
    Skipped,
}

#[derive(Debug, Deserialize)]
struct RunSummary {
    #[serde(rename = "databaseId")]
    database_id: u64,
}

/// Resolves and watches workflow runs through the CI CLI.
///
/// Commands run inside the repository working directory so `gh` infers the
/// repository from it when no slug is known.
pub struct CiWatcher<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a CiConfig,
    slug: Option<&'a RepoSlug>,
    workdir: &'a Path,
}

impl<'a> CiWatcher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &'a CiConfig,
        slug: Option<&'a RepoSlug>,
        workdir: &'a Path,
    ) -> Self {
        Self {
            runner,
            config,
            slug,
            workdir,
        }
    }

    /// Block until the run for `tag` finishes. Problems locating or
    /// watching the run are logged and never fail the release.
    pub async fn wait(&self, tag: &str) -> CiOutcome {
        if !self.runner.available(&self.config.program).await {
            info!(
                "{} not available, skipping CI wait",
                self.config.program
            );
            return CiOutcome::Skipped;
        }

        let Some(id) = self.resolve_run(tag).await else {
            warn!("unable to find a CI run for {tag}, skipping CI wait");
            return CiOutcome::Skipped;
        };

        info!("waiting for CI run {id}");

        let watch = self
            .base_cmd()
            .args(["run", "watch"])
            .arg(id.to_string())
            .args(self.repo_args());

        match self.runner.run(&watch).await {
            Ok(()) => {}
            Err(ReleaseError::CommandFailed { code, .. }) => {
                warn!(
                    "CI run {id} watch exited with status {}",
                    code.map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".into())
                );
            }
            Err(err) => warn!("unable to watch CI run {id}: {err}"),
        }

        CiOutcome::Watched(id)
    }

    /// Run id for `tag`, retrying while the run registers, then falling
    /// back to the configured workflow or the latest run.
    async fn resolve_run(&self, tag: &str) -> Option<u64> {
        let by_tag = self.list_cmd().args(["--branch", tag]);
        let attempts = self.config.attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(id) = self.first_run(&by_tag).await {
                return Some(id);
            }

            debug!("no CI run for {tag} yet (attempt {attempt}/{attempts})");

            if attempt < attempts {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        let fallback = match &self.config.workflow {
            Some(workflow) => {
                info!("looking up latest run of workflow {workflow}");
                self.list_cmd().args(["--workflow", workflow])
            }
            None => {
                info!("looking up latest CI run");
                self.list_cmd()
            }
        };

        self.first_run(&fallback).await
    }

    async fn first_run(&self, cmd: &Cmd) -> Option<u64> {
        let output = match self.runner.output(cmd).await {
            Ok(output) => output,
            Err(err) => {
                warn!("{err}");
                return None;
            }
        };

        let trimmed = output.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str::<Vec<RunSummary>>(trimmed) {
            Ok(runs) => runs.first().map(|run| run.database_id),
            Err(err) => {
                warn!("unexpected output from {cmd}: {err}");
                None
            }
        }
    }

    fn base_cmd(&self) -> Cmd {
        Cmd::new(&self.config.program).current_dir(self.workdir)
    }

    fn list_cmd(&self) -> Cmd {
        self.base_cmd()
            .args(["run", "list", "--limit", "1", "--json", "databaseId"])
            .args(self.repo_args())
    }

    fn repo_args(&self) -> Vec<String> {
        match self.slug {
            Some(slug) => vec!["--repo".into(), slug.to_string()],
            None => vec![],
        }
    }
}
