//! Resolved runtime configuration built from command line arguments and the
//! environment.
use git_url_parse::GitUrl;
use secrecy::SecretString;
use std::{fmt, path::PathBuf, time::Duration};

use crate::{
    cli::Args,
    error::{ReleaseError, Result},
};

/// Default git remote.
pub const DEFAULT_REMOTE: &str = "origin";
/// Default branch receiving the release commit.
pub const DEFAULT_BRANCH: &str = "main";
/// Default Github API base URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
/// Username for token based registry uploads.
pub const DEFAULT_PYPI_USERNAME: &str = "__token__";
/// Default python interpreter.
pub const DEFAULT_PYTHON: &str = "python3";
/// Default CLI used to observe CI runs.
pub const DEFAULT_CI_PROGRAM: &str = "gh";
/// Default number of CI run lookups before falling back.
pub const DEFAULT_CI_ATTEMPTS: u32 = 5;
/// Default delay between CI run lookups.
pub const DEFAULT_CI_DELAY_SECS: u64 = 3;
/// Build output directory, relative to the repository working directory.
pub const DEFAULT_DIST_DIR: &str = "dist";

/// Github `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Parse an `owner/repo` string such as `GITHUB_REPOSITORY`.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim().trim_end_matches(".git");

        match trimmed.split_once('/') {
            Some((owner, repo))
                if !owner.is_empty()
                    && !repo.is_empty()
                    && !repo.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(ReleaseError::invalid_config(format!(
                "expected repository as owner/repo, got: {value}"
            ))),
        }
    }

    /// Derive the slug from a git remote URL (https, ssh or scp-like).
    pub fn from_remote_url(url: &str) -> Result<Self> {
        let parsed = GitUrl::parse(url)?;

        let owner = parsed.owner.ok_or_else(|| {
            ReleaseError::invalid_config(format!(
                "unable to parse owner from remote url: {url}"
            ))
        })?;

        Ok(Self {
            owner,
            repo: parsed.name,
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Name and email recorded on the release commit and tag.
#[derive(Debug, Clone, Default)]
pub struct CommitIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Username and token pair for authenticated pushes.
#[derive(Debug, Clone)]
pub struct GitCredentials {
    pub username: String,
    pub token: SecretString,
}

/// Github connection settings.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Explicit repository; the remote URL is used when absent.
    pub repository: Option<RepoSlug>,
    pub api_url: String,
    pub username: Option<String>,
    pub token: Option<SecretString>,
}

impl GithubConfig {
    /// Credentials for pushing, present only when both username and token
    /// are configured.
    pub fn credentials(&self) -> Option<GitCredentials> {
        match (&self.username, &self.token) {
            (Some(username), Some(token)) => Some(GitCredentials {
                username: username.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }
}

/// CI wait settings.
#[derive(Debug, Clone)]
pub struct CiConfig {
    pub enabled: bool,
    pub program: String,
    pub workflow: Option<String>,
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: DEFAULT_CI_PROGRAM.into(),
            workflow: None,
            attempts: DEFAULT_CI_ATTEMPTS,
            delay: Duration::from_secs(DEFAULT_CI_DELAY_SECS),
        }
    }
}

/// Build and upload settings.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub enabled: bool,
    pub python: String,
    pub dist_dir: PathBuf,
    pub username: String,
    pub token: Option<SecretString>,
    pub repository_url: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            python: DEFAULT_PYTHON.into(),
            dist_dir: PathBuf::from(DEFAULT_DIST_DIR),
            username: DEFAULT_PYPI_USERNAME.into(),
            token: None,
            repository_url: None,
        }
    }
}

/// Everything a release run needs to know.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub repo_path: PathBuf,
    /// Manifest path relative to `repo_path` unless absolute.
    pub manifest: PathBuf,
    pub remote: String,
    pub branch: String,
    pub message_suffix: Option<String>,
    pub identity: CommitIdentity,
    pub github: GithubConfig,
    pub ci: CiConfig,
    pub publish: PublishConfig,
    pub dry_run: bool,
}

impl ReleaseConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let repository = non_empty(args.github_repository.as_deref())
            .map(|value| RepoSlug::parse(&value))
            .transpose()?;

        let message = args.message.join(" ");
        let username = non_empty(args.github_username.as_deref());

        Ok(Self {
            repo_path: args.repo_path.clone(),
            manifest: args.manifest.clone(),
            remote: args.remote.clone(),
            branch: args.branch.clone(),
            message_suffix: non_empty(Some(message.as_str())),
            identity: CommitIdentity {
                name: username.clone(),
                email: non_empty(args.github_email.as_deref()),
            },
            github: GithubConfig {
                repository,
                api_url: args.github_api_url.clone(),
                username,
                token: secret(args.github_token.as_deref()),
            },
            ci: CiConfig {
                enabled: !args.no_ci_wait,
                workflow: non_empty(args.ci_workflow.as_deref()),
                attempts: args.ci_attempts.max(1),
                delay: Duration::from_secs(args.ci_delay_secs),
                ..CiConfig::default()
            },
            publish: PublishConfig {
                enabled: !args.no_publish,
                python: args.python.clone(),
                username: non_empty(Some(args.pypi_username.as_str()))
                    .unwrap_or_else(|| DEFAULT_PYPI_USERNAME.into()),
                token: secret(args.pypi_token.as_deref()),
                repository_url: non_empty(args.pypi_repository_url.as_deref()),
                ..PublishConfig::default()
            },
            dry_run: args.dry_run,
        })
    }

    /// Manifest location resolved against the repository path.
    pub fn manifest_path(&self) -> PathBuf {
        if self.manifest.is_absolute() {
            self.manifest.clone()
        } else {
            self.repo_path.join(&self.manifest)
        }
    }
}

// Blank values are treated as unset
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn secret(value: Option<&str>) -> Option<SecretString> {
    non_empty(value).map(SecretString::from)
}
