//! Command line arguments. Every option can also be supplied through the
//! environment variable named next to it.
use clap::Parser;
use std::path::PathBuf;

use crate::{
    config::{
        DEFAULT_BRANCH, DEFAULT_CI_ATTEMPTS, DEFAULT_CI_DELAY_SECS,
        DEFAULT_GITHUB_API_URL, DEFAULT_PYPI_USERNAME, DEFAULT_PYTHON,
        DEFAULT_REMOTE,
    },
    manifest::DEFAULT_MANIFEST,
};

/// Commit, tag, and publish a Python package release
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = ".")]
    /// Path to the git repository to release
    pub repo_path: PathBuf,

    #[arg(long, default_value = DEFAULT_MANIFEST)]
    /// Manifest file holding the package version, relative to repo-path
    pub manifest: PathBuf,

    #[arg(long, env = "REMOTE", default_value = DEFAULT_REMOTE)]
    /// Git remote to push to
    pub remote: String,

    #[arg(long, env = "BRANCH", default_value = DEFAULT_BRANCH)]
    /// Remote branch receiving the release commit
    pub branch: String,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    /// Github access token used for pushes and the release lookup
    pub github_token: Option<String>,

    #[arg(long, env = "GITHUB_USERNAME")]
    /// Github username, also used as the commit author name
    pub github_username: Option<String>,

    #[arg(long, env = "GITHUB_EMAIL")]
    /// Commit author email
    pub github_email: Option<String>,

    #[arg(long, env = "GITHUB_REPOSITORY")]
    /// Github repository as owner/repo. Derived from the remote URL when
    /// omitted
    pub github_repository: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    /// Github API base URL
    pub github_api_url: String,

    #[arg(long, env = "PYPI_TOKEN", hide_env_values = true)]
    /// Package registry upload token
    pub pypi_token: Option<String>,

    #[arg(long, env = "PYPI_USERNAME", default_value = DEFAULT_PYPI_USERNAME)]
    /// Package registry username
    pub pypi_username: String,

    #[arg(long, env = "PYPI_REPOSITORY_URL")]
    /// Upload to this registry instead of the default index
    pub pypi_repository_url: Option<String>,

    #[arg(long, env = "PYTHON", default_value = DEFAULT_PYTHON)]
    /// Python interpreter used to build and upload
    pub python: String,

    #[arg(long, env = "CI_WORKFLOW")]
    /// Workflow to watch when no run can be found for the release tag
    pub ci_workflow: Option<String>,

    #[arg(long, default_value_t = DEFAULT_CI_ATTEMPTS)]
    /// Number of times to look up the CI run for the release tag
    pub ci_attempts: u32,

    #[arg(long, default_value_t = DEFAULT_CI_DELAY_SECS)]
    /// Seconds to wait between CI run lookups
    pub ci_delay_secs: u64,

    #[arg(long, default_value_t = false)]
    /// Do not wait for the CI run triggered by the tag
    pub no_ci_wait: bool,

    #[arg(long, default_value_t = false)]
    /// Stop after pushing the tag
    pub no_publish: bool,

    #[arg(long, default_value_t = false)]
    /// Report what would happen without changing anything
    pub dry_run: bool,

    #[arg(long, default_value_t = false)]
    /// Enables debug logs
    pub debug: bool,

    #[arg(trailing_var_arg = true)]
    /// Text appended to the release commit message
    pub message: Vec<String>,
}
