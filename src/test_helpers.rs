//! Common test helper functions shared across test modules.
//!
//! Provides throwaway git repositories with a configured identity and,
//! optionally, a bare `origin` remote living in its own temporary directory.
use std::{fs, path::Path};
use tempfile::TempDir;

use crate::{
    config::{
        CiConfig, CommitIdentity, GithubConfig, PublishConfig, ReleaseConfig,
        DEFAULT_BRANCH, DEFAULT_GITHUB_API_URL, DEFAULT_REMOTE,
    },
    repo::Repository,
};

pub const TEST_MANIFEST: &str =
    "[project]\nname = \"example\"\nversion = \"1.2.3\"\n";

/// Write `content` to `name` inside `dir`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A temporary working repository.
pub struct TestRepo {
    dir: TempDir,
    remote: Option<TempDir>,
}

impl TestRepo {
    /// Repository with a single commit containing a README and manifest.
    pub fn new() -> Self {
        let fixture = Self::empty();
        write_file(fixture.path(), "README.md", "# example\n");
        write_file(fixture.path(), "pyproject.toml", TEST_MANIFEST);

        let repo = fixture.repository();
        repo.add_all().unwrap();
        repo.commit("initial commit").unwrap();
        fixture
    }

    /// Initialized repository on `main` without any commits.
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head(DEFAULT_BRANCH);
        let repo = git2::Repository::init_opts(dir.path(), &opts).unwrap();

        let mut config = repo
            .config()
            .unwrap()
            .open_level(git2::ConfigLevel::Local)
            .unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();

        Self { dir, remote: None }
    }

    /// Repository with one commit and a bare `origin` remote.
    pub fn with_remote() -> Self {
        let mut fixture = Self::new();
        let remote = TempDir::new().unwrap();
        git2::Repository::init_bare(remote.path()).unwrap();

        let url = remote.path().display().to_string();
        fixture.git().remote(DEFAULT_REMOTE, &url).unwrap();
        fixture.remote = Some(remote);
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn repository(&self) -> Repository {
        Repository::open(self.path()).unwrap()
    }

    /// Raw git2 handle for assertions.
    pub fn git(&self) -> git2::Repository {
        git2::Repository::open(self.path()).unwrap()
    }

    pub fn remote_url(&self) -> String {
        self.remote
            .as_ref()
            .expect("fixture has no remote")
            .path()
            .display()
            .to_string()
    }

    pub fn remote_git(&self) -> git2::Repository {
        git2::Repository::open_bare(self.remote_url()).unwrap()
    }

    /// Release configuration pointing at this repository with every
    /// optional step disabled and no credentials.
    pub fn config(&self) -> ReleaseConfig {
        ReleaseConfig {
            repo_path: self.path().to_path_buf(),
            manifest: "pyproject.toml".into(),
            remote: DEFAULT_REMOTE.into(),
            branch: DEFAULT_BRANCH.into(),
            message_suffix: None,
            identity: CommitIdentity::default(),
            github: GithubConfig {
                repository: None,
                api_url: DEFAULT_GITHUB_API_URL.into(),
                username: None,
                token: None,
            },
            ci: CiConfig {
                enabled: false,
                attempts: 1,
                delay: std::time::Duration::ZERO,
                ..CiConfig::default()
            },
            publish: PublishConfig {
                enabled: false,
                ..PublishConfig::default()
            },
            dry_run: false,
        }
    }
}
