//! Release command: commit, tag, wait for CI and publish.
use log::*;
use std::fmt;

use crate::{
    ci::CiWatcher,
    cli,
    config::{GitCredentials, ReleaseConfig, RepoSlug},
    error::Result,
    forge::{github::Github, traits::ReleaseLookup},
    guard,
    manifest::{self, Tag},
    process::{CommandRunner, SystemRunner},
    publish::Publisher,
    remote::PushTarget,
    repo::Repository,
};

/// How a release run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released(Tag),
    /// The tag was already released; nothing was changed.
    AlreadyReleased(Tag),
    /// Dry run stopped before any mutation.
    DryRun(Tag),
}

impl fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Released(tag) => write!(f, "released {tag}"),
            Self::AlreadyReleased(tag) => {
                write!(f, "{tag} is already released: nothing to do")
            }
            Self::DryRun(tag) => write!(f, "dry run: would release {tag}"),
        }
    }
}

/// Execute the release command against the host environment.
pub async fn execute(args: &cli::Args) -> Result<ReleaseOutcome> {
    let config = ReleaseConfig::from_args(args)?;
    let repo = Repository::open(&config.repo_path)?;

    let remote_url = repo.remote_url(&config.remote)?;
    let slug = resolve_slug(&config, remote_url.as_deref());
    let github = github_lookup(&config, slug.as_ref())?;

    let pipeline = Pipeline {
        config: &config,
        repo: &repo,
        slug: slug.as_ref(),
        lookup: github.as_ref().map(|g| g as &dyn ReleaseLookup),
        runner: &SystemRunner,
    };

    pipeline.run().await
}

/// Explicit repository wins; otherwise derive it from the remote URL.
fn resolve_slug(
    config: &ReleaseConfig,
    remote_url: Option<&str>,
) -> Option<RepoSlug> {
    if let Some(slug) = &config.github.repository {
        return Some(slug.clone());
    }

    let url = remote_url?;
    match RepoSlug::from_remote_url(url) {
        Ok(slug) => {
            debug!("derived repository {slug} from remote url");
            Some(slug)
        }
        Err(err) => {
            debug!("unable to derive repository from remote url: {err}");
            None
        }
    }
}

fn github_lookup(
    config: &ReleaseConfig,
    slug: Option<&RepoSlug>,
) -> Result<Option<Github>> {
    let (Some(token), Some(slug)) = (&config.github.token, slug) else {
        info!("no github token or repository: checking remote tags instead");
        return Ok(None);
    };

    let github =
        Github::new(slug.clone(), token.clone(), &config.github.api_url)?;
    Ok(Some(github))
}

/// Everything the workflow operates on.
struct Pipeline<'a> {
    config: &'a ReleaseConfig,
    repo: &'a Repository,
    slug: Option<&'a RepoSlug>,
    lookup: Option<&'a dyn ReleaseLookup>,
    runner: &'a dyn CommandRunner,
}

impl Pipeline<'_> {
    async fn run(&self) -> Result<ReleaseOutcome> {
        let manifest_path = self.config.manifest_path();
        let version = manifest::read_version_file(&manifest_path)?;
        let tag = Tag::from_version(&version);
        info!("preparing release {tag} of version {}", tag.version());

        let credentials = self.config.github.credentials();
        let remote_url = self.repo.remote_url(&self.config.remote)?;
        let target = PushTarget::resolve(
            &self.config.remote,
            remote_url.as_deref(),
            credentials.as_ref(),
        );

        if guard::release_exists(
            &tag,
            self.lookup,
            self.repo,
            &target,
            credentials.as_ref(),
        )
        .await?
        {
            return Ok(ReleaseOutcome::AlreadyReleased(tag));
        }

        if self.config.dry_run {
            info!(
                "dry run: would commit, push {} and tag {tag}",
                self.config.branch
            );
            return Ok(ReleaseOutcome::DryRun(tag));
        }

        self.commit_and_push(&tag, &target, credentials.as_ref())?;
        self.recreate_tag(&tag, &target, credentials.as_ref())?;

        if self.config.ci.enabled {
            CiWatcher::new(
                self.runner,
                &self.config.ci,
                self.slug,
                self.repo.workdir()?,
            )
            .wait(tag.name())
            .await;
        }

        if self.config.publish.enabled {
            Publisher::new(
                self.runner,
                &self.config.publish,
                self.repo.workdir()?,
            )
            .publish()
            .await?;
        }

        Ok(ReleaseOutcome::Released(tag))
    }

    fn commit_and_push(
        &self,
        tag: &Tag,
        target: &PushTarget,
        credentials: Option<&GitCredentials>,
    ) -> Result<()> {
        self.repo.configure_identity(&self.config.identity)?;
        self.repo.add_all()?;

        let message =
            commit_message(tag, self.config.message_suffix.as_deref());
        match self.repo.commit(&message)? {
            Some(id) => info!("created release commit {id}"),
            None => info!("nothing to commit, working tree clean"),
        }

        self.repo
            .push_branch(target, &self.config.branch, credentials)
    }

    fn recreate_tag(
        &self,
        tag: &Tag,
        target: &PushTarget,
        credentials: Option<&GitCredentials>,
    ) -> Result<()> {
        if self.repo.has_local_tag(tag.name()) {
            self.repo.delete_local_tag(tag.name())?;

            if let Err(err) =
                self.repo.delete_remote_tag(target, tag.name(), credentials)
            {
                warn!("unable to delete remote tag {tag}: {err}");
            }
        }

        self.repo
            .create_annotated_tag(tag.name(), &format!("Release {tag}"))?;
        if let Some(commit) = self.repo.tag_target(tag.name())? {
            debug!("tag {tag} points at {commit}");
        }

        self.repo.push_tag(target, tag.name(), credentials)
    }
}

fn commit_message(tag: &Tag, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("Release {tag} {suffix}"),
        None => format!("Release {tag}"),
    }
}
