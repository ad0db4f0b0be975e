//! Git repository operations for the release workflow.
//!
//! This module wraps `git2::Repository` with the handful of operations a
//! release needs:
//!
//! - Committer identity configuration
//! - Staging and committing the working tree
//! - Pushing the release branch
//! - Annotated tag creation, deletion and publication
//! - Listing the tags a remote advertises
//!
//! # Authentication
//!
//! Network operations go through [`PushTarget`]. A [`PushTarget::Url`]
//! already carries credentials; for named remotes libgit2 asks the
//! credential callback, which tries the configured username/token pair,
//! then the SSH user name and agent, then git's credential helpers.
use git2::{
    AutotagOption, Cred, CredentialType, ErrorCode, FetchOptions,
    IndexAddOption, RemoteCallbacks,
};
use log::*;
use secrecy::ExposeSecret;
use std::{cell::Cell, path::Path};

use crate::{
    config::{CommitIdentity, GitCredentials},
    error::{ReleaseError, Result},
    remote::PushTarget,
};

/// Give up after this many credential requests for a single operation;
/// libgit2 keeps asking as long as the callback hands out credentials.
const MAX_AUTH_ATTEMPTS: usize = 3;

/// Where remote tags are fetched to while listing them.
const SCRATCH_TAG_NAMESPACE: &str = "refs/release-pilot/remote-tags/";

/// Pick a credential for one libgit2 request.
fn credential_for(
    url: &str,
    username_from_url: Option<&str>,
    allowed: CredentialType,
    credentials: Option<&GitCredentials>,
) -> std::result::Result<Cred, git2::Error> {
    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
        && let Some(creds) = credentials
    {
        return Cred::userpass_plaintext(
            &creds.username,
            creds.token.expose_secret(),
        );
    }

    // ssh asks for the user name first when the url has none
    if allowed.contains(CredentialType::USERNAME) {
        return Cred::username(username_from_url.unwrap_or("git"));
    }

    if allowed.contains(CredentialType::SSH_KEY) {
        return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
    }

    let config = git2::Config::open_default()?;
    Cred::credential_helper(&config, url, username_from_url)
}

/// Build callbacks that authenticate and surface per-ref push rejections.
///
/// # Arguments
///
/// * `credentials` - Optional username/token pair offered for plaintext
///   authentication
fn remote_callbacks<'r>(
    credentials: Option<&'r GitCredentials>,
) -> RemoteCallbacks<'r> {
    let attempts = Cell::new(0usize);
    let mut callbacks = RemoteCallbacks::new();

    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts.set(attempts.get() + 1);
        if attempts.get() > MAX_AUTH_ATTEMPTS {
            return Err(git2::Error::from_str(&format!(
                "authentication failed for {url}"
            )));
        }

        credential_for(url, username_from_url, allowed, credentials)
    });

    callbacks.push_update_reference(|refname, status| match status {
        Some(message) => Err(git2::Error::from_str(&format!(
            "remote rejected {refname}: {message}"
        ))),
        None => Ok(()),
    });

    callbacks
}

/// Release-oriented interface over a local git repository.
pub struct Repository {
    repo: git2::Repository,
}

impl Repository {
    /// Open the repository containing `path`, searching parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = git2::Repository::discover(path)?;
        Ok(Self { repo })
    }

    /// Working directory of the repository.
    pub fn workdir(&self) -> Result<&Path> {
        self.repo.workdir().ok_or_else(|| {
            ReleaseError::invalid_config("cannot release from a bare repository")
        })
    }

    /// Record the release identity in the repository's local config.
    ///
    /// Only the provided fields are written; anything missing falls back to
    /// whatever git configuration is already in effect.
    pub fn configure_identity(&self, identity: &CommitIdentity) -> Result<()> {
        if identity.name.is_none() && identity.email.is_none() {
            return Ok(());
        }

        let mut config = self
            .repo
            .config()?
            .open_level(git2::ConfigLevel::Local)?;

        if let Some(name) = &identity.name {
            debug!("setting user.name to {name}");
            config.set_str("user.name", name)?;
        }

        if let Some(email) = &identity.email {
            debug!("setting user.email to {email}");
            config.set_str("user.email", email)?;
        }

        Ok(())
    }

    /// URL of the named remote, if it has one.
    pub fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        let remote = self.repo.find_remote(remote)?;
        Ok(remote.url().map(String::from))
    }

    /// Stage every new, modified and deleted file, like `git add -A`.
    pub fn add_all(&self) -> Result<()> {
        debug!("adding changed files to index");
        let mut index = self.repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        Ok(())
    }

    /// Commit the staged tree on HEAD.
    ///
    /// Returns the new commit id, or `None` when the staged tree is
    /// identical to HEAD's and there is nothing to commit.
    pub fn commit(&self, msg: &str) -> Result<Option<String>> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(err)
                if matches!(
                    err.code(),
                    ErrorCode::UnbornBranch | ErrorCode::NotFound
                ) =>
            {
                None
            }
            Err(err) => return Err(err.into()),
        };

        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_id,
            None => tree.is_empty(),
        };

        if unchanged {
            return Ok(None);
        }

        debug!("committing changes with msg: {msg}");
        let signature = self.repo.signature()?;
        let parents = parent.iter().collect::<Vec<_>>();
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            msg,
            &tree,
            &parents,
        )?;

        Ok(Some(oid.to_string()))
    }

    /// Commit id HEAD points at.
    #[cfg(test)]
    pub fn head_commit(&self) -> Result<String> {
        let commit = self.repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Push HEAD to `branch` on the target.
    pub fn push_branch(
        &self,
        target: &PushTarget,
        branch: &str,
        credentials: Option<&GitCredentials>,
    ) -> Result<()> {
        info!("pushing HEAD to {} {branch}", target.describe());
        let ref_spec = format!("HEAD:refs/heads/{branch}");
        self.push(target, &[ref_spec], credentials)
    }

    /// Whether a local tag called `name` exists.
    pub fn has_local_tag(&self, name: &str) -> bool {
        self.repo
            .find_reference(&format!("refs/tags/{name}"))
            .is_ok()
    }

    pub fn delete_local_tag(&self, name: &str) -> Result<()> {
        info!("deleting local tag {name}");
        self.repo.tag_delete(name)?;
        Ok(())
    }

    /// Create an annotated tag on HEAD using the configured identity as
    /// tagger.
    ///
    /// # Errors
    ///
    /// Fails if a tag with the same name already exists or no committer
    /// identity is configured.
    pub fn create_annotated_tag(
        &self,
        name: &str,
        message: &str,
    ) -> Result<String> {
        let head = self.repo.head()?.peel_to_commit()?;
        let tagger = self.repo.signature()?;

        info!("creating tag {name} on {}", head.id());
        let oid =
            self.repo
                .tag(name, head.as_object(), &tagger, message, false)?;

        Ok(oid.to_string())
    }

    pub fn push_tag(
        &self,
        target: &PushTarget,
        name: &str,
        credentials: Option<&GitCredentials>,
    ) -> Result<()> {
        info!("pushing tag {name} to {}", target.describe());
        let ref_spec = format!("refs/tags/{name}:refs/tags/{name}");
        self.push(target, &[ref_spec], credentials)
    }

    pub fn delete_remote_tag(
        &self,
        target: &PushTarget,
        name: &str,
        credentials: Option<&GitCredentials>,
    ) -> Result<()> {
        info!("deleting tag {name} from {}", target.describe());
        let ref_spec = format!(":refs/tags/{name}");
        self.push(target, &[ref_spec], credentials)
    }

    /// Tag names advertised by the target, like `git ls-remote --tags`.
    ///
    /// The tags are fetched into a scratch namespace, read back and removed
    /// again, so local tags are left alone.
    pub fn list_remote_tags(
        &self,
        target: &PushTarget,
        credentials: Option<&GitCredentials>,
    ) -> Result<Vec<String>> {
        let mut remote = self.find_target(target)?;

        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(remote_callbacks(credentials));
        fetch_opts.download_tags(AutotagOption::None);
        fetch_opts.update_fetchhead(false);

        self.clear_scratch_tags()?;
        let ref_spec = format!("+refs/tags/*:{SCRATCH_TAG_NAMESPACE}*");
        let fetched = remote.fetch(&[ref_spec], Some(&mut fetch_opts), None);

        let tags = self.scratch_tags();
        self.clear_scratch_tags()?;
        fetched?;

        let mut tags = tags?;
        tags.sort();
        debug!("remote {} has {} tags", target.describe(), tags.len());

        Ok(tags)
    }

    /// Commit a tag ultimately points at.
    pub fn tag_target(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_reference(&format!("refs/tags/{name}")) {
            Ok(reference) => {
                let commit = reference.peel_to_commit()?;
                Ok(Some(commit.id().to_string()))
            }
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether `name` is an annotated (as opposed to lightweight) tag.
    #[cfg(test)]
    pub fn is_annotated_tag(&self, name: &str) -> Result<bool> {
        let reference = self.repo.find_reference(&format!("refs/tags/{name}"))?;
        let target = reference.target().ok_or_else(|| {
            ReleaseError::invalid_config(format!("tag {name} is symbolic"))
        })?;
        Ok(self.repo.find_tag(target).is_ok())
    }

    /// Names of all local tags.
    #[cfg(test)]
    pub fn local_tags(&self) -> Result<Vec<String>> {
        let names = self.repo.tag_names(None)?;
        Ok(names.iter().flatten().map(String::from).collect())
    }

    fn scratch_tags(&self) -> Result<Vec<String>> {
        let glob = format!("{SCRATCH_TAG_NAMESPACE}*");
        let mut names = vec![];
        for reference in self.repo.references_glob(&glob)? {
            let reference = reference?;
            if let Some(name) = reference
                .name()
                .and_then(|n| n.strip_prefix(SCRATCH_TAG_NAMESPACE))
            {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn clear_scratch_tags(&self) -> Result<()> {
        for name in self.scratch_tags()? {
            let refname = format!("{SCRATCH_TAG_NAMESPACE}{name}");
            self.repo.find_reference(&refname)?.delete()?;
        }
        Ok(())
    }

    fn find_target(&self, target: &PushTarget) -> Result<git2::Remote<'_>> {
        let remote = match target {
            PushTarget::Named(name) => self.repo.find_remote(name)?,
            PushTarget::Url(url) => {
                self.repo.remote_anonymous(url.expose_secret())?
            }
        };
        Ok(remote)
    }

    fn push(
        &self,
        target: &PushTarget,
        ref_specs: &[String],
        credentials: Option<&GitCredentials>,
    ) -> Result<()> {
        let mut remote = self.find_target(target)?;
        let mut push_opts = git2::PushOptions::new();
        push_opts.remote_callbacks(remote_callbacks(credentials));
        remote.push(ref_specs, Some(&mut push_opts))?;
        Ok(())
    }
}
