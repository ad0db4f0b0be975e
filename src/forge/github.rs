//! Implements release lookups for Github
use async_trait::async_trait;
use log::*;
use octocrab::Octocrab;
use reqwest::StatusCode;
use secrecy::SecretString;

use crate::{
    config::RepoSlug,
    error::{ReleaseError, Result},
    forge::traits::ReleaseLookup,
};

/// GitHub forge implementation using Octocrab for the releases API.
pub struct Github {
    slug: RepoSlug,
    instance: Octocrab,
}

impl Github {
    /// Create GitHub client with personal access token authentication and API
    /// base URL configuration.
    pub fn new(
        slug: RepoSlug,
        token: SecretString,
        api_url: &str,
    ) -> Result<Self> {
        let builder = Octocrab::builder()
            .personal_token(token)
            .base_uri(api_url)?;
        let instance = builder.build()?;

        Ok(Self { slug, instance })
    }
}

#[async_trait]
impl ReleaseLookup for Github {
    async fn release_exists(&self, tag: &str) -> Result<bool> {
        debug!("looking up release {tag} in {}", self.slug);

        let result = self
            .instance
            .repos(&self.slug.owner, &self.slug.repo)
            .releases()
            .get_by_tag(tag)
            .await;

        match result {
            Ok(release) => {
                info!(
                    "found release {} (id {}) for tag {tag}",
                    release.name.unwrap_or_default(),
                    release.id
                );
                Ok(true)
            }
            Err(octocrab::Error::GitHub { source, .. })
                if source.status_code == StatusCode::NOT_FOUND =>
            {
                debug!("no release found for tag {tag}");
                Ok(false)
            }
            Err(octocrab::Error::GitHub { source, .. }) => {
                let msg = format!(
                    "error looking up release for tag {tag}, status: {}, message: {}",
                    source.status_code, source.message
                );
                error!("{msg}");
                Err(ReleaseError::forge(msg))
            }
            Err(err) => {
                let msg = format!(
                    "encountered error looking up release for tag {tag}: {err}"
                );
                error!("{msg}");
                Err(ReleaseError::forge(msg))
            }
        }
    }
}
