//! Traits related to remote git forges
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;

/// Answers whether a release has already been published for a tag.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReleaseLookup: Send + Sync {
    /// `Ok(true)` when the forge has a release for `tag`, `Ok(false)` when
    /// it definitely does not.
    async fn release_exists(&self, tag: &str) -> Result<bool>;
}
