//! Duplicate-release guard.
//!
//! Asks the forge whether a release exists for the tag when a lookup is
//! configured, otherwise checks whether the remote already advertises the
//! tag. This is a best-effort check: nothing stops another run from pushing
//! the same tag between the check and our own push.
use log::*;

use crate::{
    config::GitCredentials,
    error::Result,
    forge::traits::ReleaseLookup,
    manifest::Tag,
    remote::PushTarget,
    repo::Repository,
};

/// Decide whether `tag` has already been released.
pub async fn release_exists(
    tag: &Tag,
    lookup: Option<&dyn ReleaseLookup>,
    repo: &Repository,
    target: &PushTarget,
    credentials: Option<&GitCredentials>,
) -> Result<bool> {
    if let Some(lookup) = lookup {
        match lookup.release_exists(tag.name()).await {
            Ok(exists) => return Ok(exists),
            Err(err) => {
                warn!(
                    "release lookup failed, falling back to remote tags: {err}"
                );
            }
        }
    }

    let tags = repo.list_remote_tags(target, credentials)?;
    let exists = tags.iter().any(|name| name == tag.name());

    if exists {
        debug!("tag {tag} found on {}", target.describe());
    }

    Ok(exists)
}
