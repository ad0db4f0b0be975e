//! Interface to the Git forge hosting the repository.
//!
//! The release workflow only needs to know whether a release already exists
//! for a tag, so the forge surface is a single lookup trait with a GitHub
//! implementation.

/// GitHub API client implementation for GitHub.com and Enterprise.
pub mod github;

/// Common traits for forge platform abstraction.
pub mod traits;
