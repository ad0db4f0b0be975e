//! Command execution for release-pilot.
//!
//! There is a single command, `release`, which runs the whole workflow:
//!
//! 1. **Version**: read the package version and derive the tag
//! 2. **Guard**: stop early when the tag has already been released
//! 3. **Commit**: stage and commit pending changes, push the branch
//! 4. **Tag**: recreate the annotated tag and push it
//! 5. **CI**: optionally wait for the workflow run triggered by the tag
//! 6. **Publish**: build the package and upload it
//!
//! # Dry Run Support
//!
//! With `--dry-run` the version is read and the guard consulted, then the
//! command stops before touching the repository or any remote.

/// The release workflow.
pub mod release;
