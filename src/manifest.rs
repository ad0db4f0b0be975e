//! Reads the package version from a project manifest and derives the release
//! tag from it.
use log::*;
use regex::Regex;
use std::{fmt, fs, path::Path};

use crate::error::{ReleaseError, Result};

/// Default manifest file, relative to the repository working directory.
pub const DEFAULT_MANIFEST: &str = "pyproject.toml";

/// Prefix prepended to the version to form a tag name.
pub const TAG_PREFIX: &str = "v";

/// Matches `version = "..."` (or single quoted) at the start of a line.
const VERSION_PATTERN: &str =
    r#"(?m)^[ \t]*version[ \t]*=[ \t]*(?:"([^"\r\n]*)"|'([^'\r\n]*)')"#;

/// A release tag derived from a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    name: String,
    version: String,
}

impl Tag {
    /// Build the tag for `version`: the tag name is always
    /// [`TAG_PREFIX`] followed by the version string.
    pub fn from_version(version: &str) -> Self {
        Self {
            name: format!("{TAG_PREFIX}{version}"),
            version: version.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Extract the first `version = "..."` value from manifest content.
pub fn read_version(content: &str) -> Result<String> {
    let re = Regex::new(VERSION_PATTERN)?;
    let captures = re
        .captures(content)
        .ok_or_else(|| ReleaseError::VersionNotFound("no version line".into()))?;

    let version = captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().trim())
        .unwrap_or_default();

    if version.is_empty() {
        return Err(ReleaseError::VersionNotFound(
            "version value is empty".into(),
        ));
    }

    if semver::Version::parse(version).is_err() {
        warn!("version {version} is not a valid semantic version");
    }

    Ok(version.to_string())
}

/// Read a manifest file and extract its version.
pub fn read_version_file(path: &Path) -> Result<String> {
    debug!("reading version from {}", path.display());

    let content =
        fs::read_to_string(path).map_err(|source| ReleaseError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;

    read_version(&content).map_err(|err| match err {
        ReleaseError::VersionNotFound(reason) => ReleaseError::VersionNotFound(
            format!("{}: {reason}", path.display()),
        ),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PYPROJECT: &str = r#"[build-system]
requires = ["setuptools>=61"]
build-backend = "setuptools.build_meta"

[project]
name = "example"
version = "1.4.2"
requires-python = ">=3.9"
"#;

    #[test]
    fn reads_version_from_pyproject() {
        assert_eq!(read_version(PYPROJECT).unwrap(), "1.4.2");
    }

    #[test]
    fn tag_is_v_prefixed_version() {
        for version in ["0.0.1", "1.4.2", "10.20.30", "2.0.0-rc.1"] {
            let content = format!("version = \"{version}\"\n");
            let parsed = read_version(&content).unwrap();
            let tag = Tag::from_version(&parsed);
            assert_eq!(tag.name(), format!("v{version}"));
            assert_eq!(tag.version(), version);
            assert_eq!(tag.to_string(), format!("v{version}"));
        }
    }

    #[test]
    fn first_version_line_wins() {
        let content = r#"
[project]
version = "3.1.0"

[tool.other]
version = "9.9.9"
"#;
        assert_eq!(read_version(content).unwrap(), "3.1.0");
    }

    #[test]
    fn accepts_single_quotes_and_loose_spacing() {
        assert_eq!(read_version("  version='0.3.0'\n").unwrap(), "0.3.0");
        assert_eq!(read_version("version   =   \"0.4.0\"").unwrap(), "0.4.0");
    }

    #[test]
    fn ignores_keys_that_only_end_in_version() {
        let content = "python_version = \"3.11\"\nversion = \"0.5.0\"\n";
        assert_eq!(read_version(content).unwrap(), "0.5.0");
    }

    #[test]
    fn missing_version_is_an_error() {
        let err = read_version("[project]\nname = \"example\"\n").unwrap_err();
        assert!(matches!(err, ReleaseError::VersionNotFound(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn empty_version_is_an_error() {
        let err = read_version("version = \"\"\n").unwrap_err();
        assert!(matches!(err, ReleaseError::VersionNotFound(_)));
    }

    #[test]
    fn non_semver_versions_are_still_returned() {
        assert_eq!(read_version("version = \"2024.1\"").unwrap(), "2024.1");
    }

    #[test]
    fn reads_version_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PYPROJECT.as_bytes()).unwrap();
        file.flush().unwrap();

        assert_eq!(read_version_file(file.path()).unwrap(), "1.4.2");
    }

    #[test]
    fn missing_manifest_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_version_file(&dir.path().join("pyproject.toml"))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::ManifestRead { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn file_errors_name_the_manifest() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[project]\nname = \"x\"\n").unwrap();
        file.flush().unwrap();

        let err = read_version_file(file.path()).unwrap_err();
        let path = file.path().display().to_string();
        assert!(err.to_string().contains(&path));
    }
}
