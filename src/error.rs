//! Error types for release-pilot and their mapping to process exit codes.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for release-pilot operations.
#[derive(Error, Debug)]
pub enum ReleaseError {
    // Cli args / configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Manifest errors
    #[error("Failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No version found in manifest: {0}")]
    VersionNotFound(String),

    // Forge/Git errors
    #[error("Forge operation failed: {0}")]
    ForgeError(String),

    #[error("Git operation failed: {0}")]
    GitError(#[from] git2::Error),

    #[error("Git URL parse error: {0}")]
    GitUrlError(#[from] git_url_parse::GitUrlParseError),

    // External process errors
    #[error("Command `{command}` exited with status {}", display_status(.code))]
    CommandFailed { command: String, code: Option<i32> },

    #[error("Failed to spawn `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No build artifacts found in {0}")]
    NoArtifacts(PathBuf),

    // Parsing errors
    #[error("Regular expression error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".into(),
    }
}

/// Result type alias using ReleaseError
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a forge error with context
    pub fn forge(msg: impl Into<String>) -> Self {
        Self::ForgeError(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Process exit code for this error.
    ///
    /// A failing external command hands its own exit status back to the
    /// caller; everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

impl From<octocrab::Error> for ReleaseError {
    fn from(err: octocrab::Error) -> Self {
        Self::ForgeError(err.to_string())
    }
}
