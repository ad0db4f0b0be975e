//! Remote URL handling for authenticated pushes.
//!
//! Credentials are only ever embedded in `http(s)` URLs. SSH, scp-like and
//! local path remotes are used exactly as configured, leaving authentication
//! to the user's git setup.
use log::*;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::config::GitCredentials;

/// Embed `username` and `token` into an HTTPS remote URL.
///
/// Returns `base` unchanged when either credential is missing or empty, or
/// when the URL is not an `http`/`https` URL.
pub fn authenticated_url(
    base: &str,
    username: Option<&str>,
    token: Option<&str>,
) -> String {
    let (Some(username), Some(token)) = (username, token) else {
        return base.to_string();
    };

    if username.is_empty() || token.is_empty() {
        return base.to_string();
    }

    let Ok(mut url) = Url::parse(base) else {
        // scp-like ssh remotes (git@host:owner/repo) are not URLs
        return base.to_string();
    };

    if !matches!(url.scheme(), "https" | "http") {
        return base.to_string();
    }

    if url.set_username(username).is_err()
        || url.set_password(Some(token)).is_err()
    {
        return base.to_string();
    }

    url.to_string()
}

/// Replace the password portion of a URL with `***` for logging.
pub fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_ok() {
                parsed.to_string()
            } else {
                url.to_string()
            }
        }
        _ => url.to_string(),
    }
}

/// Where pushes are sent.
#[derive(Debug, Clone)]
pub enum PushTarget {
    /// A configured remote, pushed as is.
    Named(String),
    /// A one-off URL carrying embedded credentials.
    Url(SecretString),
}

impl PushTarget {
    /// Pick the push target for `remote`: an authenticated URL when
    /// credentials are available and the remote is HTTPS, otherwise the
    /// remote itself.
    pub fn resolve(
        remote: &str,
        remote_url: Option<&str>,
        credentials: Option<&GitCredentials>,
    ) -> Self {
        let (Some(remote_url), Some(credentials)) = (remote_url, credentials)
        else {
            debug!("pushing to remote {remote} without embedded credentials");
            return Self::Named(remote.to_string());
        };

        let authed = authenticated_url(
            remote_url,
            Some(&credentials.username),
            Some(credentials.token.expose_secret()),
        );

        if authed == remote_url {
            debug!("remote {remote} is not https: pushing unmodified");
            return Self::Named(remote.to_string());
        }

        info!("pushing with credentials to {}", redact(&authed));
        Self::Url(SecretString::from(authed))
    }

    /// Human readable form with credentials masked.
    pub fn describe(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Url(url) => redact(url.expose_secret()),
        }
    }
}
