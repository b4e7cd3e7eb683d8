use std::fmt;

use serde::Serialize;

use crate::errors::{MaintainerError, Result};

/// Prefix `https://` when the reference carries no scheme.
///
/// Idempotent: an already-normalized reference comes back unchanged.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// A parsed upstream repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoRef {
    /// Normalized absolute URL, as derived from the caller's input.
    pub url: String,
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Normalize `input` and split it into host, owner and repository name.
    ///
    /// Accepts `github.com/owner/repo`, `https://github.com/owner/repo`,
    /// trailing slashes and a `.git` suffix. Anything that does not end up as
    /// exactly `host/owner/name` is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let url = normalize(input);
        let invalid = |reason: &str| MaintainerError::InvalidReference {
            input: input.trim().to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        if scheme != "https" && scheme != "http" {
            return Err(invalid("only http(s) references are supported"));
        }

        let path = rest.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let parts: Vec<String> = path.split('/').map(str::to_string).collect();
        let [host, owner, name] = <[String; 3]>::try_from(parts)
            .map_err(|_| invalid("expected <host>/<owner>/<repository>"))?;
        if host.is_empty() || owner.is_empty() || name.is_empty() {
            return Err(invalid("expected <host>/<owner>/<repository>"));
        }
        if host.contains('@') {
            return Err(invalid("credentials must not be embedded in the reference"));
        }

        Ok(Self {
            url,
            host,
            owner,
            name,
        })
    }

    /// `owner/name`, as used in API paths.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Clone URL of `user`'s fork. Carries no credentials.
    pub fn fork_url(&self, user: &str) -> String {
        format!("{}{}.git", self.fork_owner_prefix(user), self.name)
    }

    /// URL prefix shared by every repository `user` owns on this host.
    pub fn fork_owner_prefix(&self, user: &str) -> String {
        format!("https://{}/{}/", self.host, user)
    }

    /// Fetch URL of the upstream repository (no credentials).
    pub fn upstream_url(&self) -> String {
        self.url.trim_end_matches('/').to_string()
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
