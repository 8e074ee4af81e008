//! Storage backend configuration.

use serde::{Deserialize, Serialize};

/// Where the grades database lives.
///
/// Either a local file path or a remote libSQL endpoint. When both are
/// set, the remote endpoint wins; when neither is set, the store cannot
/// be opened from configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to a local database file (`:memory:` works too).
    pub path: String,

    /// Remote endpoint URL, e.g. `libsql://grades-myorg.turso.io`.
    pub url: String,

    /// Auth token for the remote endpoint.
    pub auth_token: String,
}

impl StorageConfig {
    /// Whether a remote endpoint is configured.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        !self.url.is_empty()
    }

    /// Whether a local database path is configured.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !self.path.is_empty()
    }

    /// Whether this config is sufficient to open a store: a local path,
    /// or a remote URL together with its auth token.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.is_local() || (self.is_remote() && !self.auth_token.is_empty())
    }
}
