//! Configuration error types.

use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment failed to extract the configuration from its providers.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),
}
