//! Error handling for the driver binary

use thiserror::Error;

/// Result type for driver operations
pub type CliResult<T> = Result<T, CliError>;

/// Driver-specific errors; `Usage` exits with status 1, everything else
/// with status 2.
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line or parameter-file combination
    #[error("{0}")]
    Usage(String),

    /// Engine error
    #[error("Simulation error: {0}")]
    Core(#[from] cabletree_core::CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parameter file serialization error
    #[error("Parameter file error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl CliError {
    /// Create a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_error_displays_plainly() {
        let err = CliError::usage("can specify at most one of --ring and --all-to-all");
        assert_eq!(
            format!("{}", err),
            "can specify at most one of --ring and --all-to-all"
        );
    }
}
