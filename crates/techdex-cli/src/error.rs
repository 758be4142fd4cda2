use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] techdex_core::ValidationError),

    #[error(transparent)]
    Source(#[from] techdex_core::SourceError),

    #[error(transparent)]
    Export(#[from] techdex_core::ExportError),

    #[error("failed to load weights: {0}")]
    Weights(techdex_core::CoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("chart window failed: {0}")]
    Chart(String),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Weights(_) => 2,
            Self::Source(_) => 3,
            Self::Serialization(_) => 4,
            Self::Chart(_) => 6,
            Self::Export(_) => 10,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_failures_exit_with_three() {
        let error = CliError::from(techdex_core::SourceError::unavailable("down"));
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn bad_input_exits_with_two() {
        let error = CliError::from(techdex_core::ValidationError::EmptySymbol);
        assert_eq!(error.exit_code(), 2);
    }
}
