use pengate_core::ProviderError;
use thiserror::Error;

/// Failures that reject or abort a whole script. Per-operation document
/// failures are reported in [`ScriptReport`](crate::ScriptReport) instead.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script is malformed; nothing was executed.
    #[error("invalid script (line {line}): {message}")]
    Validation { line: usize, message: String },

    /// The image collaborator failed while running operation `index`.
    #[error("image lookup failed in operation {index}: {source}")]
    Upstream {
        index: usize,
        #[source]
        source: ProviderError,
    },
}

impl ScriptError {
    pub(crate) fn validation(line: usize, message: impl Into<String>) -> Self {
        Self::Validation {
            line,
            message: message.into(),
        }
    }

    /// Source line of a validation failure.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Validation { line, .. } => Some(*line),
            Self::Upstream { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_failure",
            Self::Upstream { .. } => "upstream_failure",
        }
    }
}
