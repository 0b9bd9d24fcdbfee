use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the analysis core.
///
/// `BadContinuum` is intentionally absent: a degenerate continuum fit is
/// recovered inside the preprocessor (linear fallback) and reported only as a
/// trace warning.
#[derive(Debug, Error)]
pub enum Error {
    /// Unparseable or malformed input file.
    #[error("failed to read spectrum '{path}': {reason}")]
    BadInput { path: PathBuf, reason: String },

    /// Input has no usable samples after trimming non-finite values and masks.
    #[error("spectrum has no usable samples")]
    EmptySpectrum,

    /// The configured filters left the template library empty.
    #[error("no templates remain after applying filters")]
    NoEligibleTemplates,

    /// The cancellation token tripped before the analysis finished.
    #[error("analysis cancelled after scoring {completed} of {total} templates")]
    Cancelled { completed: usize, total: usize },

    /// A bug in the core. The context string identifies the failing stage.
    #[error("internal error in {stage}: {context}")]
    Internal { stage: &'static str, context: String },
}

impl Error {
    pub(crate) fn bad_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::BadInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn internal(stage: &'static str, context: impl Into<String>) -> Self {
        Error::Internal {
            stage,
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
