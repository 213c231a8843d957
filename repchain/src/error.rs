//! Error types of this crate.

use thiserror::Error;

/// Errors that abort a simulation call.
///
/// Numeric degradations (low coverage, insufficient FFT padding) are not
/// errors; they are reported through [`crate::diagnostics`] and the call
/// still returns a result. The one exception is
/// [`Error::ThresholdExceeded`], which is only raised when strict coverage
/// checking was requested.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter failed a type, range or length check before evaluation.
    #[error("invalid parameter `{name}`: {reason}")]
    Configuration {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// An asymmetric protocol step could not be applied to the live
    /// segments.
    #[error("invalid protocol step `{step}`: {reason}")]
    Protocol {
        /// The offending step, in its `s<i>`/`d<i>` boundary notation.
        step: String,
        /// Why the step was rejected.
        reason: String,
    },
    /// The final CDF coverage fell below the caller-supplied threshold.
    #[error("CDF coverage {coverage:.4} is below the threshold {threshold}; increase `t_trunc`")]
    ThresholdExceeded {
        /// Total probability mass captured within the horizon.
        coverage: f64,
        /// The coverage the caller demanded.
        threshold: f64,
    },
}

/// Shorthand for `Result` with this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
