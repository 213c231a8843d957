//! Non-fatal numeric warnings, surfaced as structured [`tracing`] events.
//!
//! Every event carries a stable `code` field so that upstream drivers can
//! match on it without parsing the human-readable message.

/// Stable identifiers of the warnings this crate can emit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WarningCode {
    /// `sum(pmf)` at truncation fell below the configured threshold.
    LowCoverage,
    /// The zero-padded FFT buffer was too small; circular convolution may
    /// contaminate the distribution.
    FftPaddingInsufficient,
    /// A GPU backend was requested but none is available in this build.
    GpuUnavailable,
}

impl WarningCode {
    /// The wire name of this warning.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowCoverage => "low_coverage",
            Self::FftPaddingInsufficient => "fft_padding_insufficient",
            Self::GpuUnavailable => "gpu_unavailable",
        }
    }
}

pub(crate) fn low_coverage(coverage: f64, threshold: f64) {
    tracing::warn!(
        code = WarningCode::LowCoverage.as_str(),
        coverage,
        threshold,
        "the truncation time only covers {:.2}% of the distribution, increase t_trunc",
        coverage * 100.0,
    );
}

pub(crate) fn fft_padding_insufficient(padded_len: usize, residual: f64) {
    tracing::warn!(
        code = WarningCode::FftPaddingInsufficient.as_str(),
        padded_len,
        residual,
        "the zero-padded FFT buffer of length {padded_len} is too small; the circular \
         convolution deviates by at least {residual:.0e}",
    );
}

pub(crate) fn gpu_unavailable() {
    tracing::warn!(
        code = WarningCode::GpuUnavailable.as_str(),
        "no GPU backend is available in this build, falling back to the CPU",
    );
}

#[cfg(test)]
mod tests {
    use super::WarningCode;

    #[test]
    fn wire_names() {
        assert_eq!(WarningCode::LowCoverage.as_str(), "low_coverage");
        assert_eq!(
            WarningCode::FftPaddingInsufficient.as_str(),
            "fft_padding_insufficient"
        );
        assert_eq!(WarningCode::GpuUnavailable.as_str(), "gpu_unavailable");
    }
}
