//! Figures of merit: Werner-parameter fidelity and the asymptotic BB84
//! secret-key rate of a delivered distribution.

use super::link::LinkState;
use itertools::izip;

/// Fidelity of a Werner state to its target Bell state, `(1 + 3w) / 4`.
#[must_use]
pub fn werner_to_fidelity(w: f64) -> f64 {
    3.0_f64.mul_add(w, 1.0) / 4.0
}

/// Binary entropy in bits, with `h(0) = h(1) = 0`.
#[must_use]
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        0.0
    } else {
        -p.mul_add(p.log2(), (1.0 - p) * (1.0 - p).log2())
    }
}

/// Asymptotic BB84 secret-key fraction of a Werner pair: both error
/// rates equal `(1 - w) / 2`, and the fraction is clamped at zero.
#[must_use]
pub fn secret_key_fraction(w: f64) -> f64 {
    let qber = (1.0 - w) / 2.0;
    2.0_f64.mul_add(-binary_entropy(qber), 1.0).max(0.0)
}

/// Secret-key rate per time step: the key fraction of the average
/// delivered pair divided by the mean waiting time.
///
/// Both averages condition on delivery within the horizon; a
/// distribution without any captured mass rates zero.
#[must_use]
pub fn secret_key_rate(link: &LinkState) -> f64 {
    let coverage = link.coverage();
    if coverage <= 0.0 {
        return 0.0;
    }
    let mean_werner = izip!(&link.pmf, &link.werner)
        .map(|(&p, &w)| p * w)
        .sum::<f64>()
        / coverage;
    let mean_time = link
        .pmf
        .iter()
        .enumerate()
        .map(|(t, &p)| t as f64 * p)
        .sum::<f64>()
        / coverage;
    if mean_time <= 0.0 {
        return 0.0;
    }
    secret_key_fraction(mean_werner) / mean_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn fidelity_endpoints() {
        assert_approx_eq!(f64, werner_to_fidelity(1.0), 1.0);
        assert_approx_eq!(f64, werner_to_fidelity(0.0), 0.25);
    }

    #[test]
    fn entropy_is_symmetric_and_peaks_at_one_half() {
        assert_eq!(binary_entropy(0.0), 0.0);
        assert_eq!(binary_entropy(1.0), 0.0);
        assert_approx_eq!(f64, binary_entropy(0.5), 1.0);
        assert_approx_eq!(f64, binary_entropy(0.11), binary_entropy(0.89));
    }

    #[test]
    fn key_fraction_thresholds() {
        // perfect pairs carry one full secret bit
        assert_approx_eq!(f64, secret_key_fraction(1.0), 1.0);
        // an 11% error rate is beyond the BB84 threshold
        assert_eq!(secret_key_fraction(0.5), 0.0);
        assert!(secret_key_fraction(0.95) > 0.0);
    }

    #[test]
    fn elementary_link_rate() {
        // geometric waiting time with mean 2, perfect pairs
        let link = LinkState::elementary(0.5, 1.0, 512);
        assert_approx_eq!(f64, secret_key_rate(&link), 0.5, epsilon = 1e-9);

        let worthless = LinkState::elementary(0.5, 0.4, 512);
        assert_eq!(secret_key_rate(&worthless), 0.0);
    }

    #[test]
    fn rate_grows_with_fidelity() {
        let better = LinkState::elementary(0.5, 0.98, 256);
        let worse = LinkState::elementary(0.5, 0.93, 256);

        assert!(secret_key_rate(&better) > secret_key_rate(&worse));
    }
}
