//! Waiting-time and Werner-parameter series of a single entangled link.

use super::error::{Error, Result};
use float_cmp::approx_eq;
use itertools::izip;
use ndarray::Array1;

/// Joint distribution of one (possibly virtual) entangled link.
///
/// `pmf[t]` is the probability that the pair is delivered exactly at the
/// discrete time step `t`, and `werner[t]` is its average Werner parameter
/// conditional on delivery at `t`. Both arrays share the truncation
/// horizon as their length and `pmf[0]` is always zero. Entries whose
/// probability is numerically negligible carry a Werner parameter of `1`
/// by convention; they are never observed.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkState {
    /// `P[T = t]` for `t = 0, 1, …`.
    pub pmf: Array1<f64>,
    /// Average Werner parameter conditional on delivery at `t`.
    pub werner: Array1<f64>,
}

impl LinkState {
    /// Bundles a waiting-time distribution with its Werner series.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the arrays differ in length or
    /// are shorter than two entries.
    pub fn new(pmf: Array1<f64>, werner: Array1<f64>) -> Result<Self> {
        if pmf.len() != werner.len() {
            return Err(Error::Configuration {
                name: "werner",
                reason: format!(
                    "length {} does not match the waiting-time distribution of length {}",
                    werner.len(),
                    pmf.len()
                ),
            });
        }
        if pmf.len() < 2 {
            return Err(Error::Configuration {
                name: "pmf",
                reason: format!("the truncation horizon must be at least 2, got {}", pmf.len()),
            });
        }
        Ok(Self { pmf, werner })
    }

    /// The elementary link of one segment: a geometric waiting time with
    /// success probability `p_gen` per step and a constant Werner
    /// parameter `w0`.
    #[must_use]
    pub fn elementary(p_gen: f64, w0: f64, t_trunc: usize) -> Self {
        let mut pmf = Array1::zeros(t_trunc);
        let mut mass = p_gen;
        for t in 1..t_trunc {
            pmf[t] = mass;
            mass *= 1.0 - p_gen;
        }
        Self {
            pmf,
            werner: Array1::from_elem(t_trunc, w0),
        }
    }

    /// The truncation horizon both series are defined on.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.pmf.len()
    }

    /// Total probability mass captured within the horizon.
    #[must_use]
    pub fn coverage(&self) -> f64 {
        self.pmf.sum()
    }

    /// A copy restricted to the first `t_trunc` time steps.
    ///
    /// Every retained entry only depends on retained entries of the
    /// underlying process, so this equals the state a shorter-horizon run
    /// would have produced.
    #[must_use]
    pub fn truncated(&self, t_trunc: usize) -> Self {
        Self {
            pmf: self.pmf.slice(ndarray::s![..t_trunc]).to_owned(),
            werner: self.werner.slice(ndarray::s![..t_trunc]).to_owned(),
        }
    }

    /// Compares two states entry by entry within `ulps` float-comparison
    /// units.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, ulps: i64) -> bool {
        self.horizon() == other.horizon()
            && izip!(&self.pmf, &other.pmf).all(|(&a, &b)| approx_eq!(f64, a, b, ulps = ulps))
            && izip!(&self.werner, &other.werner)
                .all(|(&a, &b)| approx_eq!(f64, a, b, ulps = ulps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn elementary_is_geometric() {
        let link = LinkState::elementary(0.25, 0.9, 64);

        assert_eq!(link.horizon(), 64);
        assert_eq!(link.pmf[0], 0.0);
        assert_approx_eq!(f64, link.pmf[1], 0.25);
        assert_approx_eq!(f64, link.pmf[3], 0.25 * 0.75 * 0.75);
        // the mass missing from the horizon is the tail (1 - p)^(T - 1)
        assert_approx_eq!(f64, link.coverage(), 1.0 - 0.75_f64.powi(63), ulps = 4);
        assert!(link.werner.iter().all(|&w| w == 0.9));
    }

    #[test]
    fn deterministic_generation() {
        let link = LinkState::elementary(1.0, 1.0, 8);

        assert_eq!(link.pmf[1], 1.0);
        assert_eq!(link.pmf.slice(ndarray::s![2..]).sum(), 0.0);
    }

    #[test]
    fn truncation_is_a_prefix() {
        let link = LinkState::elementary(0.5, 0.933, 128);
        let short = link.truncated(32);

        assert_eq!(short.horizon(), 32);
        assert_eq!(short.pmf, link.pmf.slice(ndarray::s![..32]).to_owned());
        assert!(short.coverage() <= link.coverage());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let pmf = Array1::zeros(16);
        let werner = Array1::zeros(8);

        assert!(matches!(
            LinkState::new(pmf, werner),
            Err(crate::error::Error::Configuration { name: "werner", .. })
        ));
    }
}
