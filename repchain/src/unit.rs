//! Unit operators: one entanglement swap or distillation step, with the
//! cut-off retry loop closed.

use super::convolve::{iterative_convolution, BackendConfig};
use super::cutoff::Cutoff;
use super::decoherence::Decoherence;
use super::diagnostics;
use super::error::{Error, Result};
use super::join::{join_links, Branch, JoinKernel};
use super::link::LinkState;
use super::protocol::Step;
use itertools::izip;
use ndarray::Array1;

/// Everything one unit step needs besides the two input links.
#[derive(Clone, Copy, Debug)]
pub(crate) struct UnitContext {
    pub p_swap: f64,
    pub cutoff: Cutoff,
    pub decoherence: Decoherence,
}

/// Scalar parameters of a single exposed unit step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitParameters {
    /// Entanglement-swap success probability; ignored by distillation.
    pub p_swap: f64,
    /// Memory coherence time, infinite for perfect memories.
    pub t_coh: f64,
    /// Cut-off applied within this step.
    pub cutoff: Cutoff,
}

impl Default for UnitParameters {
    fn default() -> Self {
        Self {
            p_swap: 1.0,
            t_coh: f64::INFINITY,
            cutoff: Cutoff::None,
        }
    }
}

/// Applies one swap or distillation to `link1` and `link2`.
pub(crate) fn apply_unit(
    kind: Step,
    link1: &LinkState,
    link2: &LinkState,
    context: &UnitContext,
    config: &BackendConfig,
) -> Result<LinkState> {
    if link1.horizon() != link2.horizon() {
        return Err(Error::Configuration {
            name: "pmf2",
            reason: format!(
                "the input links must share one truncation horizon, got {} and {}",
                link1.horizon(),
                link2.horizon()
            ),
        });
    }

    let state = match kind {
        Step::Swap => swap(link1, link2, context, config),
        Step::Dist => distill(link1, link2, context, config),
    };

    let coverage = state.coverage();
    if coverage < config.cdf_threshold {
        diagnostics::low_coverage(coverage, config.cdf_threshold);
    }
    Ok(state)
}

/// Entanglement swap: delivery once both inputs survived the cut-off,
/// retried geometrically with `p_swap`.
fn swap(
    link1: &LinkState,
    link2: &LinkState,
    context: &UnitContext,
    config: &BackendConfig,
) -> LinkState {
    let &UnitContext {
        p_swap,
        cutoff,
        decoherence,
    } = context;
    let shift = cutoff.shift();
    let join = |branch, kernel| {
        join_links(link1, link2, branch, kernel, cutoff, decoherence, config.efficient)
    };

    // one cut-off attempt: restart and completion branches
    let attempt_fail = join(Branch::Failure, JoinKernel::One);
    let attempt_done = join(Branch::Success, JoinKernel::One);
    // close the cut-off retry loop, then the swap retry loop
    let pmf_cutoff = iterative_convolution(&attempt_fail, shift, Some(&attempt_done), None, config);
    let pmf = iterative_convolution(&pmf_cutoff, 0, None, Some(p_swap), config);

    // the Werner numerator rides through the same two loops
    let werner_done = join(Branch::Success, JoinKernel::SwapWerner);
    let werner_cutoff =
        iterative_convolution(&attempt_fail, shift, Some(&werner_done), None, config);
    let weighted =
        iterative_convolution(&pmf_cutoff, 0, Some(&werner_cutoff), Some(p_swap), config);

    LinkState {
        werner: conditional_werner(weighted, &pmf),
        pmf,
    }
}

/// Entanglement distillation: acceptance terminates, rejection and
/// cut-off failures restart.
fn distill(
    link1: &LinkState,
    link2: &LinkState,
    context: &UnitContext,
    config: &BackendConfig,
) -> LinkState {
    let &UnitContext {
        cutoff, decoherence, ..
    } = context;
    let shift = cutoff.shift();
    let join = |branch, kernel| {
        join_links(link1, link2, branch, kernel, cutoff, decoherence, config.efficient)
    };

    let attempt_fail = join(Branch::Failure, JoinKernel::One);
    let attempt_accept = join(Branch::Success, JoinKernel::DistAccept);
    let attempt_reject = join(Branch::Success, JoinKernel::DistReject);
    // one distillation attempt, cut-off retries already folded in
    let dist_accept =
        iterative_convolution(&attempt_fail, shift, Some(&attempt_accept), None, config);
    let dist_reject =
        iterative_convolution(&attempt_fail, shift, Some(&attempt_reject), None, config);
    // rejections restart the whole attempt, acceptance terminates
    let pmf = iterative_convolution(&dist_reject, 0, Some(&dist_accept), None, config);

    let werner_accept = join(Branch::Success, JoinKernel::DistWerner);
    let werner_cutoff =
        iterative_convolution(&attempt_fail, shift, Some(&werner_accept), None, config);
    let weighted = iterative_convolution(&dist_reject, 0, Some(&werner_cutoff), None, config);

    LinkState {
        werner: conditional_werner(weighted, &pmf),
        pmf,
    }
}

/// Divides the Werner numerator by the delivery PMF.
///
/// Where the delivery probability is numerically zero the quotient is
/// unobservable; `0/0` maps to `1` there, and round-off excursions are
/// clipped back into `[0, 1]`. Index 0 is `1` by the same convention.
fn conditional_werner(mut weighted: Array1<f64>, pmf: &Array1<f64>) -> Array1<f64> {
    for (w, &p) in izip!(weighted.iter_mut(), pmf).skip(1) {
        let quotient = *w / p;
        *w = if quotient.is_nan() {
            1.0
        } else {
            quotient.clamp(0.0, 1.0)
        };
    }
    weighted[0] = 1.0;
    weighted
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn context() -> UnitContext {
        UnitContext {
            p_swap: 1.0,
            cutoff: Cutoff::None,
            decoherence: Decoherence::uniform(f64::INFINITY),
        }
    }

    fn cumulative(pmf: &Array1<f64>) -> Vec<f64> {
        let mut acc = 0.0;
        pmf.iter()
            .map(|&p| {
                acc += p;
                acc
            })
            .collect()
    }

    #[test]
    fn deterministic_swap_is_the_max_of_its_inputs() {
        let l1 = LinkState::elementary(0.5, 0.9, 200);
        let l2 = LinkState::elementary(0.8, 0.95, 200);
        let out = apply_unit(Step::Swap, &l1, &l2, &context(), &BackendConfig::default()).unwrap();

        let cdf1 = cumulative(&l1.pmf);
        let cdf2 = cumulative(&l2.pmf);
        let cdf_out = cumulative(&out.pmf);
        for t in 0..200 {
            assert_approx_eq!(f64, cdf_out[t], cdf1[t] * cdf2[t], epsilon = 1e-11);
        }
    }

    #[test]
    fn lossless_swap_multiplies_werner_parameters() {
        let l1 = LinkState::elementary(0.5, 0.9, 128);
        let l2 = LinkState::elementary(0.5, 0.8, 128);
        let out = apply_unit(Step::Swap, &l1, &l2, &context(), &BackendConfig::default()).unwrap();

        assert_eq!(out.werner[0], 1.0);
        for t in 1..128 {
            // tiny delivery probabilities amplify FFT round-off in the quotient
            if out.pmf[t] > 1e-6 {
                assert_approx_eq!(f64, out.werner[t], 0.9 * 0.8, epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn swap_output_is_well_formed() {
        let link = LinkState::elementary(0.5, 0.933, 256);
        let ctx = UnitContext {
            p_swap: 0.5,
            cutoff: Cutoff::MemoryTime(20),
            decoherence: Decoherence::uniform(400.0),
        };
        let out = apply_unit(Step::Swap, &link, &link, &ctx, &BackendConfig::default()).unwrap();

        assert_eq!(out.horizon(), 256);
        assert_eq!(out.pmf[0], 0.0);
        assert_eq!(out.werner[0], 1.0);
        assert!(out.pmf.iter().all(|&p| p > -1e-12));
        assert!(out.werner.iter().all(|&w| (0.0..=1.0).contains(&w)));
        assert!(out.coverage() <= 1.0 + 1e-9);
    }

    #[test]
    fn perfect_pairs_distill_to_perfect_pairs() {
        let link = LinkState::elementary(0.6, 1.0, 128);
        let out = apply_unit(Step::Dist, &link, &link, &context(), &BackendConfig::default()).unwrap();

        // acceptance probability is 1, so the PMF is the plain max
        let cdf = cumulative(&link.pmf);
        let cdf_out = cumulative(&out.pmf);
        for t in 0..128 {
            assert_approx_eq!(f64, cdf_out[t], cdf[t] * cdf[t], epsilon = 1e-11);
        }
        for t in 1..128 {
            if out.pmf[t] > 1e-6 {
                assert_approx_eq!(f64, out.werner[t], 1.0, epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn distillation_raises_the_werner_parameter() {
        let link = LinkState::elementary(0.6, 0.8, 256);
        let out = apply_unit(Step::Dist, &link, &link, &context(), &BackendConfig::default()).unwrap();

        // (2w + 4w²) / (3(1 + w²)) at w = 0.8
        let expected = (2.0 * 0.8 + 4.0 * 0.64) / (3.0 * 1.64);
        assert!(expected > 0.8);
        for t in 1..256 {
            if out.pmf[t] > 1e-6 {
                assert_approx_eq!(f64, out.werner[t], expected, epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn mismatched_horizons_are_rejected() {
        let l1 = LinkState::elementary(0.5, 0.9, 64);
        let l2 = LinkState::elementary(0.5, 0.9, 128);

        assert!(matches!(
            apply_unit(Step::Swap, &l1, &l2, &context(), &BackendConfig::default()),
            Err(Error::Configuration { name: "pmf2", .. })
        ));
    }

    #[test]
    fn werner_quotient_hygiene() {
        let weighted = Array1::from_vec(vec![0.7, 0.0, 0.5, 2.0]);
        let pmf = Array1::from_vec(vec![0.0, 0.0, 0.25, 0.5]);
        let werner = conditional_werner(weighted, &pmf);

        assert_eq!(werner[0], 1.0);
        assert_eq!(werner[1], 1.0); // 0/0
        assert_approx_eq!(f64, werner[2], 1.0); // clipped from 2.0
        assert_approx_eq!(f64, werner[3], 1.0); // clipped from 4.0
    }
}
