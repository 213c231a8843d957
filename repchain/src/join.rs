//! Join-links kernel: marginal distributions of one cut-off attempt.
//!
//! One attempt generates both input links independently and either
//! completes (both delivered inside the cut-off window) or is abandoned.
//! This module computes the 1-D marginals of that attempt over the
//! delivery pair `(t1, t2)`, weighted by one of the [`JoinKernel`]
//! quantities. Success completes at `max(t1, t2)`. Failure timing follows
//! the retry convention of each policy: memory-time failures are indexed
//! by `min(t1, t2)` (the waited window is restored by the shift of the
//! retry convolution), fidelity failures by the absolute discard time,
//! and run-time failures carry all their mass at the cut-off itself.
//! Partner arrivals beyond the horizon count toward failure through the
//! CDF tails; failures whose restart lies beyond the horizon are dropped.

use super::cutoff::Cutoff;
use super::decoherence::{Decoherence, Held};
use super::link::LinkState;
use ndarray::Array1;

/// Which outcome of one cut-off attempt is marginalized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Branch {
    /// Both links delivered a valid pair within the cut-off window.
    Success,
    /// At least one link exceeded the cut-off; the attempt restarts.
    Failure,
}

/// Weight attached to each accepted delivery pair.
///
/// The Werner-product weights implement the standard swap and
/// distillation maps on Werner states; the distillation Werner weight is
/// divided by 6 so that normalizing by the acceptance probability yields
/// `(w1 + w2 + 4·w1·w2) / (3·(1 + w1·w2))`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum JoinKernel {
    /// Bare probability.
    One,
    /// `w1 · w2`, the swap success branch.
    SwapWerner,
    /// `(1 + w1·w2) / 2`, the distillation acceptance probability.
    DistAccept,
    /// `(1 - w1·w2) / 2`, the distillation rejection probability.
    DistReject,
    /// `(w1 + w2 + 4·w1·w2) / 6`, the distillation success Werner weight.
    DistWerner,
}

impl JoinKernel {
    /// Evaluates the weight; `w_first` already carries the decoherence of
    /// the waiting time.
    fn eval(self, w_first: f64, w_other: f64) -> f64 {
        match self {
            Self::One => 1.0,
            Self::SwapWerner => w_first * w_other,
            Self::DistAccept => (w_first * w_other).mul_add(0.5, 0.5),
            Self::DistReject => (w_first * w_other).mul_add(-0.5, 0.5),
            Self::DistWerner => (w_first * w_other).mul_add(4.0, w_first + w_other) / 6.0,
        }
    }
}

/// Marginalizes one attempt of joining `link1` and `link2`.
///
/// The memory-time fast path runs in `O(t_trunc · mt_cut)` and applies
/// whenever the window is a constant and both links decay at the same
/// rate; every other combination goes through the compatible
/// `O(t_trunc²)` scan over the joint distribution.
pub(crate) fn join_links(
    link1: &LinkState,
    link2: &LinkState,
    branch: Branch,
    kernel: JoinKernel,
    cutoff: Cutoff,
    decoherence: Decoherence,
    efficient: bool,
) -> Array1<f64> {
    debug_assert_eq!(link1.horizon(), link2.horizon());
    debug_assert!(branch == Branch::Success || kernel == JoinKernel::One);

    match branch {
        Branch::Failure => failure(link1, link2, cutoff, decoherence),
        Branch::Success => {
            let windowed = matches!(cutoff, Cutoff::None | Cutoff::MemoryTime(_));
            if efficient && windowed && decoherence.is_uniform() {
                success_windowed(link1, link2, kernel, cutoff, decoherence)
            } else {
                success_compatible(link1, link2, kernel, cutoff, decoherence)
            }
        }
    }
}

/// Success marginal for a constant relative-delay window.
fn success_windowed(
    link1: &LinkState,
    link2: &LinkState,
    kernel: JoinKernel,
    cutoff: Cutoff,
    decoherence: Decoherence,
) -> Array1<f64> {
    let trunc = link1.horizon();
    let window = match cutoff {
        Cutoff::MemoryTime(mt_cut) => mt_cut.min(trunc),
        _ => trunc,
    };
    let decay: Vec<f64> = (0..=window)
        .map(|delta| decoherence.factor(delta, Held::Link1))
        .collect();
    let (p1, w1) = (&link1.pmf, &link1.werner);
    let (p2, w2) = (&link2.pmf, &link2.werner);

    let mut out = Array1::zeros(trunc);
    for t in 1..trunc {
        // simultaneous arrival needs no storage
        let mut acc = p1[t] * p2[t] * kernel.eval(w1[t], w2[t]);
        for delta in 1..=window.min(t - 1) {
            let e = decay[delta];
            acc += p1[t] * p2[t - delta] * kernel.eval(w2[t - delta] * e, w1[t]);
            acc += p2[t] * p1[t - delta] * kernel.eval(w1[t - delta] * e, w2[t]);
        }
        out[t] = acc;
    }
    out
}

/// Success marginal over the full joint distribution; handles every
/// cut-off and per-memory decay rates.
fn success_compatible(
    link1: &LinkState,
    link2: &LinkState,
    kernel: JoinKernel,
    cutoff: Cutoff,
    decoherence: Decoherence,
) -> Array1<f64> {
    let trunc = link1.horizon();
    let mut out = Array1::zeros(trunc);

    for t1 in 1..trunc {
        let p1 = link1.pmf[t1];
        if p1 == 0.0 {
            continue;
        }
        for t2 in 1..trunc {
            let weight = p1 * link2.pmf[t2];
            if weight == 0.0 {
                continue;
            }
            let (first, delta, held) = if t2 >= t1 {
                (t1, t2 - t1, Held::Link1)
            } else {
                (t2, t1 - t2, Held::Link2)
            };
            let accepted = match cutoff {
                Cutoff::None => true,
                Cutoff::MemoryTime(mt_cut) => delta <= mt_cut,
                Cutoff::RunTime(rt_cut) => t1.max(t2) <= rt_cut,
                Cutoff::Fidelity(w_cut) => {
                    let w_first = match held {
                        Held::Link1 => link1.werner[first],
                        Held::Link2 => link2.werner[first],
                    };
                    fidelity_window(w_first, w_cut, decoherence.rate(held))
                        .map_or(true, |steps| delta <= steps)
                }
            };
            if !accepted {
                continue;
            }
            let e = decoherence.factor(delta, held);
            let value = match held {
                Held::Link1 => kernel.eval(link1.werner[t1] * e, link2.werner[t2]),
                Held::Link2 => kernel.eval(link2.werner[t2] * e, link1.werner[t1]),
            };
            out[t1.max(t2)] += weight * value;
        }
    }
    out
}

/// Failure marginal of one attempt; closed forms over the CDF tails.
fn failure(
    link1: &LinkState,
    link2: &LinkState,
    cutoff: Cutoff,
    decoherence: Decoherence,
) -> Array1<f64> {
    let trunc = link1.horizon();
    let mut out = Array1::zeros(trunc);

    match cutoff {
        Cutoff::None => {}
        Cutoff::MemoryTime(mt_cut) => {
            let cdf1 = cumulative(&link1.pmf);
            let cdf2 = cumulative(&link2.pmf);
            for t in 1..trunc {
                let lag = t.saturating_add(mt_cut).min(trunc - 1);
                out[t] = link1.pmf[t].mul_add(
                    1.0 - cdf2[lag],
                    link2.pmf[t] * (1.0 - cdf1[lag]),
                );
            }
        }
        Cutoff::RunTime(rt_cut) => {
            if rt_cut < trunc {
                let cdf1 = cumulative(&link1.pmf);
                let cdf2 = cumulative(&link2.pmf);
                out[rt_cut] = cdf1[rt_cut].mul_add(-cdf2[rt_cut], 1.0);
            }
        }
        Cutoff::Fidelity(w_cut) => {
            let cdf1 = cumulative(&link1.pmf);
            let cdf2 = cumulative(&link2.pmf);
            for t in 1..trunc {
                // link1 stored, link2 late
                if let Some(steps) = fidelity_window(link1.werner[t], w_cut, decoherence.rate(Held::Link1))
                {
                    if let Some(reject) = t.checked_add(steps).filter(|&r| r < trunc) {
                        out[reject] += link1.pmf[t] * (1.0 - cdf2[reject]);
                    }
                }
                // link2 stored, link1 late
                if let Some(steps) = fidelity_window(link2.werner[t], w_cut, decoherence.rate(Held::Link2))
                {
                    if let Some(reject) = t.checked_add(steps).filter(|&r| r < trunc) {
                        out[reject] += link2.pmf[t] * (1.0 - cdf1[reject]);
                    }
                }
            }
        }
    }
    out
}

/// Steps a stored pair with Werner parameter `w` survives before dropping
/// below `w_cut`; `None` is unbounded.
fn fidelity_window(w: f64, w_cut: f64, rate: f64) -> Option<usize> {
    if rate == 0.0 {
        return if w >= w_cut { None } else { Some(0) };
    }
    if w <= 0.0 {
        return Some(0);
    }
    let steps = ((w / w_cut).ln() / rate).floor();
    if steps <= 0.0 {
        Some(0)
    } else if steps >= u32::MAX.into() {
        // far beyond any horizon
        None
    } else {
        Some(steps as usize)
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
