//! Iterative-convolution engine: the geometric sum
//! `g·α + g·α∗f + g·α∗f∗f + …` closed in the Fourier domain.
//!
//! Every retry loop of the repeater algorithm — cut-off restarts, swap
//! retries, distillation rejections — is such a sum: `g` is the terminating
//! branch of one attempt, `f` the restarting branch, and `α` an optional
//! per-attempt success probability. The primary path evaluates the closed
//! form `α·G / (1 − (1 − α)·F)` on a zero-padded FFT grid; a direct
//! truncated-series fallback exists for cross-checking and FFT-free
//! operation.

use super::diagnostics;
use ndarray::Array1;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

/// Residual above this in the last padded sample means the circular
/// convolution has wrapped into the retained window.
const FFT_RESIDUAL_TOL: f64 = 1.0e-15;

/// Natural-log magnitude below which a series tail is invisible in f64.
const LN_SERIES_TOL: f64 = -52.0;

/// Numerical backend switches, fixed at [`Simulation`](crate::Simulation)
/// construction and passed by value through every call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackendConfig {
    /// Evaluate geometric sums in the Fourier domain (default) instead of
    /// by direct convolution.
    pub use_fft: bool,
    /// Request the GPU backend. This build carries no GPU kernels: the
    /// request falls back to the CPU with a `gpu_unavailable` warning.
    pub use_gpu: bool,
    /// Use the `O(t_trunc · mt_cut)` memory-time join path where it
    /// applies.
    pub efficient: bool,
    /// Override for the FFT zero-padding size; defaults to the next power
    /// of two of `2·t_trunc − 1`.
    pub zero_padding_size: Option<usize>,
    /// Coverage below this emits a `low_coverage` warning after each unit.
    pub cdf_threshold: f64,
    /// Escalate final under-coverage from a warning to
    /// [`Error::ThresholdExceeded`](crate::Error::ThresholdExceeded).
    pub strict_coverage: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            use_fft: true,
            use_gpu: false,
            efficient: true,
            zero_padding_size: None,
            cdf_threshold: 0.99,
            strict_coverage: false,
        }
    }
}

/// Sum of the iterated convolutions `first·α + first·α∗f + first·α∗f² + …`
/// truncated to the input length.
///
/// `f` is `func` delayed by `shift` steps (zero-padded on the left). When
/// `p_swap` is given, term `k` carries the coefficient
/// `p_swap·(1 − p_swap)^k`. Without `first` the series starts from `func`
/// itself.
pub(crate) fn iterative_convolution(
    func: &Array1<f64>,
    shift: usize,
    first: Option<&Array1<f64>>,
    p_swap: Option<f64>,
    config: &BackendConfig,
) -> Array1<f64> {
    let first = first.unwrap_or(func);
    debug_assert_eq!(first.len(), func.len());
    let shifted = shift_right(func, shift);

    if config.use_fft {
        geometric_series_fft(first, &shifted, p_swap, config.zero_padding_size)
    } else {
        geometric_series_direct(first, &shifted, shift, p_swap)
    }
}

/// Delays `func` by `shift` steps within the same horizon.
fn shift_right(func: &Array1<f64>, shift: usize) -> Array1<f64> {
    if shift == 0 {
        return func.clone();
    }
    let trunc = func.len();
    let mut out = Array1::zeros(trunc);
    for t in shift.min(trunc)..trunc {
        out[t] = func[t - shift];
    }
    out
}

/// Closed form of the geometric sum on one scalar lane.
///
/// A density-matrix extension would call this once per matrix entry with
/// the same `func`; the scalar Werner contract needs a single lane.
fn geometric_series_fft(
    first: &Array1<f64>,
    shifted: &Array1<f64>,
    p_swap: Option<f64>,
    padding_override: Option<usize>,
) -> Array1<f64> {
    let trunc = first.len();
    // pad to a power of two like SciPy does; it improves the accuracy of
    // the plan as well as its speed
    let pad = padding_override.unwrap_or_else(|| (2 * trunc - 1).next_power_of_two());

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(pad);
    let ifft = planner.plan_fft_inverse(pad);

    let mut g: Vec<Complex64> = complex_padded(first, pad);
    let mut f: Vec<Complex64> = complex_padded(shifted, pad);
    fft.process(&mut g);
    fft.process(&mut f);

    let one = Complex64::new(1.0, 0.0);
    for (gk, fk) in g.iter_mut().zip(f.iter()) {
        *gk = match p_swap {
            Some(p) => *gk * p / (one - *fk * (1.0 - p)),
            None => *gk / (one - *fk),
        };
    }
    ifft.process(&mut g);

    // rustfft leaves the inverse unnormalized
    let scale = 1.0 / pad as f64;
    let residual = g[pad - 1].norm() * scale;
    if residual > FFT_RESIDUAL_TOL {
        diagnostics::fft_padding_insufficient(pad, residual);
    }

    g.iter().take(trunc).map(|z| z.re * scale).collect()
}

fn complex_padded(values: &Array1<f64>, pad: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); pad];
    for (slot, &value) in out.iter_mut().zip(values) {
        slot.re = value;
    }
    out
}

/// Truncated-series fallback: convolve term by term until the tail is
/// invisible.
fn geometric_series_direct(
    first: &Array1<f64>,
    shifted: &Array1<f64>,
    shift: usize,
    p_swap: Option<f64>,
) -> Array1<f64> {
    let trunc = first.len();
    let alpha = p_swap.unwrap_or(1.0);

    let mut sum = first.mapv(|v| v * alpha);

    // every convolution with the shifted restart branch moves mass at
    // least `shift` steps to the right, so `trunc / shift` terms suffice;
    // the per-attempt failure mass bounds the tail otherwise
    let mut max_k = if shift > 0 {
        trunc.div_ceil(shift)
    } else {
        trunc
    };
    let tail_base = shifted.sum() * p_swap.map_or(1.0, |p| 1.0 - p);
    if tail_base > 0.0 && tail_base < 1.0 {
        let bound = (LN_SERIES_TOL - (trunc as f64).ln()) / tail_base.ln();
        if bound < max_k as f64 {
            max_k = bound.max(1.0) as usize;
        }
    }
    max_k = max_k.min(trunc);

    let mut convolved: Vec<f64> = first.to_vec();
    let mut attenuation = 1.0;
    for _ in 1..max_k {
        convolved = convolve_truncated(&convolved, shifted);
        let coeff = p_swap.map_or(1.0, |p| {
            attenuation *= 1.0 - p;
            p * attenuation
        });
        let mut term_mass = 0.0;
        for (slot, &value) in sum.iter_mut().zip(&convolved) {
            *slot += coeff * value;
            term_mass += coeff * value;
        }
        if term_mass.abs() <= f64::EPSILON * sum.iter().map(|v| v.abs()).sum::<f64>() {
            break;
        }
    }
    sum
}

/// `a ∗ b` truncated to the length of `a`.
fn convolve_truncated(a: &[f64], b: &Array1<f64>) -> Vec<f64> {
    let trunc = a.len();
    let mut out = vec![0.0; trunc];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0.0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate().take(trunc - i) {
            out[i + j] += ai * bj;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rand::Rng;
    use rand_pcg::Pcg64;
    use rand::SeedableRng;

    fn fft_config() -> BackendConfig {
        BackendConfig::default()
    }

    fn direct_config() -> BackendConfig {
        BackendConfig {
            use_fft: false,
            ..BackendConfig::default()
        }
    }

    fn spike(at: usize, mass: f64, trunc: usize) -> Array1<f64> {
        let mut out = Array1::zeros(trunc);
        out[at] = mass;
        out
    }

    #[test]
    fn plain_geometric_sum() {
        // f = g = δ at t = 1 with weight 1/2: the series puts mass 2^-t at
        // t, decayed far below the residual gate inside the padded window
        let f = spike(1, 0.5, 64);
        for config in [fft_config(), direct_config()] {
            let out = iterative_convolution(&f, 0, None, None, &config);
            for t in 1..f.len() {
                assert_approx_eq!(f64, out[t], 0.5_f64.powi(t as i32), epsilon = 1e-13);
            }
            assert_approx_eq!(f64, out[0], 0.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn swap_weighting_reproduces_the_geometric_retry() {
        // deterministic one-step attempts retried with p = 0.3 give
        // P[T = t] = 0.3 · 0.7^(t-1)
        let f = spike(1, 1.0, 64);
        for config in [fft_config(), direct_config()] {
            let out = iterative_convolution(&f, 0, None, Some(0.3), &config);
            for t in 1..f.len() {
                assert_approx_eq!(
                    f64,
                    out[t],
                    0.3 * 0.7_f64.powi(t as i32 - 1),
                    epsilon = 1e-13
                );
            }
        }
    }

    #[test]
    fn shift_delays_every_retry() {
        // each restart costs 2 extra steps: g at 1, g∗f at 4, g∗f² at 7
        let f = spike(1, 0.3, 64);
        let g = spike(1, 0.7, 64);
        for config in [fft_config(), direct_config()] {
            let out = iterative_convolution(&f, 2, Some(&g), None, &config);
            assert_approx_eq!(f64, out[1], 0.7, epsilon = 1e-13);
            assert_approx_eq!(f64, out[4], 0.7 * 0.3, epsilon = 1e-13);
            assert_approx_eq!(f64, out[7], 0.7 * 0.09, epsilon = 1e-13);
            assert_approx_eq!(f64, out[2] + out[3] + out[5] + out[6], 0.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn fft_and_direct_paths_agree_on_random_input() {
        let mut rng = Pcg64::seed_from_u64(0x7261_6e64);
        let trunc = 192;
        // a compactly supported restart branch keeps the whole series
        // well inside the padded window
        let mut f = vec![0.0; trunc];
        for slot in f.iter_mut().take(7).skip(1) {
            *slot = rng.gen_range(0.0..1.0);
        }
        let f_sum: f64 = f.iter().sum();
        let f = Array1::from_vec(f.iter().map(|v| 0.3 * v / f_sum).collect());

        let mut g = vec![0.0];
        for _ in 1..trunc {
            g.push(rng.gen_range(0.0..1.0));
        }
        let g_sum: f64 = g.iter().sum();
        let g = Array1::from_vec(g.iter().map(|v| 0.9 * v / g_sum).collect());

        for (shift, p_swap) in [(0, None), (5, None), (0, Some(0.4)), (3, Some(0.85))] {
            let fast = iterative_convolution(&f, shift, Some(&g), p_swap, &fft_config());
            let slow = iterative_convolution(&f, shift, Some(&g), p_swap, &direct_config());
            for (a, b) in fast.iter().zip(&slow) {
                assert_approx_eq!(f64, *a, *b, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn degenerate_zero_restart_branch() {
        let f = Array1::zeros(16);
        let g = Array1::from_vec(
            (0..16).map(|t| if t == 0 { 0.0 } else { 0.05 }).collect(),
        );
        for config in [fft_config(), direct_config()] {
            let out = iterative_convolution(&f, 0, Some(&g), None, &config);
            for (a, b) in out.iter().zip(&g) {
                assert_approx_eq!(f64, *a, *b, epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn padded_length_is_the_next_power_of_two() {
        assert_eq!((2_usize * 1000 - 1).next_power_of_two(), 2048);
        assert_eq!((2_usize * 1024 - 1).next_power_of_two(), 2048);
        assert_eq!((2_usize * 1025 - 1).next_power_of_two(), 4096);
    }
}
