//! Memoization of nested-protocol prefixes.
//!
//! The key covers everything that determines a prefix result *except* the
//! truncation horizon: the cached state records its own horizon, and a
//! hit is only usable when that horizon covers the request.

use super::cutoff::Cutoff;
use super::link::LinkState;
use super::parameters::Parameters;
use super::protocol::Step;
use rustc_hash::FxHashMap;

/// Hashable image of a parameter set and one protocol prefix.
///
/// Floats are keyed by bit pattern: two parameter sets hash alike exactly
/// when they are numerically identical.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct CacheKey {
    p_gen: u64,
    p_swap: u64,
    w0: u64,
    t_coh: u64,
    cutoffs: Vec<CutoffKey>,
    prefix: Vec<Step>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum CutoffKey {
    None,
    MemoryTime(usize),
    Fidelity(u64),
    RunTime(usize),
}

impl From<Cutoff> for CutoffKey {
    fn from(cutoff: Cutoff) -> Self {
        match cutoff {
            Cutoff::None => Self::None,
            Cutoff::MemoryTime(mt_cut) => Self::MemoryTime(mt_cut),
            Cutoff::Fidelity(w_cut) => Self::Fidelity(w_cut.to_bits()),
            Cutoff::RunTime(rt_cut) => Self::RunTime(rt_cut),
        }
    }
}

impl CacheKey {
    /// The key of the first `prefix_len` steps of `parameters`.
    ///
    /// Cut-offs are resolved per step, so a scalar schedule and its
    /// per-step expansion share one key.
    pub(crate) fn new(parameters: &Parameters, prefix_len: usize) -> Self {
        Self {
            p_gen: parameters.p_gen.to_bits(),
            p_swap: parameters.p_swap.to_bits(),
            w0: parameters.w0.to_bits(),
            t_coh: parameters.t_coh.to_bits(),
            cutoffs: (0..prefix_len)
                .map(|step| parameters.cutoffs.step(step).into())
                .collect(),
            prefix: parameters.protocol[..prefix_len].to_vec(),
        }
    }
}

/// Process-scoped store of prefix states; eviction is the caller's
/// concern.
pub(crate) type PrefixCache = FxHashMap<CacheKey, LinkState>;
