//! Exponential memory decoherence applied to a stored link.
//!
//! While the first-arrived link waits for its partner, its Werner
//! parameter shrinks by `exp(-Δt · rate)`. In a homogeneous chain the
//! rate is a single `1 / t_coh`; in a heterogeneous chain every memory
//! has its own coherence time and a waiting link decays with the combined
//! rate of the two memories holding it.

/// Which of the two joined links arrived first and is being stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Held {
    /// The left input of the join waits.
    Link1,
    /// The right input of the join waits.
    Link2,
}

/// Decay model of one join operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Decoherence {
    /// One coherence time shared by every memory, `exp(-Δt / t_coh)`.
    Uniform {
        /// Inverse coherence time; zero for perfect memories.
        rate: f64,
    },
    /// Per-memory coherence times: each link decays with the summed rate
    /// of its two holding memories.
    Split {
        /// Combined rate while the left link waits.
        rate1: f64,
        /// Combined rate while the right link waits.
        rate2: f64,
    },
}

impl Decoherence {
    /// Homogeneous decay with coherence time `t_coh`; `t_coh = ∞` turns
    /// decoherence off.
    pub(crate) fn uniform(t_coh: f64) -> Self {
        Self::Uniform {
            rate: t_coh.recip(),
        }
    }

    /// Decay of a swap joining the segments `(left, shared)` and
    /// `(shared, right)`: the coherence-time triple of the three nodes
    /// involved.
    pub(crate) fn swap_triple(left: f64, shared: f64, right: f64) -> Self {
        Self::Split {
            rate1: left.recip() + shared.recip(),
            rate2: shared.recip() + right.recip(),
        }
    }

    /// Decay of a distillation on one segment with endpoint coherence
    /// times `(left, right)`; both candidate pairs live in the same two
    /// memories.
    pub(crate) fn distill_pair(left: f64, right: f64) -> Self {
        let rate = left.recip() + right.recip();
        Self::Split { rate1: rate, rate2: rate }
    }

    /// The decay rate while `held` waits for its partner.
    pub(crate) const fn rate(self, held: Held) -> f64 {
        match (self, held) {
            (Self::Uniform { rate }, _) => rate,
            (Self::Split { rate1, .. }, Held::Link1) => rate1,
            (Self::Split { rate2, .. }, Held::Link2) => rate2,
        }
    }

    /// Multiplicative Werner factor after waiting `delta` steps.
    pub(crate) fn factor(self, delta: usize, held: Held) -> f64 {
        // delta is bounded by the horizon, well inside f64's exact range
        (-(delta as f64) * self.rate(held)).exp()
    }

    /// True when the same rate applies to both links; the memory-time
    /// fast path requires this.
    pub(crate) const fn is_uniform(self) -> bool {
        matches!(self, Self::Uniform { .. })
    }
}
