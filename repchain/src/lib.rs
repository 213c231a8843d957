//! Deterministic waiting-time and Werner-parameter distributions for
//! quantum repeater chains.
//!
//! A repeater chain assembles an end-to-end entangled pair from
//! elementary links through entanglement *swaps* and *distillation*
//! steps, optionally guarded by memory-time, fidelity or run-time
//! *cut-offs*. Given a protocol and hardware parameters, this crate
//! computes, exactly and without sampling, the probability `P[T = t]`
//! that the pair is delivered at each discrete step `t` below a
//! truncation horizon, together with the average Werner parameter of the
//! pair conditional on delivery at `t`. The retry loops of cut-offs,
//! swaps and distillation are geometric convolution series, closed in
//! the Fourier domain.
//!
//! The entry points are [`simulate`] for symmetric (nested) protocols,
//! [`simulate_asymmetric`] for indexed segment chains with optionally
//! heterogeneous hardware, and [`Simulation`] for configured or
//! memoizing runs.

pub mod cutoff;
pub mod diagnostics;
pub mod error;
pub mod link;
pub mod parameters;
pub mod protocol;
pub mod rate;
pub mod simulation;

mod cache;
mod convolve;
mod decoherence;
mod join;
mod unit;

pub use self::convolve::BackendConfig;
pub use self::cutoff::{Cutoff, CutoffSchedule};
pub use self::error::{Error, Result};
pub use self::link::LinkState;
pub use self::parameters::{AsymParameters, Parameters, SegmentValues};
pub use self::protocol::{SeqStep, Step};
pub use self::simulation::{
    compute_unit, simulate, simulate_all_levels, simulate_asymmetric, Simulation,
};
pub use self::unit::UnitParameters;
