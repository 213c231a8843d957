//! Cut-off policies for aborting partially successful attempts.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Policy deciding when a half-finished attempt is abandoned instead of
/// waiting indefinitely for the second link.
///
/// The serialized form matches the grouped `cutoff_dict` envelope:
/// `"none"`, `{"memory_time": 50}`, `{"fidelity": 0.9}` or
/// `{"run_time": 200}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cutoff {
    /// Effectively unbounded: wait for the partner forever.
    #[default]
    None,
    /// Discard both links once the partner lags more than this many steps
    /// behind the first delivery.
    MemoryTime(usize),
    /// Discard the stored link as soon as decoherence drives its Werner
    /// parameter below this value.
    Fidelity(f64),
    /// Both links must be delivered within this absolute time.
    RunTime(usize),
}

impl Cutoff {
    /// The extra steps waited before a failed attempt restarts; this is
    /// the shift of the retry convolution.
    pub(crate) const fn shift(self) -> usize {
        match self {
            Self::MemoryTime(mt_cut) => mt_cut,
            Self::None | Self::Fidelity(_) | Self::RunTime(_) => 0,
        }
    }

    /// Checks the policy's own value range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a fidelity cut-off outside
    /// `(0, 1)` or a run-time cut-off that forbids even the first step.
    pub fn validate(self) -> Result<()> {
        match self {
            Self::Fidelity(w_cut) if !(w_cut > 0.0 && w_cut < 1.0) => Err(Error::Configuration {
                name: "w_cut",
                reason: format!("fidelity cut-off must lie strictly between 0 and 1, got {w_cut}"),
            }),
            Self::RunTime(0) => Err(Error::Configuration {
                name: "rt_cut",
                reason: "run-time cut-off must allow at least one step".into(),
            }),
            _ => Ok(()),
        }
    }
}

/// Cut-off configuration of a whole protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CutoffSchedule {
    /// One cut-off applied at every protocol step.
    Uniform(Cutoff),
    /// One cut-off per protocol step, used positionally.
    PerStep(Vec<Cutoff>),
}

impl Default for CutoffSchedule {
    fn default() -> Self {
        Self::Uniform(Cutoff::None)
    }
}

impl From<Cutoff> for CutoffSchedule {
    fn from(cutoff: Cutoff) -> Self {
        Self::Uniform(cutoff)
    }
}

impl CutoffSchedule {
    /// The cut-off applied at protocol step `index`.
    #[must_use]
    pub fn step(&self, index: usize) -> Cutoff {
        match self {
            Self::Uniform(cutoff) => *cutoff,
            Self::PerStep(cutoffs) => cutoffs[index],
        }
    }

    /// Checks each cut-off and, for per-step schedules, the length
    /// against the protocol.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on a length mismatch or an
    /// invalid cut-off value.
    pub fn validate(&self, steps: usize) -> Result<()> {
        match self {
            Self::Uniform(cutoff) => cutoff.validate(),
            Self::PerStep(cutoffs) => {
                if cutoffs.len() != steps {
                    return Err(Error::Configuration {
                        name: "cutoffs",
                        reason: format!(
                            "got {} cut-offs for a protocol of {steps} steps",
                            cutoffs.len()
                        ),
                    });
                }
                cutoffs.iter().try_for_each(|cutoff| cutoff.validate())
            }
        }
    }
}
