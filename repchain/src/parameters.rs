//! Parameter envelopes consumed from upstream drivers, with the
//! validation that runs before any computation.

use super::cutoff::{Cutoff, CutoffSchedule};
use super::error::{Error, Result};
use super::protocol::{validate_asymmetric, SeqStep, Step};
use serde::{Deserialize, Serialize};

const fn default_t_coh() -> f64 {
    f64::INFINITY
}

pub(crate) fn probability(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::Configuration {
            name,
            reason: format!("must be a probability in (0, 1], got {value}"),
        })
    }
}

fn werner(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Configuration {
            name,
            reason: format!("must be a Werner parameter in [0, 1], got {value}"),
        })
    }
}

pub(crate) fn coherence(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(Error::Configuration {
            name,
            reason: format!("must be a positive coherence time, got {value}"),
        })
    }
}

fn horizon(t_trunc: usize) -> Result<()> {
    if t_trunc >= 2 {
        Ok(())
    } else {
        Err(Error::Configuration {
            name: "t_trunc",
            reason: format!("the truncation horizon must be at least 2, got {t_trunc}"),
        })
    }
}

/// Parameters of a symmetric (nested) protocol run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Elementary-link generation success probability per step.
    pub p_gen: f64,
    /// Entanglement-swap success probability.
    pub p_swap: f64,
    /// Werner parameter of a freshly generated elementary pair.
    pub w0: f64,
    /// Memory coherence time; infinite when absent.
    #[serde(default = "default_t_coh")]
    pub t_coh: f64,
    /// Truncation horizon of every series.
    pub t_trunc: usize,
    /// Swap/distill schedule, applied left to right.
    pub protocol: Vec<Step>,
    /// Cut-off configuration, scalar or per step.
    #[serde(default)]
    pub cutoffs: CutoffSchedule,
}

impl Parameters {
    /// Checks every range and length before evaluation.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        probability("p_gen", self.p_gen)?;
        probability("p_swap", self.p_swap)?;
        werner("w0", self.w0)?;
        coherence("t_coh", self.t_coh)?;
        horizon(self.t_trunc)?;
        self.cutoffs.validate(self.protocol.len())
    }
}

/// A scalar broadcast over all segments, or one value per segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentValues {
    /// The same value for every segment (or node).
    Uniform(f64),
    /// One value per segment (per node for coherence times).
    PerSegment(Vec<f64>),
}

impl From<f64> for SegmentValues {
    fn from(value: f64) -> Self {
        Self::Uniform(value)
    }
}

impl SegmentValues {
    /// The value at `index`.
    ///
    /// # Panics
    ///
    /// Panics on an out-of-range index of a per-segment list; validation
    /// checks the lengths first.
    #[must_use]
    pub fn get(&self, index: usize) -> f64 {
        match self {
            Self::Uniform(value) => *value,
            Self::PerSegment(values) => values[index],
        }
    }

    const fn is_per_segment(&self) -> bool {
        matches!(self, Self::PerSegment(_))
    }

    fn validate_each(
        &self,
        name: &'static str,
        expected_len: usize,
        check: impl Fn(&'static str, f64) -> Result<()>,
    ) -> Result<()> {
        match self {
            Self::Uniform(value) => check(name, *value),
            Self::PerSegment(values) => {
                if values.len() != expected_len {
                    return Err(Error::Configuration {
                        name,
                        reason: format!("expected {expected_len} values, got {}", values.len()),
                    });
                }
                values.iter().try_for_each(|&value| check(name, value))
            }
        }
    }
}

/// Parameters of an asymmetric protocol over an indexed chain of
/// segments.
///
/// The run is *heterogeneous* when `p_gen` is given per segment; it then
/// requires per-segment `w0` and per-node `t_coh` (one more entry than
/// segments).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AsymParameters {
    /// Number of elementary segments in the chain.
    pub segments: usize,
    /// Generation success probability, scalar or per segment.
    pub p_gen: SegmentValues,
    /// Entanglement-swap success probability.
    pub p_swap: f64,
    /// Initial Werner parameter, scalar or per segment.
    pub w0: SegmentValues,
    /// Coherence time, scalar or per node.
    #[serde(default = "default_t_coh_values")]
    pub t_coh: SegmentValues,
    /// Truncation horizon of every series.
    pub t_trunc: usize,
    /// `(operation, segment)` schedule, applied in order.
    pub protocol: Vec<SeqStep>,
    /// One cut-off applied at every step.
    #[serde(default)]
    pub cutoff: Cutoff,
}

fn default_t_coh_values() -> SegmentValues {
    SegmentValues::Uniform(f64::INFINITY)
}

impl AsymParameters {
    /// True when any hardware parameter varies along the chain.
    #[must_use]
    pub const fn is_heterogeneous(&self) -> bool {
        self.p_gen.is_per_segment()
    }

    /// Checks ranges, per-segment lengths and the protocol's liveness.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] or [`Error::Protocol`] as in
    /// [`validate_asymmetric`].
    pub fn validate(&self) -> Result<()> {
        if self.segments == 0 {
            return Err(Error::Configuration {
                name: "segments",
                reason: "the chain needs at least one segment".into(),
            });
        }
        probability("p_swap", self.p_swap)?;
        horizon(self.t_trunc)?;
        self.cutoff.validate()?;
        self.p_gen
            .validate_each("p_gen", self.segments, probability)?;
        self.w0.validate_each("w0", self.segments, werner)?;
        // nodes, not segments: both endpoints carry a memory
        self.t_coh
            .validate_each("t_coh", self.segments + 1, coherence)?;
        if self.is_heterogeneous()
            && !(self.w0.is_per_segment() && self.t_coh.is_per_segment())
        {
            return Err(Error::Configuration {
                name: "w0",
                reason: "heterogeneous chains need per-segment w0 and per-node t_coh".into(),
            });
        }
        validate_asymmetric(&self.protocol, self.segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Parameters {
        Parameters {
            p_gen: 0.5,
            p_swap: 0.5,
            w0: 0.933,
            t_coh: 400.0,
            t_trunc: 1000,
            protocol: vec![Step::Swap],
            cutoffs: CutoffSchedule::default(),
        }
    }

    #[test]
    fn valid_envelope_passes() {
        assert!(nested().validate().is_ok());
    }

    #[test]
    fn ranges_are_enforced() {
        for (mutate, field) in [
            (
                Box::new(|p: &mut Parameters| p.p_gen = 0.0) as Box<dyn Fn(&mut Parameters)>,
                "p_gen",
            ),
            (Box::new(|p: &mut Parameters| p.p_swap = 1.5), "p_swap"),
            (Box::new(|p: &mut Parameters| p.w0 = -0.1), "w0"),
            (Box::new(|p: &mut Parameters| p.t_coh = 0.0), "t_coh"),
            (Box::new(|p: &mut Parameters| p.t_trunc = 1), "t_trunc"),
        ] {
            let mut parameters = nested();
            mutate(&mut parameters);
            match parameters.validate() {
                Err(Error::Configuration { name, .. }) => assert_eq!(name, field),
                other => panic!("expected a configuration error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_t_coh_defaults_to_infinity() {
        let parameters: Parameters = serde_json::from_str(
            "{\"p_gen\":0.5,\"p_swap\":0.5,\"w0\":0.933,\"t_trunc\":100,\"protocol\":[0]}",
        )
        .unwrap();

        assert_eq!(parameters.t_coh, f64::INFINITY);
        assert_eq!(parameters.cutoffs, CutoffSchedule::default());
        assert!(parameters.validate().is_ok());
    }

    fn heterogeneous() -> AsymParameters {
        AsymParameters {
            segments: 2,
            p_gen: SegmentValues::PerSegment(vec![0.3, 0.5]),
            p_swap: 0.5,
            w0: SegmentValues::PerSegment(vec![0.9, 0.95]),
            t_coh: SegmentValues::PerSegment(vec![300.0, 300.0, 300.0]),
            t_trunc: 400,
            protocol: vec![SeqStep::swap(0)],
            cutoff: Cutoff::None,
        }
    }

    #[test]
    fn heterogeneous_lengths() {
        assert!(heterogeneous().validate().is_ok());

        let mut wrong = heterogeneous();
        wrong.t_coh = SegmentValues::PerSegment(vec![300.0, 300.0]);
        assert!(matches!(
            wrong.validate(),
            Err(Error::Configuration { name: "t_coh", .. })
        ));

        let mut wrong = heterogeneous();
        wrong.w0 = SegmentValues::Uniform(0.9);
        assert!(matches!(
            wrong.validate(),
            Err(Error::Configuration { name: "w0", .. })
        ));

        let mut wrong = heterogeneous();
        wrong.p_gen = SegmentValues::PerSegment(vec![0.3, 0.5, 0.7]);
        assert!(matches!(
            wrong.validate(),
            Err(Error::Configuration { name: "p_gen", .. })
        ));
    }

    #[test]
    fn asymmetric_envelope_with_string_steps() {
        let parameters: AsymParameters = serde_json::from_str(
            "{\"segments\":4,\"p_gen\":0.5,\"p_swap\":0.5,\"w0\":0.933,\
             \"t_trunc\":200,\"protocol\":[\"s0\",\"s2\",\"s1\"]}",
        )
        .unwrap();

        assert!(!parameters.is_heterogeneous());
        assert_eq!(parameters.protocol[1], SeqStep::swap(2));
        assert!(parameters.validate().is_ok());
    }
}
