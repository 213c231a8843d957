//! Protocol encodings: tagged swap/distill steps and their validation.
//!
//! The core never parses strings during evaluation; the `s<i>`/`d<i>`
//! notation of asymmetric protocols and the `0`/`1` tags of symmetric
//! ones are accepted at the envelope boundary only.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One operation of a nested (symmetric) protocol.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Step {
    /// Join two adjacent links into one longer-range link.
    Swap,
    /// Consume two pairs of one link to produce a higher-fidelity pair.
    Dist,
}

impl From<Step> for u8 {
    fn from(step: Step) -> Self {
        match step {
            Step::Swap => 0,
            Step::Dist => 1,
        }
    }
}

impl TryFrom<u8> for Step {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Swap),
            1 => Ok(Self::Dist),
            _ => Err(Error::Configuration {
                name: "protocol",
                reason: format!("unknown operation tag {tag}, expected 0 (swap) or 1 (dist)"),
            }),
        }
    }
}

/// One `(operation, segment)` step of an asymmetric protocol.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SeqStep {
    /// The operation applied.
    pub op: Step,
    /// Index of the segment it acts on; for swaps, the left partner.
    pub segment: usize,
}

impl SeqStep {
    /// A swap consuming `segment` and its nearest live right neighbour.
    #[must_use]
    pub const fn swap(segment: usize) -> Self {
        Self {
            op: Step::Swap,
            segment,
        }
    }

    /// An in-place distillation on `segment`.
    #[must_use]
    pub const fn dist(segment: usize) -> Self {
        Self {
            op: Step::Dist,
            segment,
        }
    }
}

impl fmt::Display for SeqStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Step::Swap => 's',
            Step::Dist => 'd',
        };
        write!(f, "{op}{}", self.segment)
    }
}

impl FromStr for SeqStep {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        let invalid = |reason: String| Error::Configuration {
            name: "protocol",
            reason,
        };
        let mut chars = token.chars();
        let op = match chars.next() {
            Some('s') => Step::Swap,
            Some('d') => Step::Dist,
            _ => {
                return Err(invalid(format!(
                    "step `{token}` must start with `s` (swap) or `d` (dist)"
                )))
            }
        };
        let segment = chars
            .as_str()
            .parse()
            .map_err(|_| invalid(format!("step `{token}` carries no valid segment index")))?;
        Ok(Self { op, segment })
    }
}

impl From<SeqStep> for String {
    fn from(step: SeqStep) -> Self {
        step.to_string()
    }
}

impl TryFrom<String> for SeqStep {
    type Error = Error;

    fn try_from(token: String) -> Result<Self> {
        token.parse()
    }
}

/// Replays an asymmetric protocol over `segments` live slots without
/// computing anything, rejecting it if any step touches a dead or missing
/// segment, a swap lacks a live right neighbour, or more than one segment
/// survives.
///
/// # Errors
///
/// [`Error::Configuration`] for steps on dead/out-of-range segments or a
/// protocol that does not collapse the chain; [`Error::Protocol`] for a
/// swap with no live right neighbour.
pub fn validate_asymmetric(protocol: &[SeqStep], segments: usize) -> Result<()> {
    let mut live = vec![true; segments];
    for &step in protocol {
        if step.segment >= segments || !live[step.segment] {
            return Err(Error::Configuration {
                name: "protocol",
                reason: format!("step `{step}` consumes a dead or missing segment"),
            });
        }
        if step.op == Step::Swap {
            let right = next_live(&live, step.segment).ok_or_else(|| Error::Protocol {
                step: step.to_string(),
                reason: "no live segment to the right".into(),
            })?;
            live[step.segment] = false;
            debug_assert!(live[right]);
        }
    }
    let alive = live.iter().filter(|&&l| l).count();
    if alive != 1 {
        return Err(Error::Configuration {
            name: "protocol",
            reason: format!("the protocol must end with exactly one live segment, got {alive}"),
        });
    }
    Ok(())
}

/// The nearest live segment strictly to the right of `index`.
pub(crate) fn next_live(live: &[bool], index: usize) -> Option<usize> {
    live.iter()
        .enumerate()
        .skip(index + 1)
        .find_map(|(i, &alive)| alive.then_some(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_notation_round_trips() {
        for token in ["s0", "d3", "s12"] {
            let step: SeqStep = token.parse().unwrap();
            assert_eq!(step.to_string(), token);
        }
        assert_eq!("s2".parse::<SeqStep>().unwrap(), SeqStep::swap(2));
        assert_eq!("d0".parse::<SeqStep>().unwrap(), SeqStep::dist(0));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!("x1".parse::<SeqStep>().is_err());
        assert!("s".parse::<SeqStep>().is_err());
        assert!("d-1".parse::<SeqStep>().is_err());
        assert!("".parse::<SeqStep>().is_err());
    }

    #[test]
    fn integer_tags() {
        let protocol: Vec<Step> = serde_json::from_str("[0,1,0]").unwrap();
        assert_eq!(protocol, vec![Step::Swap, Step::Dist, Step::Swap]);
        assert!(serde_json::from_str::<Vec<Step>>("[2]").is_err());
        assert_eq!(serde_json::to_string(&protocol).unwrap(), "[0,1,0]");
    }

    #[test]
    fn balanced_tree_collapses_four_segments() {
        let protocol = [SeqStep::swap(0), SeqStep::swap(2), SeqStep::swap(1)];
        assert!(validate_asymmetric(&protocol, 4).is_ok());
    }

    #[test]
    fn chain_collapse_left_to_right() {
        let protocol = [SeqStep::swap(0), SeqStep::swap(1), SeqStep::swap(2)];
        assert!(validate_asymmetric(&protocol, 4).is_ok());
    }

    #[test]
    fn dead_segments_cannot_be_reused() {
        // s0 kills segment 0, the second s0 touches a dead slot
        let protocol = [SeqStep::swap(0), SeqStep::swap(0)];
        assert!(matches!(
            validate_asymmetric(&protocol, 3),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn rightmost_segment_cannot_swap() {
        let protocol = [SeqStep::swap(1), SeqStep::swap(0)];
        assert!(matches!(
            validate_asymmetric(&protocol, 2),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn unfinished_protocols_are_rejected() {
        assert!(validate_asymmetric(&[SeqStep::swap(0)], 3).is_err());
        assert!(validate_asymmetric(&[], 2).is_err());
        assert!(validate_asymmetric(&[], 1).is_ok());
        assert!(validate_asymmetric(&[SeqStep::dist(0), SeqStep::swap(0)], 2).is_ok());
    }
}
