//! Protocol drivers: the nested (symmetric) evaluation with optional
//! prefix memoization, and the asymmetric evaluation over an indexed
//! segment chain, including its heterogeneous variant.

use super::cache::{CacheKey, PrefixCache};
use super::convolve::BackendConfig;
use super::decoherence::Decoherence;
use super::diagnostics;
use super::error::{Error, Result};
use super::link::LinkState;
use super::parameters::{self, AsymParameters, Parameters, SegmentValues};
use super::protocol::{SeqStep, Step};
use super::unit::{apply_unit, UnitContext, UnitParameters};

/// A repeater-chain evaluation engine.
///
/// The engine is synchronous and single-threaded; callers wanting
/// parallel protocol search run one instance per worker. The optional
/// prefix cache is process-scoped and flushed with
/// [`Self::clear_cache`].
#[derive(Debug)]
pub struct Simulation {
    config: BackendConfig,
    cache: Option<PrefixCache>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

/// One live segment of an asymmetric chain, with its node endpoints.
struct Segment {
    state: LinkState,
    left: usize,
    right: usize,
}

impl Simulation {
    /// An engine with the given backend; a GPU request falls back to the
    /// CPU here, once.
    #[must_use]
    pub fn new(mut config: BackendConfig) -> Self {
        if config.use_gpu {
            diagnostics::gpu_unavailable();
            config.use_gpu = false;
        }
        Self {
            config,
            cache: None,
        }
    }

    /// An engine that memoizes nested-protocol prefixes.
    #[must_use]
    pub fn with_cache(config: BackendConfig) -> Self {
        let mut simulation = Self::new(config);
        simulation.cache = Some(PrefixCache::default());
        simulation
    }

    /// The backend switches this engine runs with.
    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Drops every memoized prefix.
    pub fn clear_cache(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
    }

    /// Final `(pmf, werner)` state of a symmetric nested protocol.
    ///
    /// # Errors
    ///
    /// Validation errors of [`Parameters::validate`], or
    /// [`Error::ThresholdExceeded`] under strict coverage.
    pub fn nested(&mut self, parameters: &Parameters) -> Result<LinkState> {
        let mut levels = self.run_nested(parameters)?;
        // the level list always contains at least the elementary link
        Ok(levels.pop().unwrap_or_else(|| unreachable!()))
    }

    /// States after every protocol prefix, the elementary link first.
    ///
    /// # Errors
    ///
    /// As for [`Self::nested`].
    pub fn nested_all_levels(&mut self, parameters: &Parameters) -> Result<Vec<LinkState>> {
        self.run_nested(parameters)
    }

    fn run_nested(&mut self, parameters: &Parameters) -> Result<Vec<LinkState>> {
        parameters.validate()?;
        let t_trunc = parameters.t_trunc;
        let steps = parameters.protocol.len();

        let mut levels = Vec::with_capacity(steps + 1);
        levels.push(LinkState::elementary(
            parameters.p_gen,
            parameters.w0,
            t_trunc,
        ));

        // resume from the longest contiguously cached prefix whose stored
        // horizon covers this request
        if let Some(cache) = &self.cache {
            for len in 1..=steps {
                match cache
                    .get(&CacheKey::new(parameters, len))
                    .filter(|state| state.horizon() >= t_trunc)
                {
                    Some(hit) => levels.push(hit.truncated(t_trunc)),
                    None => break,
                }
            }
        }

        for index in levels.len() - 1..steps {
            let context = UnitContext {
                p_swap: parameters.p_swap,
                cutoff: parameters.cutoffs.step(index),
                decoherence: Decoherence::uniform(parameters.t_coh),
            };
            let state = apply_unit(
                parameters.protocol[index],
                &levels[index],
                &levels[index],
                &context,
                &self.config,
            )?;
            if let Some(cache) = &mut self.cache {
                cache.insert(CacheKey::new(parameters, index + 1), state.clone());
            }
            levels.push(state);
        }

        if let Some(state) = levels.last() {
            self.check_final_coverage(state)?;
        }
        Ok(levels)
    }

    /// Final state of an asymmetric protocol over an indexed segment
    /// chain; threads per-node coherence times in heterogeneous runs.
    ///
    /// # Errors
    ///
    /// Validation errors of [`AsymParameters::validate`],
    /// [`Error::Protocol`] for steps the live chain cannot absorb, or
    /// [`Error::ThresholdExceeded`] under strict coverage.
    pub fn asymmetric(&mut self, parameters: &AsymParameters) -> Result<LinkState> {
        parameters.validate()?;
        let t_trunc = parameters.t_trunc;

        let mut segments: Vec<Option<Segment>> = (0..parameters.segments)
            .map(|i| {
                Some(Segment {
                    state: LinkState::elementary(
                        parameters.p_gen.get(i),
                        parameters.w0.get(i),
                        t_trunc,
                    ),
                    left: i,
                    right: i + 1,
                })
            })
            .collect();

        for &step in &parameters.protocol {
            self.apply_asymmetric_step(step, &mut segments, parameters)?;
        }

        let state = segments
            .into_iter()
            .flatten()
            .next()
            .map(|segment| segment.state)
            .ok_or_else(|| Error::Configuration {
                name: "protocol",
                reason: "no live segment left".into(),
            })?;
        self.check_final_coverage(&state)?;
        Ok(state)
    }

    fn apply_asymmetric_step(
        &self,
        step: SeqStep,
        segments: &mut [Option<Segment>],
        parameters: &AsymParameters,
    ) -> Result<()> {
        let dead = |step: SeqStep| Error::Configuration {
            name: "protocol",
            reason: format!("step `{step}` consumes a dead or missing segment"),
        };
        let index = step.segment;

        match step.op {
            Step::Swap => {
                let partner = (index + 1..segments.len())
                    .find(|&j| segments[j].is_some())
                    .ok_or_else(|| Error::Protocol {
                        step: step.to_string(),
                        reason: "no live segment to the right".into(),
                    })?;
                let Some(left_segment) = segments[index].take() else {
                    return Err(dead(step));
                };
                let Some(right_segment) = segments[partner].take() else {
                    return Err(dead(step));
                };
                let decoherence = match &parameters.t_coh {
                    SegmentValues::Uniform(t_coh) => Decoherence::uniform(*t_coh),
                    SegmentValues::PerSegment(t_cohs) => {
                        if left_segment.right != right_segment.left {
                            return Err(Error::Protocol {
                                step: step.to_string(),
                                reason: format!(
                                    "segments ({}, {}) and ({}, {}) are not adjacent",
                                    left_segment.left,
                                    left_segment.right,
                                    right_segment.left,
                                    right_segment.right
                                ),
                            });
                        }
                        Decoherence::swap_triple(
                            t_cohs[left_segment.left],
                            t_cohs[left_segment.right],
                            t_cohs[right_segment.right],
                        )
                    }
                };
                let context = UnitContext {
                    p_swap: parameters.p_swap,
                    cutoff: parameters.cutoff,
                    decoherence,
                };
                let merged = apply_unit(
                    Step::Swap,
                    &left_segment.state,
                    &right_segment.state,
                    &context,
                    &self.config,
                )?;
                segments[partner] = Some(Segment {
                    state: merged,
                    left: left_segment.left,
                    right: right_segment.right,
                });
            }
            Step::Dist => {
                let Some(segment) = segments[index].as_mut() else {
                    return Err(dead(step));
                };
                let decoherence = match &parameters.t_coh {
                    SegmentValues::Uniform(t_coh) => Decoherence::uniform(*t_coh),
                    SegmentValues::PerSegment(t_cohs) => {
                        Decoherence::distill_pair(t_cohs[segment.left], t_cohs[segment.right])
                    }
                };
                let context = UnitContext {
                    p_swap: parameters.p_swap,
                    cutoff: parameters.cutoff,
                    decoherence,
                };
                let distilled = apply_unit(
                    Step::Dist,
                    &segment.state,
                    &segment.state,
                    &context,
                    &self.config,
                )?;
                segment.state = distilled;
            }
        }
        Ok(())
    }

    /// One exposed unit step on explicit link states; the second link
    /// defaults to the first.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for invalid scalars or mismatched
    /// horizons.
    pub fn unit(
        &self,
        kind: Step,
        link1: &LinkState,
        link2: Option<&LinkState>,
        parameters: &UnitParameters,
    ) -> Result<LinkState> {
        parameters::probability("p_swap", parameters.p_swap)?;
        parameters::coherence("t_coh", parameters.t_coh)?;
        parameters.cutoff.validate()?;
        let context = UnitContext {
            p_swap: parameters.p_swap,
            cutoff: parameters.cutoff,
            decoherence: Decoherence::uniform(parameters.t_coh),
        };
        apply_unit(kind, link1, link2.unwrap_or(link1), &context, &self.config)
    }

    fn check_final_coverage(&self, state: &LinkState) -> Result<()> {
        if self.config.strict_coverage {
            let coverage = state.coverage();
            if coverage < self.config.cdf_threshold {
                return Err(Error::ThresholdExceeded {
                    coverage,
                    threshold: self.config.cdf_threshold,
                });
            }
        }
        Ok(())
    }
}

/// Evaluates a symmetric nested protocol with the default backend.
///
/// # Errors
///
/// As for [`Simulation::nested`].
pub fn simulate(parameters: &Parameters) -> Result<LinkState> {
    Simulation::default().nested(parameters)
}

/// Evaluates a symmetric nested protocol, returning every intermediate
/// level.
///
/// # Errors
///
/// As for [`Simulation::nested_all_levels`].
pub fn simulate_all_levels(parameters: &Parameters) -> Result<Vec<LinkState>> {
    Simulation::default().nested_all_levels(parameters)
}

/// Evaluates an asymmetric protocol with the default backend.
///
/// # Errors
///
/// As for [`Simulation::asymmetric`].
pub fn simulate_asymmetric(parameters: &AsymParameters) -> Result<LinkState> {
    Simulation::default().asymmetric(parameters)
}

/// One swap or distillation on explicit link states, for composition by
/// upstream drivers.
///
/// # Errors
///
/// As for [`Simulation::unit`].
pub fn compute_unit(
    kind: Step,
    link1: &LinkState,
    link2: Option<&LinkState>,
    parameters: &UnitParameters,
) -> Result<LinkState> {
    Simulation::default().unit(kind, link1, link2, parameters)
}
