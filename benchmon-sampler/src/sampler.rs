//! Parameter Sampler
//!
//! Selects the active subset of a parameter space.
//!
//! In sampled mode the canonical product is shuffled with Fisher–Yates driven
//! by a ChaCha8 stream seeded from the policy seed, then truncated. ChaCha8 is
//! portable and value-stable, so the same `(axes, seed, max_combinations)`
//! yields the same active set on every machine.

use crate::space::ParameterSpace;
use crate::value::ParamValue;
use fxhash::FxHashSet;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default seed used when neither the suite nor the benchmark sets one
pub const DEFAULT_SEED: u64 = 1;

/// Bounded sampling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Shuffle seed
    pub seed: u64,
    /// Maximum number of active combinations (0 = none)
    pub max_combinations: usize,
}

impl SelectionPolicy {
    /// Create a policy
    pub fn new(seed: u64, max_combinations: usize) -> Self {
        Self {
            seed,
            max_combinations,
        }
    }
}

/// How the active set is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Every combination is active; the bound is ignored
    Exhaustive,
    /// Seeded shuffle truncated to the policy bound
    Sampled(SelectionPolicy),
}

/// Why a combination will not run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Outside the sampled active set
    Inactive,
    /// Benchmark only runs in exhaustive mode
    SlowOnly,
    /// An optional dependency could not be resolved
    MissingDependency(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Inactive => f.write_str("inactive combination"),
            SkipReason::SlowOnly => f.write_str("runs only in exhaustive mode"),
            SkipReason::MissingDependency(name) => {
                write!(f, "optional dependency unavailable: {}", name)
            }
        }
    }
}

/// Outcome of an activation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Execute this combination
    Run,
    /// Do not execute; not a defect
    Skip(SkipReason),
    /// Setup is broken; abort before spawning anything
    Fail(String),
}

impl Activation {
    /// Whether the combination should execute
    pub fn is_run(&self) -> bool {
        matches!(self, Activation::Run)
    }
}

/// Compute the canonical indices of the active set, in selection order.
pub fn select_indices(len: usize, mode: SelectionMode) -> Vec<usize> {
    match mode {
        SelectionMode::Exhaustive => (0..len).collect(),
        SelectionMode::Sampled(policy) => {
            if policy.max_combinations == 0 || len == 0 {
                return Vec::new();
            }
            let mut indices: Vec<usize> = (0..len).collect();
            let mut rng = ChaCha8Rng::seed_from_u64(policy.seed);
            indices.shuffle(&mut rng);
            indices.truncate(policy.max_combinations);
            indices
        }
    }
}

/// Active-set view over a parameter space
#[derive(Debug, Clone)]
pub struct ParameterSampler {
    space: ParameterSpace,
    mode: SelectionMode,
    active: Vec<Vec<ParamValue>>,
    lookup: FxHashSet<Vec<ParamValue>>,
}

impl ParameterSampler {
    /// Compute the active set for `space` under `mode`
    pub fn new(space: ParameterSpace, mode: SelectionMode) -> Self {
        let active: Vec<Vec<ParamValue>> = select_indices(space.len(), mode)
            .into_iter()
            .filter_map(|i| space.combination(i))
            .collect();
        let lookup = active.iter().cloned().collect();

        Self {
            space,
            mode,
            active,
            lookup,
        }
    }

    /// The underlying parameter space
    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    /// The selection mode in effect
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Active combinations in selection order
    pub fn active_set(&self) -> &[Vec<ParamValue>] {
        &self.active
    }

    /// Exact structural membership in the active set.
    ///
    /// Tuples of the wrong length or with foreign values are simply inactive.
    pub fn is_active(&self, tuple: &[ParamValue]) -> bool {
        tuple.len() == self.space.axes().len() && self.lookup.contains(tuple)
    }

    /// Three-valued activation check; the sampler never fails on its own.
    pub fn activation(&self, tuple: &[ParamValue]) -> Activation {
        if self.is_active(tuple) {
            Activation::Run
        } else {
            Activation::Skip(SkipReason::Inactive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParameterAxis;

    fn example_space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterAxis::new("n", [0i64, 1]),
            ParameterAxis::new("label", ["A", "B"]),
        ])
        .unwrap()
    }

    fn big_space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterAxis::new("a", 0i64..10),
            ParameterAxis::new("b", 0i64..10),
            ParameterAxis::new("c", [true, false]),
        ])
        .unwrap()
    }

    #[test]
    fn test_deterministic_for_fixed_inputs() {
        let mode = SelectionMode::Sampled(SelectionPolicy::new(1, 2));
        let first = ParameterSampler::new(example_space(), mode);
        let second = ParameterSampler::new(example_space(), mode);
        assert_eq!(first.active_set(), second.active_set());
        assert_eq!(first.active_set().len(), 2);
    }

    #[test]
    fn test_active_subset_drawn_from_product() {
        let sampler = ParameterSampler::new(
            example_space(),
            SelectionMode::Sampled(SelectionPolicy::new(1, 2)),
        );
        let product: Vec<_> = sampler.space().iter().collect();
        for tuple in sampler.active_set() {
            assert!(product.contains(tuple));
        }
        assert_ne!(sampler.active_set()[0], sampler.active_set()[1]);
    }

    #[test]
    fn test_some_seed_changes_selection() {
        let space = big_space();
        let base = select_indices(space.len(), SelectionMode::Sampled(SelectionPolicy::new(1, 20)));
        let differs = (2..10u64).any(|seed| {
            select_indices(space.len(), SelectionMode::Sampled(SelectionPolicy::new(seed, 20)))
                != base
        });
        assert!(differs);
    }

    #[test]
    fn test_bound_respected() {
        let space = big_space();
        for max in [0, 1, 7, 200, 201, 10_000] {
            let sampler =
                ParameterSampler::new(space.clone(), SelectionMode::Sampled(SelectionPolicy::new(3, max)));
            assert_eq!(sampler.active_set().len(), max.min(space.len()));
        }
    }

    #[test]
    fn test_exhaustive_ignores_bound() {
        let sampler = ParameterSampler::new(big_space(), SelectionMode::Exhaustive);
        assert_eq!(sampler.active_set().len(), 200);
        let canonical: Vec<_> = sampler.space().iter().collect();
        assert_eq!(sampler.active_set(), canonical.as_slice());
    }

    #[test]
    fn test_full_bound_is_permutation() {
        let space = big_space();
        let mut indices = select_indices(space.len(), SelectionMode::Sampled(SelectionPolicy::new(9, 500)));
        indices.sort_unstable();
        assert_eq!(indices, (0..space.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_membership_consistency() {
        let sampler = ParameterSampler::new(
            big_space(),
            SelectionMode::Sampled(SelectionPolicy::new(5, 30)),
        );
        for tuple in sampler.space().iter() {
            let expected = sampler.active_set().contains(&tuple);
            assert_eq!(sampler.is_active(&tuple), expected);
            assert_eq!(sampler.activation(&tuple).is_run(), expected);
        }
    }

    #[test]
    fn test_malformed_tuples_are_inactive() {
        let sampler = ParameterSampler::new(example_space(), SelectionMode::Exhaustive);
        assert!(!sampler.is_active(&[ParamValue::Int(0)]));
        assert!(!sampler.is_active(&[
            ParamValue::Int(0),
            ParamValue::from("A"),
            ParamValue::Int(1)
        ]));
        assert!(!sampler.is_active(&[ParamValue::Int(7), ParamValue::from("A")]));
        // Same digits, different type
        assert!(!sampler.is_active(&[ParamValue::Float(0.0), ParamValue::from("A")]));
        assert_eq!(
            sampler.activation(&[ParamValue::Int(7), ParamValue::from("A")]),
            Activation::Skip(SkipReason::Inactive)
        );
    }

    #[test]
    fn test_zero_bound_selects_nothing() {
        let sampler = ParameterSampler::new(
            example_space(),
            SelectionMode::Sampled(SelectionPolicy::new(DEFAULT_SEED, 0)),
        );
        assert!(sampler.active_set().is_empty());
        assert!(!sampler.is_active(&[ParamValue::Int(0), ParamValue::from("A")]));
    }
}
