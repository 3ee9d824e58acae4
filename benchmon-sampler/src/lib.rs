#![warn(missing_docs)]
//! benchmon Sampler
//!
//! Reproducible subsampling of benchmark parameter grids:
//! - `ParameterSpace`: immutable Cartesian product of named axes
//! - `ParameterSampler`: seeded, bounded active set with exhaustive override
//! - `Activation`: run/skip/fail decision returned instead of a skip signal

mod sampler;
mod space;
mod value;

pub use sampler::{
    Activation, DEFAULT_SEED, ParameterSampler, SelectionMode, SelectionPolicy, SkipReason,
    select_indices,
};
pub use space::{MAX_SPACE_LEN, ParameterAxis, ParameterSpace, SamplerError};
pub use value::ParamValue;
