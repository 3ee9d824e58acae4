//! Parameter Space
//!
//! The full combinatorial grid of a benchmark. Combinations are addressed by
//! their index in canonical order: lexicographic by axis order, each axis in
//! its given order, last axis varying fastest.

use crate::value::ParamValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest product a space may have. Plans hold one row per combination.
pub const MAX_SPACE_LEN: usize = 1 << 20;

/// Errors raised while building a parameter space
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SamplerError {
    #[error("Parameter space too large: product of {axes} axes overflows usize")]
    SpaceTooLarge { axes: usize },

    #[error("Parameter space has {len} combinations, limit is {limit}")]
    ExceedsLimit { len: usize, limit: usize },

    #[error("Duplicate parameter axis: {0}")]
    DuplicateAxis(String),

    #[error("Axis {axis} has non-finite value {value}")]
    NonFiniteValue { axis: String, value: String },
}

/// One named dimension of a parameter grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterAxis {
    /// Axis name, used for script placeholders and reporting
    pub name: String,
    /// Candidate values in declaration order
    pub values: Vec<ParamValue>,
}

impl ParameterAxis {
    /// Create a named axis from anything convertible to parameter values
    pub fn new<V: Into<ParamValue>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Immutable Cartesian product of parameter axes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpace {
    axes: Vec<ParameterAxis>,
    len: usize,
}

impl ParameterSpace {
    /// Build a space, checking axis names, values and product size up front.
    ///
    /// NaN and infinities are rejected: they cannot be written to JSON reports.
    pub fn new(axes: Vec<ParameterAxis>) -> Result<Self, SamplerError> {
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(SamplerError::DuplicateAxis(axis.name.clone()));
            }
            if let Some(value) = axis.values.iter().find(|v| !v.is_finite()) {
                return Err(SamplerError::NonFiniteValue {
                    axis: axis.name.clone(),
                    value: value.to_string(),
                });
            }
        }

        let len = axes
            .iter()
            .try_fold(1usize, |acc, axis| acc.checked_mul(axis.values.len()))
            .ok_or(SamplerError::SpaceTooLarge { axes: axes.len() })?;
        if len > MAX_SPACE_LEN {
            return Err(SamplerError::ExceedsLimit {
                len,
                limit: MAX_SPACE_LEN,
            });
        }

        Ok(Self { axes, len })
    }

    /// Axes in declaration order
    pub fn axes(&self) -> &[ParameterAxis] {
        &self.axes
    }

    /// Axis names in declaration order
    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|a| a.name.as_str())
    }

    /// Number of combinations in the full product.
    ///
    /// A space with no axes has exactly one (empty) combination.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the product is empty (some axis has no values)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode a canonical index into its combination
    pub fn combination(&self, index: usize) -> Option<Vec<ParamValue>> {
        if index >= self.len {
            return None;
        }

        let mut remainder = index;
        let mut tuple = vec![ParamValue::Bool(false); self.axes.len()];
        for (slot, axis) in tuple.iter_mut().zip(&self.axes).rev() {
            let radix = axis.values.len();
            *slot = axis.values[remainder % radix].clone();
            remainder /= radix;
        }
        Some(tuple)
    }

    /// Iterate every combination in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Vec<ParamValue>> + '_ {
        (0..self.len).filter_map(move |i| self.combination(i))
    }

    /// Whether a tuple is structurally drawn from this space's axes
    pub fn contains(&self, tuple: &[ParamValue]) -> bool {
        tuple.len() == self.axes.len()
            && tuple
                .iter()
                .zip(&self.axes)
                .all(|(value, axis)| axis.values.contains(value))
    }
}
