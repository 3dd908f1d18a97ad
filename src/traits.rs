//! Core traits for streaming quantile estimators
//!
//! Every estimator implements the base [`Sketch`] trait for ingestion and
//! bookkeeping, and [`QuantileSketch`] for answering quantile queries.

use core::fmt::Debug;

#[cfg(feature = "std")]
use std::{string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

/// Error raised by estimator construction or update
#[derive(Debug, Clone, PartialEq)]
pub enum QuantileError {
    /// A construction parameter is out of its valid domain
    InvalidArgument(String),
    /// An update value was NaN or infinite
    NonFiniteValue(f64),
    /// A batch update was given values of the wrong shape
    DimensionMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

impl core::fmt::Display for QuantileError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            QuantileError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            QuantileError::NonFiniteValue(v) => write!(f, "non-finite value: {}", v),
            QuantileError::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {:?}, found {:?}", expected, found)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for QuantileError {}

/// Error bounds for an estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBounds {
    /// Lower bound of the estimate
    pub lower: f64,
    /// Point estimate
    pub estimate: f64,
    /// Upper bound of the estimate
    pub upper: f64,
    /// Confidence level (1.0 for deterministic guarantees)
    pub confidence: f64,
}

impl ErrorBounds {
    /// Create new error bounds
    pub fn new(lower: f64, estimate: f64, upper: f64, confidence: f64) -> Self {
        Self {
            lower,
            estimate,
            upper,
            confidence,
        }
    }

    /// Check if a value falls within bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Width of the interval
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Core trait for all streaming estimators
pub trait Sketch: Clone + Debug {
    /// The type of item this sketch processes
    type Item: ?Sized;

    /// Add an item to the sketch
    ///
    /// Implementations validate the item before touching any internal state,
    /// so a rejected item leaves the sketch exactly as it was.
    fn update(&mut self, item: &Self::Item) -> Result<(), QuantileError>;

    /// Reset sketch to empty state, keeping its configuration
    fn clear(&mut self);

    /// Memory usage in bytes
    fn size_bytes(&self) -> usize;

    /// Number of items processed
    fn count(&self) -> u64;

    /// Check if sketch is empty
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Quantile estimation over a stream of `f64`
///
/// Queries never mutate the sketch. An empty sketch answers every query with
/// `f64::NAN`.
pub trait QuantileSketch: Sketch<Item = f64> {
    /// Estimate the value at quantile `phi`
    ///
    /// `phi` is clamped to `[0, 1]`; a NaN `phi` yields NaN.
    fn quantile(&self, phi: f64) -> f64;

    /// Smallest value seen, if any
    fn min(&self) -> Option<f64>;

    /// Largest value seen, if any
    fn max(&self) -> Option<f64>;

    /// Estimate the median (50th percentile)
    fn median(&self) -> f64 {
        self.quantile(0.5)
    }

    /// Estimate several quantiles at once
    fn quantiles(&self, phis: &[f64]) -> Vec<f64> {
        phis.iter().map(|&phi| self.quantile(phi)).collect()
    }
}
