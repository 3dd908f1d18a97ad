//! Greenwald-Khanna quantile summary
//!
//! Greenwald-Khanna maintains an ordered summary of `(v, g, Δ)` tuples from
//! which any quantile can be answered with a deterministic rank guarantee:
//! the value returned for `phi` has a rank within `ε·n` of `phi·n`.
//!
//! Terminology:
//!
//!   * `n`: number of observations
//!   * `r_min(v[i])`: lower bound on the rank of `v[i]`, the sum of `g[j]` for `j <= i`
//!   * `r_max(v[i])`: upper bound on the rank of `v[i]`, `r_min(v[i]) + Δ[i]`
//!   * `g[i] = r_min(v[i]) - r_min(v[i - 1])`
//!   * `Δ[i] = r_max(v[i]) - r_min(v[i])`
//!
//! Invariants kept after every update:
//!
//!   * the sum of all `g[i]` equals `n`
//!   * `g[i] + Δ[i] <= max(1, floor(2·ε·n))`
//!
//! The first and last tuples always hold the exact minimum and maximum.

use crate::math;
use crate::quantiles::{check_finite, clamp_phi};
use crate::traits::{ErrorBounds, QuantileError, QuantileSketch, Sketch};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// 3-tuple of a value `v[i]`, `g[i]` and `Δ[i]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuple {
    /// An observation retained by the summary
    pub v: f64,
    /// Difference between the rank lower bounds of this tuple and the previous one
    pub g: u64,
    /// Difference between the rank upper and lower bounds of this tuple
    pub delta: u64,
}

impl Tuple {
    /// Creates a new tuple
    pub fn new(v: f64, g: u64, delta: u64) -> Self {
        Self { v, g, delta }
    }
}

/// Locates the position at which `v` is inserted so that it lands after
/// every tuple whose value is less than or equal to `v`.
pub fn find_insert_pos(summary: &[Tuple], v: f64) -> usize {
    summary.partition_point(|t| t.v <= v)
}

/// Greenwald-Khanna ε-approximate quantile summary
///
/// Memory grows as O((1/ε)·log(ε·n)) in the worst case and is usually far
/// smaller.
///
/// # Example
///
/// ```
/// use streamquant::quantiles::GkSummary;
/// use streamquant::traits::QuantileSketch;
///
/// let epsilon = 0.01;
/// let mut summary = GkSummary::new(epsilon).unwrap();
///
/// let n = 1000;
/// for i in 1..=n {
///     summary.insert(i as f64).unwrap();
/// }
///
/// let median = summary.quantile(0.5);
/// assert!((median - 500.0).abs() <= epsilon * n as f64 + 1.0);
/// ```
#[derive(Clone, Debug)]
pub struct GkSummary {
    /// Ordered sequence of the retained observations
    summary: Vec<Tuple>,
    /// The error factor
    epsilon: f64,
    /// The number of observations
    n: u64,
}

impl GkSummary {
    /// Create a new summary
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::InvalidArgument`] unless `0 < epsilon < 1`.
    pub fn new(epsilon: f64) -> Result<Self, QuantileError> {
        if !(epsilon.is_finite() && epsilon > 0.0 && epsilon < 1.0) {
            return Err(QuantileError::InvalidArgument(format!(
                "epsilon must be in (0, 1), got {}",
                epsilon
            )));
        }

        Ok(Self {
            summary: Vec::new(),
            epsilon,
            n: 0,
        })
    }

    /// The error factor ε
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of tuples currently retained
    pub fn len(&self) -> usize {
        self.summary.len()
    }

    /// The retained tuples, ordered by value
    pub fn tuples(&self) -> &[Tuple] {
        &self.summary
    }

    /// `floor(2·ε·n)`, the largest `g + Δ` a merged tuple may carry
    pub fn merge_threshold(&self) -> u64 {
        math::floor(2.0 * self.epsilon * self.n as f64) as u64
    }

    /// Insert an observation
    ///
    /// The new tuple is `(v, 1, 0)` when `v` becomes the minimum or maximum,
    /// and `(v, 1, floor(2·ε·n) - 1)` otherwise. A compression pass follows.
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::NonFiniteValue`] for NaN or infinite input;
    /// the summary is left untouched.
    pub fn insert(&mut self, v: f64) -> Result<(), QuantileError> {
        check_finite(v)?;

        self.n += 1;
        let pos = find_insert_pos(&self.summary, v);
        let delta = if pos == 0 || pos == self.summary.len() {
            0
        } else {
            self.merge_threshold().saturating_sub(1)
        };
        self.summary.insert(pos, Tuple::new(v, 1, delta));

        self.compress();
        Ok(())
    }

    /// Left-to-right pass folding tuple `i - 1` into tuple `i` whenever
    /// `g[i-1] + g[i] + Δ[i] <= floor(2·ε·n)`.
    ///
    /// The surviving tuple keeps the later value and its own Δ. The first
    /// tuple is never folded so the minimum stays exact.
    fn compress(&mut self) {
        let threshold = self.merge_threshold();
        let len = self.summary.len();
        if threshold == 0 || len < 3 {
            return;
        }

        let mut write = 1;
        for read in 1..len {
            let t = self.summary[read];
            if write >= 2 {
                let prev = self.summary[write - 1];
                if prev.g + t.g + t.delta <= threshold {
                    self.summary[write - 1] = Tuple::new(t.v, prev.g + t.g, t.delta);
                    continue;
                }
            }
            self.summary[write] = t;
            write += 1;
        }

        if write < len {
            self.summary.truncate(write);
            tracing::trace!(
                removed = len - write,
                tuples = write,
                n = self.n,
                "gk summary compressed"
            );
        }
    }

    /// Values at `phi - ε`, `phi` and `phi + ε`
    ///
    /// The true `phi`-quantile lies between `lower` and `upper`; the bound is
    /// deterministic, so `confidence` is 1.0.
    pub fn error_bounds(&self, phi: f64) -> ErrorBounds {
        ErrorBounds::new(
            self.quantile(phi - self.epsilon),
            self.quantile(phi),
            self.quantile(phi + self.epsilon),
            1.0,
        )
    }
}

impl Sketch for GkSummary {
    type Item = f64;

    fn update(&mut self, item: &f64) -> Result<(), QuantileError> {
        self.insert(*item)
    }

    fn clear(&mut self) {
        self.summary.clear();
        self.n = 0;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>() + self.summary.capacity() * core::mem::size_of::<Tuple>()
    }

    fn count(&self) -> u64 {
        self.n
    }
}

impl QuantileSketch for GkSummary {
    /// The value of the last tuple whose `r_max` does not exceed
    /// `phi·n + ε·n`, or the maximum when no tuple exceeds it.
    fn quantile(&self, phi: f64) -> f64 {
        let Some(phi) = clamp_phi(phi) else {
            return f64::NAN;
        };
        let Some(first) = self.summary.first() else {
            return f64::NAN;
        };

        let r = phi * self.n as f64;
        let en = self.epsilon * self.n as f64;

        let mut prev = first.v;
        let mut rmin = 0u64;
        for t in &self.summary {
            rmin += t.g;
            let rmax = rmin + t.delta;
            if rmax as f64 > r + en {
                return prev;
            }
            prev = t.v;
        }

        prev
    }

    fn min(&self) -> Option<f64> {
        self.summary.first().map(|t| t.v)
    }

    fn max(&self) -> Option<f64> {
        self.summary.last().map(|t| t.v)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Tuple {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.v)?;
        tuple.serialize_element(&self.g)?;
        tuple.serialize_element(&self.delta)?;
        tuple.end()
    }
}
