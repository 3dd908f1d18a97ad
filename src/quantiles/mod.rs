//! Quantile estimation algorithms
//!
//! This module provides four bounded-memory estimators for quantiles
//! (percentiles) of a data stream. They share the [`QuantileSketch`] contract
//! but nothing else; pick the one whose trade-off fits.
//!
//! # Algorithms
//!
//! - [`P2Estimator`]: P² marker interpolation, O(1) memory for a fixed set of quantiles
//! - [`GkSummary`]: Greenwald-Khanna summary with a deterministic ε·n rank guarantee
//! - [`TDigest`]: simplified centroid-merging t-digest
//! - [`KllSketch`]: simplified KLL sketch with randomized level compaction
//!
//! # Example
//!
//! ```
//! use streamquant::quantiles::GkSummary;
//! use streamquant::traits::QuantileSketch;
//!
//! let mut summary = GkSummary::new(0.01).unwrap();
//!
//! for value in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0] {
//!     summary.insert(value).unwrap();
//! }
//!
//! let median = summary.median();
//! println!("Median: {}", median);
//! ```
//!
//! [`QuantileSketch`]: crate::traits::QuantileSketch

use crate::math;
use crate::traits::QuantileError;

#[cfg(feature = "p2")]
mod p2;

#[cfg(feature = "gk")]
mod gk;

#[cfg(feature = "tdigest")]
mod tdigest;

#[cfg(feature = "kll")]
mod kll;

#[cfg(feature = "p2")]
pub use p2::{Marker, P2Estimator};

#[cfg(feature = "gk")]
pub use gk::{find_insert_pos, GkSummary, Tuple};

#[cfg(feature = "tdigest")]
pub use tdigest::{Centroid, TDigest};

#[cfg(feature = "kll")]
pub use kll::{KllSketch, DEFAULT_SEED, INITIAL_LEVELS, SOFT_MAX_LEVELS};

/// Reject NaN and infinities before they reach estimator state.
#[inline]
pub(crate) fn check_finite(value: f64) -> Result<(), QuantileError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(QuantileError::NonFiniteValue(value))
    }
}

/// Clamp a query probability into `[0, 1]`, or `None` for NaN.
#[inline]
pub(crate) fn clamp_phi(phi: f64) -> Option<f64> {
    if phi.is_nan() {
        None
    } else {
        Some(phi.clamp(0.0, 1.0))
    }
}

#[inline]
pub(crate) fn sort_values(values: &mut [f64]) {
    values.sort_unstable_by(|a, b| a.total_cmp(b));
}

/// Nearest-rank quantile of an already sorted, non-empty slice.
///
/// Returns the element at 1-based rank `ceil(phi * len)`, clamped to
/// `[1, len]`.
pub(crate) fn nearest_rank(sorted: &[f64], phi: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let len = sorted.len();
    let rank = math::ceil(phi * len as f64) as usize;
    sorted[rank.clamp(1, len) - 1]
}
